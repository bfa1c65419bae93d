use axum::http::{self, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http_body_util::BodyExt;
use mock_server::{app, DEFAULT_API_KEY};
use tower::ServiceExt;

fn auth(key: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{key}:")))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, auth(DEFAULT_API_KEY))
        .body(body.to_string())
        .unwrap()
}

fn content_type(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_key_returns_401_with_embedded_error() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/customers").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_string(resp).await;
    assert!(body.contains("<message><![CDATA[Authentication key is empty]]></message>"));
}

#[tokio::test]
async fn wrong_key_returns_401() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/customers/7")
                .header(http::header::AUTHORIZATION, auth("WRONG"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- list ---

#[tokio::test]
async fn list_customers_as_xml() {
    let resp = app().oneshot(request("GET", "/api/customers", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(content_type(&resp), "text/xml;charset=utf-8");
    let body = body_string(resp).await;
    assert!(body.contains("<customer id=\"1\"/>"));
    assert!(body.contains("<customer id=\"7\"/>"));
}

#[tokio::test]
async fn list_unknown_resource_returns_400() {
    let resp = app().oneshot(request("GET", "/api/widgets", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_string(resp).await;
    assert!(body.contains("widgets"));
}

// --- get ---

#[tokio::test]
async fn get_customer_as_xml() {
    let resp = app().oneshot(request("GET", "/api/customers/7", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(body.contains("<id><![CDATA[7]]></id>"));
    assert!(body.contains("<email><![CDATA[pub@prestashop.com]]></email>"));
}

#[tokio::test]
async fn get_customer_as_json() {
    let resp = app()
        .oneshot(request("GET", "/api/customers/7?output_format=JSON", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(content_type(&resp), "application/json");
    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(body["customer"]["id"], 7);
    assert_eq!(body["customer"]["lastname"], "DOE");
}

#[tokio::test]
async fn get_customer_not_found() {
    let resp = app().oneshot(request("GET", "/api/customers/999", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_customer_bad_id_returns_400() {
    let resp = app().oneshot(request("GET", "/api/customers/seven", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- create ---

#[tokio::test]
async fn create_customer_returns_201() {
    let resp = app()
        .oneshot(request(
            "POST",
            "/api/customers",
            "<prestashop><customer><email>new@shop.test</email></customer></prestashop>",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_string(resp).await;
    assert!(body.contains("<id><![CDATA[8]]></id>"));
    assert!(body.contains("<email><![CDATA[new@shop.test]]></email>"));
}

#[tokio::test]
async fn create_with_malformed_xml_returns_400() {
    let resp = app()
        .oneshot(request("POST", "/api/customers", "<prestashop><customer>"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- delete ---

#[tokio::test]
async fn delete_returns_200_with_empty_body() {
    let resp = app().oneshot(request("DELETE", "/api/customers/7", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(http::header::CONTENT_LENGTH).unwrap(),
        "0"
    );
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn delete_missing_returns_404() {
    let resp = app().oneshot(request("DELETE", "/api/customers/999", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- faults ---

#[tokio::test]
async fn embedded_error_fault_answers_200() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/faults/embedded-error").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(body.contains("<errors>"));
}

#[tokio::test]
async fn malformed_fault_answers_500() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/faults/malformed").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type(&resp), "text/xml;charset=utf-8");
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "POST",
            "/api/customers",
            "<prestashop><customer><lastname>Walker</lastname></customer></prestashop>",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // update
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "PUT",
            "/api/customers/8",
            "<prestashop><customer><id>8</id><lastname>Runner</lastname></customer></prestashop>",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(body.contains("<lastname><![CDATA[Runner]]></lastname>"));

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/api/customers/8?output_format=JSON", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(body["customer"]["lastname"], "Runner");

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("DELETE", "/api/customers/8", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // get after delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/api/customers/8", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

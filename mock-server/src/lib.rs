//! In-memory emulation of the PrestaShop webservice.
//!
//! Serves `/api/{resource}` and `/api/{resource}/{id}` with HTTP basic auth
//! (the key as username, empty password). Answers in XML with CDATA values
//! by default and in JSON when `output_format=JSON` is given. The
//! `/api/faults/{kind}` routes reproduce the inconsistent error reporting a
//! real shop exhibits.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::debug;

/// Key accepted by `app()` when none is configured.
pub const DEFAULT_API_KEY: &str = "MOCKWEBSERVICEKEY";

const XML_CONTENT_TYPE: &str = "text/xml;charset=utf-8";

/// Field name to value, `id` excluded.
pub type Fields = BTreeMap<String, String>;

/// Resources by name, items by id.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub resources: BTreeMap<String, BTreeMap<u64, Fields>>,
    next_id: u64,
}

impl Store {
    /// A store with `customers` (ids 1 and 7) and an empty `products`.
    pub fn seeded() -> Self {
        let mut store = Store {
            resources: BTreeMap::new(),
            next_id: 8,
        };
        let customers = store.resources.entry("customers".to_string()).or_default();
        customers.insert(1, fields(&[("email", "anonymous@psgdpr.com"), ("lastname", "Anonymous")]));
        customers.insert(7, fields(&[("email", "pub@prestashop.com"), ("lastname", "DOE")]));
        store.resources.insert("products".to_string(), BTreeMap::new());
        store
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[derive(Clone)]
pub struct AppState {
    api_key: Arc<str>,
    store: Arc<RwLock<Store>>,
}

pub fn app() -> Router {
    app_with(DEFAULT_API_KEY, Store::seeded())
}

pub fn app_with(api_key: &str, store: Store) -> Router {
    let state = AppState {
        api_key: Arc::from(api_key),
        store: Arc::new(RwLock::new(store)),
    };
    Router::new()
        .route("/api/faults/{kind}", get(fault))
        .route("/api/{resource}", get(list_items).post(create_item))
        .route(
            "/api/{resource}/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(api_key, Store::seeded())).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Xml,
    Json,
}

impl Format {
    fn from_query(query: &HashMap<String, String>) -> Self {
        match query.get("output_format") {
            Some(format) if format.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Xml,
        }
    }
}

/// `customers` -> `customer`, `categories` -> `category`, `addresses` -> `address`.
fn singular(resource: &str) -> String {
    if let Some(stem) = resource.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = resource.strip_suffix("sses") {
        format!("{stem}ss")
    } else {
        resource.strip_suffix('s').unwrap_or(resource).to_string()
    }
}

fn cdata(value: &str) -> String {
    format!("<![CDATA[{}]]>", value.replace("]]>", "]]]]><![CDATA[>"))
}

fn xml_document(inner: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <prestashop xmlns:xlink=\"http://www.w3.org/1999/xlink\">\n{inner}</prestashop>\n"
    )
}

fn xml(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

fn error_response(format: Format, status: StatusCode, code: u32, message: &str) -> Response {
    match format {
        Format::Xml => xml(
            status,
            xml_document(&format!(
                "<errors>\n<error>\n<code>{}</code>\n<message>{}</message>\n</error>\n</errors>\n",
                cdata(&code.to_string()),
                cdata(message)
            )),
        ),
        Format::Json => (
            status,
            Json(json!({ "errors": [{ "code": code, "message": message }] })),
        )
            .into_response(),
    }
}

fn item_response(format: Format, status: StatusCode, resource: &str, id: u64, fields: &Fields) -> Response {
    let element = singular(resource);
    match format {
        Format::Xml => {
            let mut inner = format!("<{element}>\n\t<id>{}</id>\n", cdata(&id.to_string()));
            for (name, value) in fields {
                inner.push_str(&format!("\t<{name}>{}</{name}>\n", cdata(value)));
            }
            inner.push_str(&format!("</{element}>\n"));
            xml(status, xml_document(&inner))
        }
        Format::Json => {
            let mut object = Map::new();
            object.insert("id".to_string(), json!(id));
            for (name, value) in fields {
                object.insert(name.clone(), json!(value));
            }
            let mut document = Map::new();
            document.insert(element, Value::Object(object));
            (status, Json(Value::Object(document))).into_response()
        }
    }
}

/// Reject requests whose basic-auth username is not the configured key.
fn authorize(state: &AppState, headers: &HeaderMap, format: Format) -> Result<(), Response> {
    let username = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .map(|credentials| {
            credentials
                .split_once(':')
                .map(|(user, _)| user.to_string())
                .unwrap_or(credentials)
        });
    match username {
        Some(key) if key == *state.api_key => Ok(()),
        Some(_) => Err(error_response(
            format,
            StatusCode::UNAUTHORIZED,
            18,
            "Invalid authentication key",
        )),
        None => Err(error_response(
            format,
            StatusCode::UNAUTHORIZED,
            17,
            "Authentication key is empty",
        )),
    }
}

fn unknown_resource(format: Format, resource: &str) -> Response {
    error_response(
        format,
        StatusCode::BAD_REQUEST,
        20,
        &format!("Resource of type \"{resource}\" does not exists"),
    )
}

fn not_found(format: Format, resource: &str, id: u64) -> Response {
    error_response(
        format,
        StatusCode::NOT_FOUND,
        87,
        &format!("There is no {} with ID {id}", singular(resource)),
    )
}

fn parse_id(format: Format, id: &str) -> Result<u64, Response> {
    id.parse().map_err(|_| {
        error_response(format, StatusCode::BAD_REQUEST, 90, &format!("Id ({id}) is invalid"))
    })
}

async fn list_items(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let format = Format::from_query(&query);
    if let Err(response) = authorize(&state, &headers, format) {
        return response;
    }
    let store = state.store.read().await;
    let Some(items) = store.resources.get(&resource) else {
        return unknown_resource(format, &resource);
    };
    let element = singular(&resource);
    match format {
        Format::Xml => {
            let mut inner = format!("<{resource}>\n");
            for id in items.keys() {
                inner.push_str(&format!("\t<{element} id=\"{id}\"/>\n"));
            }
            inner.push_str(&format!("</{resource}>\n"));
            xml(StatusCode::OK, xml_document(&inner))
        }
        Format::Json => {
            let ids: Vec<Value> = items.keys().map(|id| json!({ "id": id })).collect();
            let mut document = Map::new();
            document.insert(resource.clone(), Value::Array(ids));
            (StatusCode::OK, Json(Value::Object(document))).into_response()
        }
    }
}

async fn get_item(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let format = Format::from_query(&query);
    if let Err(response) = authorize(&state, &headers, format) {
        return response;
    }
    let id = match parse_id(format, &id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let store = state.store.read().await;
    let Some(items) = store.resources.get(&resource) else {
        return unknown_resource(format, &resource);
    };
    match items.get(&id) {
        Some(fields) => item_response(format, StatusCode::OK, &resource, id, fields),
        None => not_found(format, &resource, id),
    }
}

async fn create_item(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let format = Format::from_query(&query);
    if let Err(response) = authorize(&state, &headers, format) {
        return response;
    }
    let fields = match parse_fields(&body) {
        Ok(fields) => fields,
        Err(message) => {
            return error_response(format, StatusCode::BAD_REQUEST, 127, &format!("XML error: {message}"))
        }
    };
    let mut store = state.store.write().await;
    if !store.resources.contains_key(&resource) {
        return unknown_resource(format, &resource);
    }
    let id = store.allocate_id();
    store
        .resources
        .entry(resource.clone())
        .or_default()
        .insert(id, fields.clone());
    debug!(resource = %resource, id, "created item");
    item_response(format, StatusCode::CREATED, &resource, id, &fields)
}

async fn update_item(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let format = Format::from_query(&query);
    if let Err(response) = authorize(&state, &headers, format) {
        return response;
    }
    let id = match parse_id(format, &id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let fields = match parse_fields(&body) {
        Ok(fields) => fields,
        Err(message) => {
            return error_response(format, StatusCode::BAD_REQUEST, 127, &format!("XML error: {message}"))
        }
    };
    let mut store = state.store.write().await;
    let Some(items) = store.resources.get_mut(&resource) else {
        return unknown_resource(format, &resource);
    };
    match items.get_mut(&id) {
        Some(existing) => {
            *existing = fields;
            debug!(resource = %resource, id, "updated item");
            item_response(format, StatusCode::OK, &resource, id, existing)
        }
        None => not_found(format, &resource, id),
    }
}

async fn delete_item(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let format = Format::from_query(&query);
    if let Err(response) = authorize(&state, &headers, format) {
        return response;
    }
    let id = match parse_id(format, &id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut store = state.store.write().await;
    let Some(items) = store.resources.get_mut(&resource) else {
        return unknown_resource(format, &resource);
    };
    match items.remove(&id) {
        Some(_) => {
            debug!(resource = %resource, id, "deleted item");
            (StatusCode::OK, [(header::CONTENT_LENGTH, "0")]).into_response()
        }
        None => not_found(format, &resource, id),
    }
}

/// Responses a misbehaving shop produces. No authentication is checked.
async fn fault(Path(kind): Path<String>) -> Response {
    match kind.as_str() {
        "embedded-error" => error_response(Format::Xml, StatusCode::OK, 46, "Embedded error with status 200"),
        "json-error" => error_response(Format::Json, StatusCode::OK, 46, "Embedded JSON error"),
        "malformed" => xml(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<br />\n<b>Fatal error</b>: Uncaught exception in <b>/var/www/classes/webservice</b>".to_string(),
        ),
        "control-chars" => xml(
            StatusCode::OK,
            xml_document("<customer>\n\t<lastname>DOE\u{1}\u{8}JOHN</lastname>\n</customer>\n"),
        ),
        "plain" => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], "pong").into_response(),
        "server-error" => xml(
            StatusCode::SERVICE_UNAVAILABLE,
            xml_document("<maintenance>\n\t<id>1</id>\n</maintenance>\n"),
        ),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Extract the fields of `<prestashop><resource>...</resource></prestashop>`.
///
/// Only direct children of the resource element are kept; nested
/// associations are ignored, and so is `id`.
pub fn parse_fields(body: &str) -> Result<Fields, String> {
    let mut reader = Reader::from_str(body.trim());
    reader.trim_text(true);

    let mut depth = 0usize;
    let mut saw_resource = false;
    let mut current: Option<String> = None;
    let mut fields = Fields::new();
    loop {
        match reader.read_event().map_err(|err| err.to_string())? {
            Event::Start(start) => {
                depth += 1;
                match depth {
                    2 => saw_resource = true,
                    3 => {
                        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                        fields.entry(name.clone()).or_default();
                        current = Some(name);
                    }
                    _ => {}
                }
            }
            Event::Empty(start) => match depth + 1 {
                2 => saw_resource = true,
                3 => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    fields.entry(name).or_default();
                }
                _ => {}
            },
            Event::End(_) => {
                if depth == 3 {
                    current = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(text) => {
                if let (3, Some(name)) = (depth, &current) {
                    let value = text.unescape().map_err(|err| err.to_string())?;
                    fields.insert(name.clone(), value.into_owned());
                }
            }
            Event::CData(data) => {
                if let (3, Some(name)) = (depth, &current) {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    fields.insert(name.clone(), value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unclosed element".to_string());
    }
    if !saw_resource {
        return Err("missing resource element".to_string());
    }
    fields.remove("id");
    Ok(fields)
}

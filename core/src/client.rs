//! Stateless request builder and response classifier for the webservice.
//!
//! # Design
//! `WebserviceClient` holds only the API root and the credential and carries
//! no mutable state between calls. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and the [`classify`] function that
//! interprets the matching `HttpResponse`. The request's own
//! `RequestContext` travels with it, so concurrent calls never share a
//! "last request" record.

use tracing::debug;

use crate::content::{Content, ContentKind};
use crate::error::{ApiError, ClassificationFailure, UNKNOWN_MESSAGE, UNPARSABLE_MESSAGE};
use crate::http::{Credential, HttpMethod, HttpRequest, HttpResponse};
use crate::outcome::{Classification, Reply, RequestContext};

/// Synchronous, stateless client for the webservice.
///
/// Builds `HttpRequest` values and classifies `HttpResponse` values without
/// touching the network. `Webservice` pairs it with a `Transport` to run
/// the round-trip.
#[derive(Debug, Clone)]
pub struct WebserviceClient {
    base_url: String,
    credential: Credential,
}

impl WebserviceClient {
    /// `store_url` is the shop root; the API lives under `{store_url}/api/`.
    pub fn new(store_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            base_url: format!("{}/api/", store_url.trim_end_matches('/')),
            credential: Credential::new(api_key),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Build a request for `method` on `resource` (e.g. `customers/7`).
    ///
    /// `resource` must not be empty and every query key must be non-empty.
    /// Leading slashes are dropped so the path always resolves below the
    /// API root.
    pub fn build(
        &self,
        method: HttpMethod,
        resource: &str,
        params: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<HttpRequest, ApiError> {
        let resource = resource.trim_start_matches('/');
        if resource.is_empty() {
            return Err(ApiError::InvalidRequest("resource path must not be empty".to_string()));
        }
        if params.iter().any(|(key, _)| key.is_empty()) {
            return Err(ApiError::InvalidRequest("query parameter keys must not be empty".to_string()));
        }
        Ok(HttpRequest {
            method,
            base_url: self.base_url.clone(),
            resource: resource.to_string(),
            query: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            headers: vec![(
                "authorization".to_string(),
                self.credential.authorization_header(),
            )],
            body,
        })
    }

    pub fn build_get(&self, resource: &str, params: &[(&str, &str)]) -> Result<HttpRequest, ApiError> {
        self.build(HttpMethod::Get, resource, params, None)
    }

    /// `body` should be one resource as an XML document.
    pub fn build_post(
        &self,
        resource: &str,
        body: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpRequest, ApiError> {
        self.build(HttpMethod::Post, resource, params, Some(body.to_string()))
    }

    pub fn build_put(
        &self,
        resource: &str,
        body: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpRequest, ApiError> {
        self.build(HttpMethod::Put, resource, params, Some(body.to_string()))
    }

    pub fn build_delete(&self, resource: &str, params: &[(&str, &str)]) -> Result<HttpRequest, ApiError> {
        self.build(HttpMethod::Delete, resource, params, None)
    }

    /// Classify the response to `request` and surface a failure as an error.
    pub fn parse(&self, request: &HttpRequest, response: &HttpResponse) -> Result<Reply, ApiError> {
        Ok(classify(response, &request.context()).into_reply()?)
    }
}

/// Decide what `response` means.
///
/// In order:
/// 1. `404` is `NotFound`; the body is not looked at.
/// 2. `200` with `Content-Length: 0` is `EmptySuccess`, whatever the
///    content type.
/// 3. Otherwise the body is parsed according to its `Content-Type`. An
///    embedded error message or a parse failure marks the response failed
///    even when the status is `2xx`.
/// 4. A `2xx` response with no error mark is `Parsed`; anything else is a
///    `Failure` carrying the request context and the best message known.
pub fn classify(response: &HttpResponse, context: &RequestContext) -> Classification {
    if response.status == 404 {
        debug!(method = %context.method, uri = %context.uri, "resource not found");
        return Classification::NotFound;
    }
    if response.status == 200 && has_zero_content_length(response) {
        debug!(method = %context.method, uri = %context.uri, "empty success");
        return Classification::EmptySuccess;
    }

    let kind = ContentKind::from_content_type(response.header("content-type"));
    let (content, message) = match Content::parse(kind, &response.body) {
        Ok(content) => {
            let message = content.embedded_error();
            (Some(content), message)
        }
        Err(err) => {
            debug!(uri = %context.uri, error = %err, "discarding parser diagnostics");
            (None, Some(UNPARSABLE_MESSAGE.to_string()))
        }
    };

    match (content, message) {
        (Some(content), None) if response.is_success() => Classification::Parsed(content),
        (_, message) => {
            let failure = ClassificationFailure {
                status: response.status,
                reason: response.reason_phrase().to_string(),
                method: context.method,
                uri: context.uri.clone(),
                params: context.params.clone(),
                message: message.unwrap_or_else(|| UNKNOWN_MESSAGE.to_string()),
            };
            debug!(
                method = %failure.method,
                uri = %failure.uri,
                status = failure.status,
                message = %failure.message,
                "response classified as failure"
            );
            Classification::Failure(failure)
        }
    }
}

fn has_zero_content_length(response: &HttpResponse) -> bool {
    response
        .header("content-length")
        .and_then(|value| value.trim().parse::<u64>().ok())
        == Some(0)
}

//! Executing `HttpRequest` values over the network.
//!
//! # Design
//! The core never performs I/O itself; `Webservice` hands every built
//! request to a `Transport`. `ReqwestTransport` is the production
//! implementation; tests substitute their own to script responses and
//! connection failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

const USER_AGENT: &str = concat!("prestashop-core/", env!("CARGO_PKG_VERSION"));

/// Executes one request and returns the raw response.
///
/// Non-2xx statuses are responses, not errors: only failures that leave no
/// response at all (connection refused, DNS, timeout) are `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `Transport` backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http })
    }

    /// Use a preconfigured `reqwest::Client` (proxy, custom TLS, ...).
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(err)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url()?;
        debug!(method = %request.method, url = %url, "sending request");

        let mut builder = self.http.request(method(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response.bytes().await.map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

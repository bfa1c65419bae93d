//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe webservice requests and responses as plain data.
//! `WebserviceClient` builds `HttpRequest` values and classifies
//! `HttpResponse` values without touching the network; a `Transport`
//! implementation (or any other host) executes the round-trip in between.
//!
//! All fields use owned types (`String`, `Vec`) so a request can be moved
//! into a spawned future or another thread without lifetime concerns.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use url::Url;

use crate::outcome::RequestContext;

/// Ordered query parameters, appended verbatim to the request URL.
pub type QueryParams = Vec<(String, String)>;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The webservice key, used as the username of HTTP basic auth with an
/// empty password.
///
/// `Debug` never prints the key so requests can be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    key: String,
}

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value of the `Authorization` header: `Basic base64("{key}:")`.
    pub fn authorization_header(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:", self.key)))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("key", &"<redacted>").finish()
    }
}

/// A webservice request described as plain data.
///
/// Built by `WebserviceClient::build_*` methods. `resource` never includes
/// the API base; `query` is kept unencoded and only percent-encoded when
/// the full URL is produced by [`HttpRequest::url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// API root, always ending in `/api/`.
    pub base_url: String,
    pub resource: String,
    pub query: QueryParams,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Base URL joined with the resource path, without the query string.
    pub fn path(&self) -> String {
        format!("{}{}", self.base_url, self.resource)
    }

    /// The full URL, with `query` appended as a standard encoded query string.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.base_url)?.join(&self.resource)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }

    /// The diagnostic context attached to a failure of this request.
    pub fn context(&self) -> RequestContext {
        RequestContext {
            method: self.method,
            uri: self.resource.clone(),
            params: self.query.clone(),
        }
    }
}

/// A webservice response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`, then
/// passed to `WebserviceClient::classify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// First value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Canonical reason phrase for `status`, empty when the code is unknown.
    pub fn reason_phrase(&self) -> &'static str {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(resource: &str, query: &[(&str, &str)]) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            base_url: "http://shop.test/api/".to_string(),
            resource: resource.to_string(),
            query: query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn authorization_header_uses_key_and_empty_password() {
        let credential = Credential::new("ABC");
        // base64("ABC:")
        assert_eq!(credential.authorization_header(), "Basic QUJDOg==");
    }

    #[test]
    fn credential_debug_redacts_key() {
        let rendered = format!("{:?}", Credential::new("SECRET"));
        assert!(!rendered.contains("SECRET"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn url_without_query_has_no_question_mark() {
        let url = request("customers/7", &[]).url().unwrap();
        assert_eq!(url.as_str(), "http://shop.test/api/customers/7");
    }

    #[test]
    fn url_encodes_query_in_order() {
        let url = request("customers", &[("display", "[id,email]"), ("filter[id]", "7")])
            .url()
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://shop.test/api/customers?display=%5Bid%2Cemail%5D&filter%5Bid%5D=7"
        );
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_takes_first() {
        let response = HttpResponse {
            status: 200,
            headers: vec![
                ("content-type".to_string(), "text/xml".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: String::new(),
        };
        assert_eq!(response.header("CONTENT-TYPE"), Some("text/xml"));
        assert_eq!(response.header("content-length"), None);
    }

    #[test]
    fn reason_phrase_falls_back_to_empty() {
        let mut response = HttpResponse {
            status: 500,
            headers: Vec::new(),
            body: String::new(),
        };
        assert_eq!(response.reason_phrase(), "Internal Server Error");
        response.status = 599;
        assert_eq!(response.reason_phrase(), "");
    }
}

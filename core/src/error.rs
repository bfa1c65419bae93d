//! Error types for the webservice client.
//!
//! # Design
//! `NotFound` and empty successes are not errors; they are `Reply`
//! variants. The only error a caller sees for a completed round-trip is
//! `ClassificationFailure`, which carries enough context to log which
//! request failed and why. Parser diagnostics (`ContentError`) stay inside
//! the classifier and are collapsed into a generic message.

use thiserror::Error;

use crate::http::{HttpMethod, QueryParams};

/// Message used when a failed response never produced one of its own.
pub const UNKNOWN_MESSAGE: &str = "UNKNOWN";

/// Message used when the response body could not be parsed.
pub const UNPARSABLE_MESSAGE: &str = "response body could not be parsed";

/// Why a response body could not be turned into a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// The body was empty where content was expected.
    #[error("response body is empty")]
    Empty,

    /// The body is present but structurally invalid. Carries every
    /// diagnostic the parser reported, joined into one message.
    #[error("response body is not parsable: {0}")]
    Unparsable(String),
}

/// A response that could not be classified as found, not-found, or empty
/// success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method} {uri} failed with HTTP {status} {reason}: {message}")]
pub struct ClassificationFailure {
    /// HTTP status code of the response, used as the error code.
    pub status: u16,
    /// Canonical reason phrase for `status`, not the text the server sent.
    pub reason: String,
    pub method: HttpMethod,
    /// Resource path of the failed request, without the API base.
    pub uri: String,
    pub params: QueryParams,
    /// Server-reported message, or one of the fixed fallbacks.
    pub message: String,
}

/// Transport-level failure: the request never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP client error (DNS, TLS, connection reset, ...).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The request URL could not be built.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Any other transport failure reported by a custom transport.
    #[error("transport error: {0}")]
    Other(String),
}

/// Errors returned by `Webservice` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The response was received but classified as a failure.
    #[error(transparent)]
    Classification(#[from] ClassificationFailure),

    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request could not be built from the given arguments.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// The structured failure, when this error came from classification.
    pub fn as_failure(&self) -> Option<&ClassificationFailure> {
        match self {
            ApiError::Classification(failure) => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_names_request_and_status() {
        let failure = ClassificationFailure {
            status: 500,
            reason: "Internal Server Error".to_string(),
            method: HttpMethod::Get,
            uri: "customers/7".to_string(),
            params: vec![("display".to_string(), "full".to_string())],
            message: UNKNOWN_MESSAGE.to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "GET customers/7 failed with HTTP 500 Internal Server Error: UNKNOWN"
        );
    }

    #[test]
    fn as_failure_only_matches_classification() {
        let err = ApiError::InvalidRequest("empty resource path".to_string());
        assert!(err.as_failure().is_none());
        let err = ApiError::Transport(TransportError::Timeout);
        assert!(err.as_failure().is_none());
    }
}

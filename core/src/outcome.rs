//! Classification outcomes and the per-call request context.
//!
//! # Design
//! The classifier produces exactly one `Classification` per response.
//! Callers of the CRUD methods see the three non-failure states as a
//! `Reply` and the failure as `ApiError::Classification`, so "not found"
//! is a normal value rather than an error.

use crate::content::Content;
use crate::error::ClassificationFailure;
use crate::http::{HttpMethod, QueryParams};

/// Method, resource path, and query parameters of one request, carried
/// from the builder to the classifier so a failure can name the request
/// that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: HttpMethod,
    pub uri: String,
    pub params: QueryParams,
}

/// What a single response means.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// `404`: the resource does not exist.
    NotFound,
    /// `200` with `Content-Length: 0`, e.g. a successful delete.
    EmptySuccess,
    /// `2xx` with content that parsed and carried no embedded error.
    Parsed(Content),
    Failure(ClassificationFailure),
}

impl Classification {
    pub fn into_reply(self) -> Result<Reply, ClassificationFailure> {
        match self {
            Classification::NotFound => Ok(Reply::NotFound),
            Classification::EmptySuccess => Ok(Reply::EmptySuccess),
            Classification::Parsed(content) => Ok(Reply::Parsed(content)),
            Classification::Failure(failure) => Err(failure),
        }
    }
}

/// Successful result of a webservice call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    NotFound,
    EmptySuccess,
    Parsed(Content),
}

impl Reply {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Reply::NotFound)
    }

    pub fn is_empty_success(&self) -> bool {
        matches!(self, Reply::EmptySuccess)
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            Reply::Parsed(content) => Some(content),
            _ => None,
        }
    }

    pub fn into_content(self) -> Option<Content> {
        match self {
            Reply::Parsed(content) => Some(content),
            _ => None,
        }
    }
}

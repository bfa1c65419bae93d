//! Client core for the PrestaShop webservice API.
//!
//! # Overview
//! Builds authenticated `HttpRequest` values for `resource/id` endpoints and
//! classifies `HttpResponse` values into one of four outcomes: not found,
//! empty success, parsed content, or a structured failure. The server's
//! habit of reporting errors inside `2xx` XML or JSON bodies is normalized
//! here, so callers only ever see a `Reply` or an `ApiError`.
//!
//! # Design
//! - `WebserviceClient` is stateless and performs no I/O (host-does-IO):
//!   `build_*` produces a request, [`classify`] interprets the response.
//! - `Webservice` pairs the client with a `Transport` for async callers and
//!   adds batch fetching and transfer statistics.
//! - Each request carries its own `RequestContext`, so failures always
//!   describe the request that caused them, even under concurrency.

pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod outcome;
pub mod stats;
pub mod transport;
pub mod webservice;

pub use client::{classify, WebserviceClient};
pub use config::{ConfigError, WebserviceConfig};
pub use content::{parse_json, parse_xml, sanitize_xml, Content, ContentKind, XmlElement};
pub use error::{ApiError, ClassificationFailure, ContentError, TransportError};
pub use http::{Credential, HttpMethod, HttpRequest, HttpResponse, QueryParams};
pub use outcome::{Classification, Reply, RequestContext};
pub use stats::{StatLookup, StatName, StatValue, TransferStats};
pub use transport::{ReqwestTransport, Transport};
pub use webservice::{BatchRequest, FetchMode, Webservice};

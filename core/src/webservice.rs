//! Async webservice client: builds, sends, and classifies requests.
//!
//! # Design
//! `Webservice` glues the stateless `WebserviceClient` to a `Transport`.
//! Every call builds its own `HttpRequest`, so the request context used to
//! describe a failure always belongs to that call, even when many calls
//! run concurrently on one `Webservice`. The only state shared between
//! calls is the statistics of the most recently completed request.
//!
//! Batch fetching comes in two modes. Sequential mode behaves exactly like
//! calling `get` in a loop. Concurrent mode dispatches fixed-size batches,
//! waits for the whole batch to settle, and then classifies its responses
//! in submission order. A request that fails in transit is dropped from
//! the results; a response that classifies as a failure aborts the fetch.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{classify, WebserviceClient};
use crate::config::WebserviceConfig;
use crate::error::{ApiError, TransportError};
use crate::http::{HttpRequest, HttpResponse, QueryParams};
use crate::outcome::Reply;
use crate::stats::{StatLookup, TransferStats};
use crate::transport::{ReqwestTransport, Transport};

/// One entry of a batch fetch.
///
/// Entries without a resource path are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchRequest {
    pub resource: Option<String>,
    #[serde(default)]
    pub params: QueryParams,
}

impl BatchRequest {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: Some(resource.into()),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// How `Webservice::fetch_all` schedules its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One request completes before the next starts.
    Sequential,
    /// At most `limit` requests in flight; each batch settles before the
    /// next is dispatched. A limit of zero is treated as one.
    Concurrent { limit: usize },
}

/// Webservice client that performs the HTTP round-trip.
#[derive(Debug)]
pub struct Webservice<T = ReqwestTransport> {
    client: WebserviceClient,
    transport: T,
    concurrency_limit: usize,
    last_stats: Mutex<Option<TransferStats>>,
}

impl Webservice<ReqwestTransport> {
    /// Creates a client for the shop at `store_url` with default settings.
    pub fn new(store_url: &str, api_key: impl Into<String>) -> Result<Self, TransportError> {
        Self::from_config(&WebserviceConfig::new(store_url, api_key))
    }

    pub fn from_config(config: &WebserviceConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.timeout())?;
        let client = WebserviceClient::new(&config.base_url, config.api_key.clone());
        Ok(Self::with_transport(client, transport).with_concurrency_limit(config.concurrency_limit))
    }
}

impl<T: Transport> Webservice<T> {
    pub fn with_transport(client: WebserviceClient, transport: T) -> Self {
        Self {
            client,
            transport,
            concurrency_limit: crate::config::DEFAULT_CONCURRENCY_LIMIT,
            last_stats: Mutex::new(None),
        }
    }

    /// Batch size used by [`Webservice::fetch_concurrent`].
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn client(&self) -> &WebserviceClient {
        &self.client
    }

    /// `GET {resource}`: a single item (`customers/7`) or a list (`customers`).
    pub async fn get(&self, resource: &str, params: &[(&str, &str)]) -> Result<Reply, ApiError> {
        let request = self.client.build_get(resource, params)?;
        self.send(request).await
    }

    /// `POST {resource}`: create an item from the XML document in `body`.
    pub async fn post(
        &self,
        resource: &str,
        body: &str,
        params: &[(&str, &str)],
    ) -> Result<Reply, ApiError> {
        let request = self.client.build_post(resource, body, params)?;
        self.send(request).await
    }

    /// `PUT {resource}/{id}`: replace an item with the XML document in `body`.
    pub async fn put(
        &self,
        resource: &str,
        body: &str,
        params: &[(&str, &str)],
    ) -> Result<Reply, ApiError> {
        let request = self.client.build_put(resource, body, params)?;
        self.send(request).await
    }

    /// `DELETE {resource}/{id}`: `EmptySuccess` when deleted, `NotFound`
    /// when there was nothing to delete.
    pub async fn delete(&self, resource: &str, params: &[(&str, &str)]) -> Result<Reply, ApiError> {
        let request = self.client.build_delete(resource, params)?;
        self.send(request).await
    }

    /// Execute an already built request and classify its response.
    pub async fn send(&self, request: HttpRequest) -> Result<Reply, ApiError> {
        let response = self.execute(&request).await?;
        Ok(classify(&response, &request.context()).into_reply()?)
    }

    /// Fetch every entry of `requests` with `mode`.
    ///
    /// Returns `Ok(None)` when no entry has a resource path, so "nothing to
    /// do" is distinguishable from "ran and found nothing". Results follow
    /// submission order, minus requests dropped in transit.
    pub async fn fetch_all(
        &self,
        requests: &[BatchRequest],
        mode: FetchMode,
    ) -> Result<Option<Vec<Reply>>, ApiError> {
        let prepared = self.prepare(requests)?;
        if prepared.is_empty() {
            return Ok(None);
        }
        let replies = match mode {
            FetchMode::Sequential => self.run_sequential(prepared).await?,
            FetchMode::Concurrent { limit } => self.run_concurrent(&prepared, limit.max(1)).await?,
        };
        Ok(Some(replies))
    }

    /// Concurrent fetch using the configured concurrency limit.
    pub async fn fetch_concurrent(&self, requests: &[BatchRequest]) -> Result<Option<Vec<Reply>>, ApiError> {
        let limit = self.concurrency_limit;
        self.fetch_all(requests, FetchMode::Concurrent { limit }).await
    }

    pub async fn fetch_sequential(&self, requests: &[BatchRequest]) -> Result<Option<Vec<Reply>>, ApiError> {
        self.fetch_all(requests, FetchMode::Sequential).await
    }

    /// Statistics of the most recently completed request.
    ///
    /// A request that fails in transit records nothing, so the statistics
    /// of the previous completed request stay in place.
    pub fn last_stats(&self) -> Option<TransferStats> {
        self.last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Look up one statistic of the most recent request by name, e.g.
    /// `transfer-time` or `effective-uri`.
    pub fn stat(&self, name: &str) -> StatLookup {
        StatLookup::lookup(self.last_stats().as_ref(), name)
    }

    fn prepare(&self, requests: &[BatchRequest]) -> Result<Vec<HttpRequest>, ApiError> {
        requests
            .iter()
            .filter_map(|entry| {
                let resource = entry.resource.as_deref()?;
                if resource.trim_start_matches('/').is_empty() {
                    return None;
                }
                let params: Vec<(&str, &str)> = entry
                    .params
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str()))
                    .collect();
                Some(self.client.build_get(resource, &params))
            })
            .collect()
    }

    async fn run_sequential(&self, requests: Vec<HttpRequest>) -> Result<Vec<Reply>, ApiError> {
        let mut replies = Vec::with_capacity(requests.len());
        for request in requests {
            replies.push(self.send(request).await?);
        }
        Ok(replies)
    }

    async fn run_concurrent(&self, requests: &[HttpRequest], limit: usize) -> Result<Vec<Reply>, ApiError> {
        let mut replies = Vec::with_capacity(requests.len());
        for (index, batch) in requests.chunks(limit).enumerate() {
            debug!(batch = index, size = batch.len(), "dispatching batch");
            let settled = join_all(batch.iter().map(|request| self.execute(request))).await;
            for (request, result) in batch.iter().zip(settled) {
                match result {
                    Ok(response) => {
                        replies.push(classify(&response, &request.context()).into_reply()?);
                    }
                    Err(err) => {
                        warn!(
                            method = %request.method,
                            uri = %request.resource,
                            error = %err,
                            "dropping request that failed in transit"
                        );
                    }
                }
            }
        }
        Ok(replies)
    }

    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, uri = %request.resource, "dispatching request");
        let started = Instant::now();
        let response = self.transport.execute(request).await?;
        let effective_uri = request
            .url()
            .map(|url| url.to_string())
            .unwrap_or_else(|_| request.path());
        self.record(TransferStats {
            transfer_time: started.elapsed(),
            effective_uri,
            status_code: response.status,
            body_size: response.body.len(),
        });
        Ok(response)
    }

    fn record(&self, stats: TransferStats) {
        *self.last_stats.lock().unwrap_or_else(PoisonError::into_inner) = Some(stats);
    }
}

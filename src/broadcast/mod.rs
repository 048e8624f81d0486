//! Broadcast coordination: one inbound request in, one aggregated reply out.
//!
//! [`Broadcaster::broadcast`] resolves the target caches from the current
//! registry snapshot, submits one [`Job`] per cache in resolution order,
//! then reads every job's result exactly once in that same order. The
//! per-cache statuses form the JSON body; the reply status stays 200
//! unless enforce mode adopts the first non-200 result seen.
//! The axum entry point lives in [`handler`].

pub mod handler;
pub mod headers;

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, Method, StatusCode};

use crate::dispatch::{DispatchTarget, Job, JobOutcome, WorkerPool};
use crate::error::BroadcasterError;
use crate::registry::Registry;

use headers::{build_forwarded_headers, ForwardOptions};

pub const DEFAULT_GROUP_HEADER: &str = "x-group";

#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Adopt the first non-200 cache status as the reply status.
    pub enforce: bool,
    /// Replay inbound headers to caches.
    pub forward_headers: bool,
    pub group_header: HeaderName,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            enforce: false,
            forward_headers: true,
            group_header: HeaderName::from_static(DEFAULT_GROUP_HEADER),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct BroadcastReport {
    pub status: StatusCode,
    /// Cache name to the status it answered (500 when unreachable).
    pub results: HashMap<String, u16>,
}

/// Group named by the selector header, empty only when the header is absent.
///
/// Values that are not valid UTF-8 are decoded lossily, so they name a
/// group that cannot exist instead of falling back to every cache.
#[must_use]
pub fn requested_group<'a>(headers: &'a HeaderMap, group_header: &HeaderName) -> Cow<'a, str> {
    headers
        .get(group_header)
        .map_or(Cow::Borrowed(""), |v| String::from_utf8_lossy(v.as_bytes()))
}

/// Folds per-cache outcomes, in submission order, into a report.
#[derive(Debug)]
pub struct Aggregate {
    enforce: bool,
    status: StatusCode,
    results: HashMap<String, u16>,
}

impl Aggregate {
    #[must_use]
    pub fn new(enforce: bool, expected: usize) -> Self {
        Self {
            enforce,
            status: StatusCode::OK,
            results: HashMap::with_capacity(expected),
        }
    }

    /// Record one cache's outcome and return the status it counts as.
    pub fn record(&mut self, destination: &str, outcome: &JobOutcome) -> StatusCode {
        let code = match outcome {
            Ok(status) => *status,
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if self.enforce && self.status == StatusCode::OK {
            self.status = code;
        }
        self.results.insert(destination.to_string(), code.as_u16());
        code
    }

    #[must_use]
    pub fn finish(self) -> BroadcastReport {
        BroadcastReport {
            status: self.status,
            results: self.results,
        }
    }
}

pub struct Broadcaster {
    registry: Arc<Registry>,
    workers: Arc<WorkerPool>,
    settings: BroadcastSettings,
}

impl Broadcaster {
    #[must_use]
    pub fn new(registry: Arc<Registry>, workers: Arc<WorkerPool>, settings: BroadcastSettings) -> Self {
        Self {
            registry,
            workers,
            settings,
        }
    }

    /// Replay `request` against every cache it selects and aggregate the results.
    ///
    /// Fails only with [`BroadcasterError::GroupNotFound`]; per-cache
    /// failures are reported inside the returned [`BroadcastReport`].
    pub async fn broadcast(
        &self,
        request: BroadcastRequest,
    ) -> Result<BroadcastReport, BroadcasterError> {
        let group = requested_group(&request.headers, &self.settings.group_header);
        let snapshot = self.registry.snapshot();
        let destinations = snapshot.resolve(group.trim())?;

        if destinations.is_empty() {
            return Ok(BroadcastReport {
                status: StatusCode::NO_CONTENT,
                results: HashMap::new(),
            });
        }

        let options = ForwardOptions {
            forward: self.settings.forward_headers,
            group_header: &self.settings.group_header,
            correlation_id: &request.correlation_id,
        };

        let mut handles = Vec::with_capacity(destinations.len());
        for destination in destinations {
            let headers = build_forwarded_headers(&request.headers, &destination.address, &options);
            let (job, handle) = Job::new(DispatchTarget {
                destination: destination.clone(),
                method: request.method.clone(),
                path: request.path.clone(),
                headers,
            });
            // A rejected job is dropped here; its handle then reads as QueueClosed
            if let Err(e) = self.workers.submit(job).await {
                tracing::error!(
                    correlation_id = %request.correlation_id,
                    destination = %destination.name,
                    error = %e,
                    "failed to enqueue job"
                );
            }
            handles.push(handle);
        }

        let mut aggregate = Aggregate::new(self.settings.enforce, handles.len());
        for handle in handles {
            let destination = handle.destination().to_string();
            let outcome = handle.outcome().await;
            let code = aggregate.record(&destination, &outcome);
            match outcome {
                Ok(_) => tracing::info!(
                    correlation_id = %request.correlation_id,
                    method = %request.method,
                    destination = %destination,
                    path = %request.path,
                    status = code.as_u16(),
                    "cache responded"
                ),
                Err(e) => tracing::warn!(
                    correlation_id = %request.correlation_id,
                    method = %request.method,
                    destination = %destination,
                    path = %request.path,
                    error = %e,
                    "cache request failed"
                ),
            }
        }

        Ok(aggregate.finish())
    }
}

//! Axum fallback handler: every inbound request is a broadcast.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use super::headers::CORRELATION_ID;
use super::{BroadcastReport, BroadcastRequest, Broadcaster};
use crate::error::BroadcasterError;

pub async fn broadcast_handler(
    State(broadcaster): State<Arc<Broadcaster>>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
) -> Response {
    let correlation_id = req_headers
        .get(CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let request = BroadcastRequest {
        method,
        path: uri.path().to_string(),
        headers: req_headers,
        correlation_id,
    };
    let correlation_id = request.correlation_id.clone();

    match broadcaster.broadcast(request).await {
        Ok(report) => render(report),
        Err(BroadcasterError::GroupNotFound(group)) => {
            tracing::info!(
                correlation_id = %correlation_id,
                group = %group,
                "requested group not found"
            );
            (StatusCode::NOT_FOUND, "Group not found.").into_response()
        }
        Err(e) => {
            tracing::error!(
                correlation_id = %correlation_id,
                error = %e,
                "broadcast failed"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serialize a report as the reply: pretty JSON with two-space indentation.
#[must_use]
pub fn render(report: BroadcastReport) -> Response {
    if report.status == StatusCode::NO_CONTENT {
        return StatusCode::NO_CONTENT.into_response();
    }

    match serde_json::to_vec_pretty(&report.results) {
        Ok(body) => (
            report.status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize broadcast report");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

//! Request-scoped tracing helpers.
//!
//! A per-request id is carried both in a tracing span field and in a tokio
//! task-local, so error bodies and response metadata can embed it without
//! threading it through every call.

use std::cell::RefCell;

use tower_http::classify::{SharedClassifier, StatusInRangeAsFailures};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Request ID tracking information.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

/// Runs `future` with the given request id installed in the task-local.
pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

/// The request id of the currently executing request, if any.
pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// HTTP tracing layer: one span per request, 5xx classified as failures.
pub fn configure_http_tracing() -> TraceLayer<SharedClassifier<StatusInRangeAsFailures>> {
    TraceLayer::new(StatusInRangeAsFailures::new(500..=599).into_make_classifier())
}

//! The cloud API boundary.
//!
//! Adapters never talk to AWS directly; they issue `ApiCall`s through the
//! `CloudTransport` trait. The authenticated, SDK-backed implementation is
//! supplied by the embedding application; this crate ships a replay
//! implementation over recorded responses (also the test harness) and a
//! retrying wrapper.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{Map, Value};
use thiserror::Error;

/// Transport-level failures, mapped from the underlying API's error codes
/// by the transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The caller lacks permission for this call. Per-resource: the
    /// orchestrator reports the resource as Indeterminate and moves on.
    #[error("access denied on {operation}: {message}")]
    AccessDenied { operation: String, message: String },

    /// The API throttled the call. Retried by `RetryTransport`; surfaced
    /// only after retries are exhausted.
    #[error("throttled on {operation}")]
    Throttled { operation: String },

    /// The target (usually a policy) does not exist. Adapters map this to
    /// "no policy attached".
    #[error("not found: {operation}")]
    NotFound { operation: String },

    /// A response did not have the wire shape the adapter expected.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Any other API failure.
    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },
}

/// One API call: service, operation, and JSON parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub service: &'static str,
    pub operation: &'static str,
    pub params: Value,
}

impl ApiCall {
    pub fn new(service: &'static str, operation: &'static str) -> Self {
        Self {
            service,
            operation,
            params: Value::Null,
        }
    }

    /// Add one named parameter, building up an object.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !self.params.is_object() {
            self.params = Value::Object(Map::new());
        }
        if let Some(object) = self.params.as_object_mut() {
            object.insert(key.to_string(), value.into());
        }
        self
    }

    /// `service.Operation`, for logs and error messages.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.service, self.operation)
    }
}

/// One page of a list call.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub records: Vec<Value>,
    /// Continuation token; `None` means the listing is complete.
    pub next: Option<String>,
}

/// Opaque authenticated client for enumeration and policy fetches.
#[async_trait]
pub trait CloudTransport: Send + Sync {
    /// Execute one page of a paginated list call.
    async fn list(
        &self,
        call: &ApiCall,
        cursor: Option<String>,
    ) -> Result<ListPage, TransportError>;

    /// Execute a single get call.
    async fn get(&self, call: &ApiCall) -> Result<Value, TransportError>;
}

/// Lazily walk every page of a list call, yielding individual records.
///
/// Pages are fetched on demand as the stream is polled, so dropping the
/// stream cancels any remaining pagination.
pub fn page_stream(
    transport: Arc<dyn CloudTransport>,
    call: ApiCall,
) -> BoxStream<'static, Result<Value, TransportError>> {
    struct PageState {
        transport: Arc<dyn CloudTransport>,
        call: ApiCall,
        cursor: Option<String>,
        buffered: VecDeque<Value>,
        exhausted: bool,
    }

    let state = PageState {
        transport,
        call,
        cursor: None,
        buffered: VecDeque::new(),
        exhausted: false,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(record) = state.buffered.pop_front() {
                return Ok(Some((record, state)));
            }
            if state.exhausted {
                return Ok(None);
            }
            let page = state
                .transport
                .list(&state.call, state.cursor.take())
                .await?;
            state.cursor = page.next;
            state.exhausted = state.cursor.is_none();
            state.buffered.extend(page.records);
        }
    })
    .boxed()
}

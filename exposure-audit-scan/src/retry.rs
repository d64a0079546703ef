//! Bounded exponential backoff around a transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::transport::{ApiCall, CloudTransport, ListPage, TransportError};

const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(250);

/// Retries throttled calls with exponential backoff. All other errors
/// pass through untouched. Exhaustion surfaces the final `Throttled`
/// error; the orchestrator converts that into an Indeterminate finding
/// rather than dropping the resource.
pub struct RetryTransport {
    inner: Arc<dyn CloudTransport>,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryTransport {
    pub fn new(inner: Arc<dyn CloudTransport>) -> Self {
        Self {
            inner,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_policy(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }
}

#[async_trait]
impl CloudTransport for RetryTransport {
    async fn list(
        &self,
        call: &ApiCall,
        cursor: Option<String>,
    ) -> Result<ListPage, TransportError> {
        let mut delay = self.base_delay;
        let mut attempt = 1;
        loop {
            match self.inner.list(call, cursor.clone()).await {
                Err(TransportError::Throttled { operation }) if attempt < self.max_attempts => {
                    debug!(
                        "throttled on {operation} (attempt {attempt}/{}), backing off {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn get(&self, call: &ApiCall) -> Result<Value, TransportError> {
        let mut delay = self.base_delay;
        let mut attempt = 1;
        loop {
            match self.inner.get(call).await {
                Err(TransportError::Throttled { operation }) if attempt < self.max_attempts => {
                    debug!(
                        "throttled on {operation} (attempt {attempt}/{}), backing off {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

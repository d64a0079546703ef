//! SQS queue policies.
//!
//! `ListQueues` records are plain queue URLs; the policy lives in the
//! queue's attribute map.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{json, Value};

use exposure_audit_engine::ResourceIdentity;

use super::{ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct SqsQueues {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl SqsQueues {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

fn queue_url(record: &Value) -> Result<&str, TransportError> {
    record.as_str().ok_or_else(|| {
        TransportError::UnexpectedShape("queue record is not a URL string".to_string())
    })
}

fn queue_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[async_trait]
impl ResourceAdapter for SqsQueues {
    fn service(&self) -> ServiceKey {
        ServiceKey::Sqs
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(self.transport.clone(), ApiCall::new("sqs", "ListQueues"))
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let url = queue_url(record)?;
        let call = ApiCall::new("sqs", "GetQueueAttributes")
            .param("QueueUrl", url)
            .param("AttributeNames", json!(["Policy"]));
        match self.transport.get(&call).await {
            Ok(response) => Ok(response
                .get("Attributes")
                .and_then(|attributes| attributes.get("Policy"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .into_iter()
                .collect()),
            Err(TransportError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let url = queue_url(record)?;
        let name = queue_name(url);
        Ok(ResourceIdentity::new(
            name,
            Some(&format!(
                "arn:aws:sqs:{}:{}:{}",
                self.context.region, self.context.account_id, name
            )),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

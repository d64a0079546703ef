//! SNS topic policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct SnsTopics {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl SnsTopics {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for SnsTopics {
    fn service(&self) -> ServiceKey {
        ServiceKey::Sns
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(self.transport.clone(), ApiCall::new("sns", "ListTopics"))
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let arn = str_field(record, "TopicArn")?;
        let call = ApiCall::new("sns", "GetTopicAttributes").param("TopicArn", arn);
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
        let arn = str_field(record, "TopicArn")?;
        let name = arn.rsplit(':').next().unwrap_or(arn);
        Ok(ResourceIdentity::new(
            name,
            Some(arn),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

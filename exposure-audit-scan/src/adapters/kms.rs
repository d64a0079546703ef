//! KMS key policies. Every key has exactly one policy, named `default`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{fetch_optional_policy, opt_string_field, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct KmsKeys {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl KmsKeys {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for KmsKeys {
    fn service(&self) -> ServiceKey {
        ServiceKey::Kms
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(self.transport.clone(), ApiCall::new("kms", "ListKeys"))
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let key_id = str_field(record, "KeyId")?;
        let call = ApiCall::new("kms", "GetKeyPolicy")
            .param("KeyId", key_id)
            .param("PolicyName", "default");
        fetch_optional_policy(self.transport.as_ref(), call, "Policy").await
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let key_id = str_field(record, "KeyId")?;
        let arn = opt_string_field(record, "KeyArn").unwrap_or_else(|| {
            format!(
                "arn:aws:kms:{}:{}:key/{key_id}",
                self.context.region, self.context.account_id
            )
        });
        Ok(ResourceIdentity::new(
            key_id,
            Some(&arn),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

//! Secrets Manager resource policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{fetch_optional_policy, opt_string_field, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct SecretsManagerSecrets {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl SecretsManagerSecrets {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for SecretsManagerSecrets {
    fn service(&self) -> ServiceKey {
        ServiceKey::SecretsManager
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(
            self.transport.clone(),
            ApiCall::new("secretsmanager", "ListSecrets"),
        )
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let arn = str_field(record, "ARN")?;
        let call = ApiCall::new("secretsmanager", "GetResourcePolicy").param("SecretId", arn);
        fetch_optional_policy(self.transport.as_ref(), call, "ResourcePolicy").await
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "Name")?;
        let arn = opt_string_field(record, "ARN");
        Ok(ResourceIdentity::new(
            name,
            arn.as_deref(),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

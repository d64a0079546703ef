//! Glacier vault access policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{opt_string_field, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct GlacierVaults {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl GlacierVaults {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for GlacierVaults {
    fn service(&self) -> ServiceKey {
        ServiceKey::Glacier
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        // "-" selects the account the credentials belong to.
        page_stream(
            self.transport.clone(),
            ApiCall::new("glacier", "ListVaults").param("accountId", "-"),
        )
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let name = str_field(record, "VaultName")?;
        let call = ApiCall::new("glacier", "GetVaultAccessPolicy")
            .param("accountId", "-")
            .param("vaultName", name);
        match self.transport.get(&call).await {
            // The policy document is nested one level down.
            Ok(response) => Ok(response
                .get("policy")
                .map(|policy| opt_string_field(policy, "Policy"))
                .unwrap_or_default()
                .into_iter()
                .collect()),
            Err(TransportError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "VaultName")?;
        let arn = opt_string_field(record, "VaultARN").unwrap_or_else(|| {
            format!(
                "arn:aws:glacier:{}:{}:vaults/{name}",
                self.context.region, self.context.account_id
            )
        });
        Ok(ResourceIdentity::new(
            name,
            Some(&arn),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

//! ACM Private CA resource policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{fetch_optional_policy, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct AcmPcaCertificateAuthorities {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl AcmPcaCertificateAuthorities {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for AcmPcaCertificateAuthorities {
    fn service(&self) -> ServiceKey {
        ServiceKey::AcmPca
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(
            self.transport.clone(),
            ApiCall::new("acm-pca", "ListCertificateAuthorities"),
        )
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let arn = str_field(record, "Arn")?;
        let call = ApiCall::new("acm-pca", "GetPolicy").param("ResourceArn", arn);
        fetch_optional_policy(self.transport.as_ref(), call, "Policy").await
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let arn = str_field(record, "Arn")?;
        let name = arn.rsplit('/').next().unwrap_or(arn);
        Ok(ResourceIdentity::new(
            name,
            Some(arn),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ReplayTransport, Snapshot};
    use serde_json::json;

    const ARN: &str =
        "arn:aws:acm-pca:us-east-1:111111111111:certificate-authority/11111111-2222-3333-4444-555555555555";

    fn adapter() -> AcmPcaCertificateAuthorities {
        let snapshot = Snapshot::from_value(json!({
            "calls": [
                {
                    "service": "acm-pca",
                    "operation": "GetPolicy",
                    "params": {"ResourceArn": ARN},
                    "error": "not-found"
                }
            ]
        }))
        .unwrap();
        AcmPcaCertificateAuthorities::new(
            Arc::new(ReplayTransport::new(snapshot)),
            ScanContext::new("111111111111", "us-east-1"),
        )
    }

    #[tokio::test]
    async fn test_ca_without_policy_yields_empty() {
        let policies = adapter().fetch_policy(&json!({"Arn": ARN})).await.unwrap();
        assert!(policies.is_empty());
    }

    #[test]
    fn test_identity_shortens_ca_arn() {
        let identity = adapter().identity(&json!({"Arn": ARN})).unwrap();
        assert_eq!(identity.name, "11111111-2222-3333-4444-555555555555");
        assert_eq!(identity.arn.as_deref(), Some(ARN));
    }
}

//! ECR repository policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{fetch_optional_policy, opt_string_field, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct EcrRepositories {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl EcrRepositories {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for EcrRepositories {
    fn service(&self) -> ServiceKey {
        ServiceKey::Ecr
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(
            self.transport.clone(),
            ApiCall::new("ecr", "DescribeRepositories"),
        )
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let name = str_field(record, "repositoryName")?;
        let call = ApiCall::new("ecr", "GetRepositoryPolicy").param("repositoryName", name);
        fetch_optional_policy(self.transport.as_ref(), call, "policyText").await
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "repositoryName")?;
        let arn = opt_string_field(record, "repositoryArn").unwrap_or_else(|| {
            format!(
                "arn:aws:ecr:{}:{}:repository/{name}",
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

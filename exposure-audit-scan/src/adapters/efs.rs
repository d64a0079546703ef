//! EFS file system policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{fetch_optional_policy, opt_string_field, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct ElasticFileSystems {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl ElasticFileSystems {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for ElasticFileSystems {
    fn service(&self) -> ServiceKey {
        ServiceKey::Efs
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(
            self.transport.clone(),
            ApiCall::new("efs", "DescribeFileSystems"),
        )
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let id = str_field(record, "FileSystemId")?;
        let call = ApiCall::new("efs", "DescribeFileSystemPolicy").param("FileSystemId", id);
        fetch_optional_policy(self.transport.as_ref(), call, "Policy").await
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let id = str_field(record, "FileSystemId")?;
        let arn = opt_string_field(record, "FileSystemArn").unwrap_or_else(|| {
            format!(
                "arn:aws:elasticfilesystem:{}:{}:file-system/{id}",
                self.context.region, self.context.account_id
            )
        });
        Ok(ResourceIdentity::new(
            id,
            Some(&arn),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

//! Amazon S3 bucket policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{fetch_optional_policy, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct S3Buckets {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl S3Buckets {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for S3Buckets {
    fn service(&self) -> ServiceKey {
        ServiceKey::S3
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(self.transport.clone(), ApiCall::new("s3", "ListBuckets"))
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let name = str_field(record, "Name")?;
        let call = ApiCall::new("s3", "GetBucketPolicy").param("Bucket", name);
        fetch_optional_policy(self.transport.as_ref(), call, "Policy").await
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "Name")?;
        Ok(ResourceIdentity::new(
            name,
            Some(&format!("arn:aws:s3:::{name}")),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

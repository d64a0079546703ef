//! IAM role trust policies.
//!
//! The trust (assume-role) policy arrives inline on each `ListRoles`
//! record, URL-encoded, so no per-resource fetch call is needed.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct IamRoles {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl IamRoles {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for IamRoles {
    fn service(&self) -> ServiceKey {
        ServiceKey::Iam
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(self.transport.clone(), ApiCall::new("iam", "ListRoles"))
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let Some(encoded) = record
            .get("AssumeRolePolicyDocument")
            .and_then(Value::as_str)
        else {
            return Ok(Vec::new());
        };
        let decoded = percent_encoding::percent_decode_str(encoded)
            .decode_utf8()
            .map_err(|e| {
                TransportError::UnexpectedShape(format!(
                    "trust policy is not valid UTF-8 after URL decoding: {e}"
                ))
            })?;
        Ok(vec![decoded.into_owned()])
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "RoleName")?;
        let arn = str_field(record, "Arn")?;
        Ok(ResourceIdentity::new(
            name,
            Some(arn),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

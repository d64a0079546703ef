//! CloudWatch Logs account-level resource policies.
//!
//! Unlike other services, the policy *is* the enumerated resource:
//! `DescribeResourcePolicies` returns named policy documents directly.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{opt_string_field, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct CloudwatchResourcePolicies {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl CloudwatchResourcePolicies {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for CloudwatchResourcePolicies {
    fn service(&self) -> ServiceKey {
        ServiceKey::Logs
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(
            self.transport.clone(),
            ApiCall::new("logs", "DescribeResourcePolicies"),
        )
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        // The document ships inline on the record.
        Ok(opt_string_field(record, "policyDocument")
            .into_iter()
            .collect())
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "policyName")?;
        Ok(ResourceIdentity::new(
            name,
            None,
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

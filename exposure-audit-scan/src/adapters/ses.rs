//! SES identity (domain / email address) policies.
//!
//! One identity can carry several named policies; all of them are
//! fetched and evaluated together.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{json, Value};

use exposure_audit_engine::ResourceIdentity;

use super::{ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct SesIdentities {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl SesIdentities {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

fn identity_name(record: &Value) -> Result<&str, TransportError> {
    record.as_str().ok_or_else(|| {
        TransportError::UnexpectedShape("identity record is not a string".to_string())
    })
}

#[async_trait]
impl ResourceAdapter for SesIdentities {
    fn service(&self) -> ServiceKey {
        ServiceKey::Ses
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(self.transport.clone(), ApiCall::new("ses", "ListIdentities"))
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let identity = identity_name(record)?;

        let names_call =
            ApiCall::new("ses", "ListIdentityPolicies").param("Identity", identity);
        let names = match self.transport.get(&names_call).await {
            Ok(response) => response
                .get("PolicyNames")
                .and_then(Value::as_array)
                .map(|names| {
                    names
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            Err(TransportError::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let policies_call = ApiCall::new("ses", "GetIdentityPolicies")
            .param("Identity", identity)
            .param("PolicyNames", json!(names));
        let response = self.transport.get(&policies_call).await?;
        Ok(response
            .get("Policies")
            .and_then(Value::as_object)
            .map(|policies| {
                policies
                    .values()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = identity_name(record)?;
        Ok(ResourceIdentity::new(
            name,
            Some(&format!(
                "arn:aws:ses:{}:{}:identity/{name}",
                self.context.region, self.context.account_id
            )),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

//! Lambda function and layer-version policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{fetch_optional_policy, opt_string_field, str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct LambdaFunctions {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl LambdaFunctions {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for LambdaFunctions {
    fn service(&self) -> ServiceKey {
        ServiceKey::Lambda
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(
            self.transport.clone(),
            ApiCall::new("lambda", "ListFunctions"),
        )
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let name = str_field(record, "FunctionName")?;
        let call = ApiCall::new("lambda", "GetPolicy").param("FunctionName", name);
        fetch_optional_policy(self.transport.as_ref(), call, "Policy").await
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "FunctionName")?;
        let arn = opt_string_field(record, "FunctionArn").unwrap_or_else(|| {
            format!(
                "arn:aws:lambda:{}:{}:function:{name}",
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

/// Layers expose their policy per published version; the latest version
/// listed on the record is the one audited.
pub struct LambdaLayers {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl LambdaLayers {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }

    fn latest_version(record: &Value) -> Option<i64> {
        record
            .get("LatestMatchingVersion")
            .and_then(|version| version.get("Version"))
            .and_then(Value::as_i64)
    }
}

#[async_trait]
impl ResourceAdapter for LambdaLayers {
    fn service(&self) -> ServiceKey {
        ServiceKey::LambdaLayer
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(self.transport.clone(), ApiCall::new("lambda", "ListLayers"))
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let name = str_field(record, "LayerName")?;
        let Some(version) = Self::latest_version(record) else {
            return Ok(Vec::new());
        };
        let call = ApiCall::new("lambda", "GetLayerVersionPolicy")
            .param("LayerName", name)
            .param("VersionNumber", version);
        fetch_optional_policy(self.transport.as_ref(), call, "Policy").await
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "LayerName")?;
        let arn = opt_string_field(record, "LayerArn").unwrap_or_else(|| {
            format!(
                "arn:aws:lambda:{}:{}:layer:{name}",
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

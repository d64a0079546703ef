//! Elasticsearch / OpenSearch domain access policies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use super::{str_field, ResourceAdapter, ScanContext, ServiceKey};
use crate::transport::{page_stream, ApiCall, CloudTransport, TransportError};

pub struct ElasticsearchDomains {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl ElasticsearchDomains {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }
}

#[async_trait]
impl ResourceAdapter for ElasticsearchDomains {
    fn service(&self) -> ServiceKey {
        ServiceKey::Elasticsearch
    }

    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>> {
        page_stream(
            self.transport.clone(),
            ApiCall::new("es", "ListDomainNames"),
        )
    }

    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError> {
        let name = str_field(record, "DomainName")?;
        let call =
            ApiCall::new("es", "DescribeElasticsearchDomainConfig").param("DomainName", name);
        match self.transport.get(&call).await {
            Ok(response) => Ok(response
                .pointer("/DomainConfig/AccessPolicies/Options")
                .and_then(Value::as_str)
                .filter(|policy| !policy.is_empty())
                .map(str::to_string)
                .into_iter()
                .collect()),
            Err(TransportError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError> {
        let name = str_field(record, "DomainName")?;
        Ok(ResourceIdentity::new(
            name,
            Some(&format!(
                "arn:aws:es:{}:{}:domain/{name}",
                self.context.region, self.context.account_id
            )),
            &self.context.account_id,
            &self.context.region,
        ))
    }
}

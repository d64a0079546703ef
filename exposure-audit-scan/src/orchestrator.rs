//! Lazy scan orchestration.
//!
//! Drives one adapter's enumeration stream and turns each raw record into
//! a [`ScanFinding`] by fetching and evaluating its resource policies.
//! Policy fetches for different resources run concurrently up to a worker
//! bound; enumeration itself stays lazy, so no page is requested before
//! the consumer polls for it.
//!
//! Per-resource failures never abort a scan. A policy that cannot be read
//! or parsed produces an Indeterminate finding carrying the reason, so
//! the resource still shows up in the report instead of vanishing.

use futures::stream::{BoxStream, StreamExt};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use exposure_audit_engine::{
    evaluate, ExposureVerdict, PolicyDocument, ResourceDescriptor, ResourceIdentity,
};

use crate::adapters::{AdapterRegistry, ResourceAdapter, ScanContext, ServiceKey};
use crate::error::ScanError;
use crate::transport::TransportError;

const DEFAULT_WORKERS: usize = 8;

/// One evaluated resource.
#[derive(Debug, Clone, Serialize)]
pub struct ScanFinding {
    pub service: String,
    #[serde(flatten)]
    pub identity: ResourceIdentity,
    #[serde(flatten)]
    pub verdict: ExposureVerdict,
    /// Mirrors the Indeterminate detail for consumers that only look at
    /// flat fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ScanFinding {
    fn new(service: ServiceKey, identity: ResourceIdentity, verdict: ExposureVerdict) -> Self {
        let reason = match &verdict {
            ExposureVerdict::Indeterminate(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            service: service.canonical().to_string(),
            identity,
            verdict,
            reason,
        }
    }
}

/// Runs scans over one adapter registry.
pub struct Orchestrator {
    registry: AdapterRegistry,
    workers: usize,
}

impl Orchestrator {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Stream findings for one service. Enumeration errors (a list call
    /// that fails outright) surface as stream errors; everything scoped
    /// to a single resource is absorbed into its finding.
    pub fn scan(&self, key: ServiceKey) -> BoxStream<'static, Result<ScanFinding, ScanError>> {
        let adapter = self.registry.adapter(key);
        let context = self.registry.context().clone();
        debug!(
            "scanning {key} in account {} region {}",
            context.account_id, context.region
        );
        adapter
            .clone()
            .enumerate()
            .map(move |record| {
                let adapter = adapter.clone();
                let context = context.clone();
                async move {
                    match record {
                        Ok(record) => {
                            Ok(evaluate_record(adapter.as_ref(), &context, &record).await)
                        }
                        Err(e) => Err(ScanError::Transport(e)),
                    }
                }
            })
            .buffer_unordered(self.workers)
            .boxed()
    }
}

/// Evaluate one raw record. Infallible: every failure mode maps to a
/// verdict rather than an error, keeping the resource in the report.
async fn evaluate_record(
    adapter: &dyn ResourceAdapter,
    context: &ScanContext,
    record: &Value,
) -> ScanFinding {
    let key = adapter.service();

    let identity = match adapter.identity(record) {
        Ok(identity) => identity,
        Err(e) => {
            warn!("{key}: unrecognized record shape: {e}");
            let finding_identity = ResourceIdentity::new(
                "<unrecognized>",
                None,
                &context.account_id,
                &context.region,
            );
            return ScanFinding::new(
                key,
                finding_identity,
                ExposureVerdict::Indeterminate(format!("unrecognized record shape: {e}")),
            );
        }
    };

    let raw_policies = match adapter.fetch_policy(record).await {
        Ok(raw) => raw,
        Err(e) => {
            let reason = match &e {
                TransportError::AccessDenied { .. } => {
                    "policy unreadable: access denied".to_string()
                }
                TransportError::Throttled { .. } => {
                    "policy unreadable: throttled after retries".to_string()
                }
                _ => format!("policy unreadable: {e}"),
            };
            warn!("{key}: {}: {reason}", identity.name);
            return ScanFinding::new(key, identity, ExposureVerdict::Indeterminate(reason));
        }
    };

    let mut documents = Vec::with_capacity(raw_policies.len());
    for raw in &raw_policies {
        match PolicyDocument::parse_str(raw) {
            Ok(document) => documents.push(document),
            Err(e) => {
                warn!("{key}: {}: policy failed to parse: {e}", identity.name);
                return ScanFinding::new(
                    key,
                    identity,
                    ExposureVerdict::Indeterminate(format!("policy failed to parse: {e}")),
                );
            }
        }
    }

    let descriptor =
        ResourceDescriptor::new(identity.clone(), key.action_namespace(), documents);
    let verdict = evaluate(&descriptor);
    debug!("{key}: {} -> {verdict}", identity.name);
    ScanFinding::new(key, identity, verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ReplayTransport, Snapshot};
    use futures::TryStreamExt;
    use serde_json::json;
    use std::sync::Arc;

    fn orchestrator(snapshot: Value) -> Orchestrator {
        let snapshot = Snapshot::from_value(snapshot).unwrap();
        let registry = AdapterRegistry::new(
            Arc::new(ReplayTransport::new(snapshot)),
            ScanContext::new("111111111111", "us-east-1"),
        );
        Orchestrator::new(registry).with_workers(2)
    }

    #[tokio::test]
    async fn test_unreadable_policy_becomes_indeterminate_finding() {
        let orchestrator = orchestrator(json!({
            "calls": [
                {
                    "service": "s3",
                    "operation": "ListBuckets",
                    "pages": [[{"Name": "locked-down"}]]
                },
                {
                    "service": "s3",
                    "operation": "GetBucketPolicy",
                    "params": {"Bucket": "locked-down"},
                    "error": "access-denied"
                }
            ]
        }));
        let findings: Vec<ScanFinding> = orchestrator
            .scan(ServiceKey::S3)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        let ExposureVerdict::Indeterminate(reason) = &findings[0].verdict else {
            panic!("expected an indeterminate verdict");
        };
        assert!(reason.contains("access denied"));
        assert_eq!(findings[0].reason.as_deref(), Some(reason.as_str()));
    }

    #[tokio::test]
    async fn test_malformed_policy_becomes_indeterminate_finding() {
        let orchestrator = orchestrator(json!({
            "calls": [
                {
                    "service": "s3",
                    "operation": "ListBuckets",
                    "pages": [[{"Name": "garbled"}]]
                },
                {
                    "service": "s3",
                    "operation": "GetBucketPolicy",
                    "params": {"Bucket": "garbled"},
                    "result": {"Policy": "{not json"}
                }
            ]
        }));
        let findings: Vec<ScanFinding> = orchestrator
            .scan(ServiceKey::S3)
            .try_collect()
            .await
            .unwrap();
        assert!(matches!(
            &findings[0].verdict,
            ExposureVerdict::Indeterminate(reason) if reason.contains("failed to parse")
        ));
    }

    #[tokio::test]
    async fn test_bucket_without_policy_is_private() {
        let orchestrator = orchestrator(json!({
            "calls": [
                {
                    "service": "s3",
                    "operation": "ListBuckets",
                    "pages": [[{"Name": "quiet"}]]
                },
                {
                    "service": "s3",
                    "operation": "GetBucketPolicy",
                    "params": {"Bucket": "quiet"},
                    "error": "not-found"
                }
            ]
        }));
        let findings: Vec<ScanFinding> = orchestrator
            .scan(ServiceKey::S3)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(findings[0].verdict, ExposureVerdict::Private);
        assert!(findings[0].reason.is_none());
    }

    #[tokio::test]
    async fn test_enumeration_failure_surfaces_as_stream_error() {
        let orchestrator = orchestrator(json!({
            "calls": [
                {
                    "service": "s3",
                    "operation": "ListBuckets",
                    "error": "access-denied"
                }
            ]
        }));
        let result: Result<Vec<ScanFinding>, ScanError> =
            orchestrator.scan(ServiceKey::S3).try_collect().await;
        assert!(matches!(result, Err(ScanError::Transport(_))));
    }
}

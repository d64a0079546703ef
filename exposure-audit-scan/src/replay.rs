//! Replay transport over recorded API responses.
//!
//! A snapshot is a JSON file of recorded calls: list responses as pages of
//! raw records, get responses as single payloads, or a recorded error
//! ("access-denied", "throttled", "not-found"). Used by the CLI's offline
//! mode and throughout the test suites as the transport fake.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ScanError;
use crate::transport::{ApiCall, CloudTransport, ListPage, TransportError};

/// A recorded inventory of API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub calls: Vec<RecordedCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedCall {
    pub service: String,
    pub operation: String,
    /// For get calls: parameters to match. Absent matches any parameters.
    #[serde(default)]
    pub params: Option<Value>,
    /// List response: pages of raw records.
    #[serde(default)]
    pub pages: Vec<Vec<Value>>,
    /// Get response payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Recorded failure: "access-denied", "throttled", or "not-found".
    #[serde(default)]
    pub error: Option<String>,
}

impl Snapshot {
    pub fn from_json(raw: &str) -> Result<Self, ScanError> {
        serde_json::from_str(raw)
            .map_err(|e| ScanError::Snapshot(format!("invalid snapshot JSON: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self, ScanError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ScanError::Snapshot(format!("could not read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_value(value: Value) -> Result<Self, ScanError> {
        serde_json::from_value(value)
            .map_err(|e| ScanError::Snapshot(format!("invalid snapshot: {e}")))
    }
}

/// `CloudTransport` implementation serving a `Snapshot`.
pub struct ReplayTransport {
    snapshot: Snapshot,
}

impl ReplayTransport {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    fn find(&self, call: &ApiCall) -> Option<&RecordedCall> {
        let mut fallback = None;
        for recorded in &self.snapshot.calls {
            if recorded.service != call.service || recorded.operation != call.operation {
                continue;
            }
            match &recorded.params {
                Some(params) if *params == call.params => return Some(recorded),
                Some(_) => {}
                None => fallback = fallback.or(Some(recorded)),
            }
        }
        fallback
    }
}

fn recorded_error(error: &str, operation: String) -> TransportError {
    match error {
        "access-denied" => TransportError::AccessDenied {
            operation,
            message: "recorded access denial".to_string(),
        },
        "throttled" => TransportError::Throttled { operation },
        "not-found" => TransportError::NotFound { operation },
        other => TransportError::Api {
            operation,
            message: format!("recorded error: {other}"),
        },
    }
}

#[async_trait]
impl CloudTransport for ReplayTransport {
    async fn list(
        &self,
        call: &ApiCall,
        cursor: Option<String>,
    ) -> Result<ListPage, TransportError> {
        let recorded = self.find(call).ok_or_else(|| TransportError::Api {
            operation: call.qualified(),
            message: "no recorded response".to_string(),
        })?;
        if let Some(error) = &recorded.error {
            return Err(recorded_error(error, call.qualified()));
        }
        let index: usize = match cursor {
            None => 0,
            Some(token) => token.parse().map_err(|_| TransportError::Api {
                operation: call.qualified(),
                message: format!("bad replay cursor {token:?}"),
            })?,
        };
        let records = recorded.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < recorded.pages.len()).then(|| (index + 1).to_string());
        Ok(ListPage { records, next })
    }

    async fn get(&self, call: &ApiCall) -> Result<Value, TransportError> {
        let recorded = self.find(call).ok_or_else(|| TransportError::NotFound {
            operation: call.qualified(),
        })?;
        if let Some(error) = &recorded.error {
            return Err(recorded_error(error, call.qualified()));
        }
        recorded
            .result
            .clone()
            .ok_or_else(|| TransportError::NotFound {
                operation: call.qualified(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> ReplayTransport {
        let snapshot = Snapshot::from_value(json!({
            "account_id": "111111111111",
            "region": "us-east-1",
            "calls": [
                {
                    "service": "s3",
                    "operation": "ListBuckets",
                    "pages": [[{"Name": "one"}], [{"Name": "two"}]]
                },
                {
                    "service": "s3",
                    "operation": "GetBucketPolicy",
                    "params": {"Bucket": "one"},
                    "result": {"Policy": "{}"}
                },
                {
                    "service": "s3",
                    "operation": "GetBucketPolicy",
                    "params": {"Bucket": "two"},
                    "error": "access-denied"
                }
            ]
        }))
        .expect("snapshot should deserialize");
        ReplayTransport::new(snapshot)
    }

    #[tokio::test]
    async fn test_replay_paginates_recorded_pages() {
        let transport = transport();
        let call = ApiCall::new("s3", "ListBuckets");
        let first = transport.list(&call, None).await.expect("first page");
        assert_eq!(first.records, vec![json!({"Name": "one"})]);
        let second = transport
            .list(&call, first.next)
            .await
            .expect("second page");
        assert_eq!(second.records, vec![json!({"Name": "two"})]);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_replay_matches_get_params() {
        let transport = transport();
        let ok = transport
            .get(&ApiCall::new("s3", "GetBucketPolicy").param("Bucket", "one"))
            .await
            .expect("recorded result");
        assert_eq!(ok["Policy"], json!("{}"));

        let denied = transport
            .get(&ApiCall::new("s3", "GetBucketPolicy").param("Bucket", "two"))
            .await
            .expect_err("recorded denial");
        assert!(matches!(denied, TransportError::AccessDenied { .. }));

        let missing = transport
            .get(&ApiCall::new("s3", "GetBucketPolicy").param("Bucket", "three"))
            .await
            .expect_err("nothing recorded");
        assert!(matches!(missing, TransportError::NotFound { .. }));
    }

    #[test]
    fn test_snapshot_loads_from_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"account_id": "111111111111", "region": "eu-west-1", "calls": []}}"#
        )
        .expect("write snapshot");

        let snapshot = Snapshot::from_path(file.path()).expect("snapshot should load");
        assert_eq!(snapshot.account_id.as_deref(), Some("111111111111"));
        assert_eq!(snapshot.region.as_deref(), Some("eu-west-1"));
        assert!(snapshot.calls.is_empty());
    }

    #[test]
    fn test_missing_snapshot_file_is_a_snapshot_error() {
        let err = Snapshot::from_path(std::path::Path::new("/nonexistent/snap.json"))
            .expect_err("missing file");
        assert!(matches!(err, ScanError::Snapshot(_)));
    }

    #[tokio::test]
    async fn test_unrecorded_list_is_an_api_error() {
        let transport = transport();
        let err = transport
            .list(&ApiCall::new("sqs", "ListQueues"), None)
            .await
            .expect_err("not recorded");
        assert!(matches!(err, TransportError::Api { .. }));
    }
}

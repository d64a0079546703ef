//! End-to-end scan over a recorded snapshot: enumeration, policy fetch,
//! and verdict assignment for a mixed set of buckets.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::json;

use exposure_audit_engine::ExposureVerdict;
use exposure_audit_scan::{
    AdapterRegistry, Orchestrator, ReplayTransport, ScanContext, ScanFinding, ServiceKey,
    Snapshot,
};

fn mixed_fleet_snapshot() -> Snapshot {
    let public_policy = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": "arn:aws:s3:::open-data/*"
        }]
    })
    .to_string();
    let partner_policy = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"AWS": "arn:aws:iam::222222222222:root"},
            "Action": "s3:ListBucket",
            "Resource": "arn:aws:s3:::shared-reports"
        }]
    })
    .to_string();
    let vpc_scoped_policy = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": "arn:aws:s3:::internal-feed/*",
            "Condition": {"StringEquals": {"aws:SourceVpc": "vpc-0a1b2c3d"}}
        }]
    })
    .to_string();

    Snapshot::from_value(json!({
        "account_id": "111111111111",
        "region": "us-east-1",
        "calls": [
            {
                "service": "s3",
                "operation": "ListBuckets",
                "pages": [
                    [{"Name": "open-data"}, {"Name": "shared-reports"}],
                    [{"Name": "internal-feed"}, {"Name": "scratch"}]
                ]
            },
            {
                "service": "s3",
                "operation": "GetBucketPolicy",
                "params": {"Bucket": "open-data"},
                "result": {"Policy": public_policy}
            },
            {
                "service": "s3",
                "operation": "GetBucketPolicy",
                "params": {"Bucket": "shared-reports"},
                "result": {"Policy": partner_policy}
            },
            {
                "service": "s3",
                "operation": "GetBucketPolicy",
                "params": {"Bucket": "internal-feed"},
                "result": {"Policy": vpc_scoped_policy}
            },
            {
                "service": "s3",
                "operation": "GetBucketPolicy",
                "params": {"Bucket": "scratch"},
                "error": "not-found"
            }
        ]
    }))
    .unwrap()
}

async fn scan_fleet() -> BTreeMap<String, ScanFinding> {
    let registry = AdapterRegistry::new(
        Arc::new(ReplayTransport::new(mixed_fleet_snapshot())),
        ScanContext::new("111111111111", "us-east-1"),
    );
    let findings: Vec<ScanFinding> = Orchestrator::new(registry)
        .with_workers(3)
        .scan(ServiceKey::S3)
        .try_collect()
        .await
        .unwrap();
    findings
        .into_iter()
        .map(|finding| (finding.identity.name.clone(), finding))
        .collect()
}

#[tokio::test]
async fn test_every_bucket_appears_exactly_once() {
    let findings = scan_fleet().await;
    assert_eq!(findings.len(), 4);
    for name in ["open-data", "shared-reports", "internal-feed", "scratch"] {
        assert!(findings.contains_key(name), "missing finding for {name}");
    }
}

#[tokio::test]
async fn test_mixed_fleet_verdicts() {
    let findings = scan_fleet().await;

    assert_eq!(findings["open-data"].verdict, ExposureVerdict::Public);

    let ExposureVerdict::CrossAccount(accounts) = &findings["shared-reports"].verdict else {
        panic!("expected a cross-account verdict");
    };
    assert_eq!(
        accounts.iter().collect::<Vec<_>>(),
        vec!["222222222222"]
    );

    assert!(matches!(
        findings["internal-feed"].verdict,
        ExposureVerdict::Indeterminate(_)
    ));

    assert_eq!(findings["scratch"].verdict, ExposureVerdict::Private);
}

#[tokio::test]
async fn test_findings_carry_service_and_account() {
    let findings = scan_fleet().await;
    let finding = &findings["open-data"];
    assert_eq!(finding.service, "s3");
    assert_eq!(finding.identity.account_id, "111111111111");
    assert_eq!(finding.identity.arn.as_deref(), Some("arn:aws:s3:::open-data"));
}

#[tokio::test]
async fn test_findings_serialize_flat() {
    let findings = scan_fleet().await;
    let rendered = serde_json::to_value(&findings["open-data"]).unwrap();
    assert_eq!(rendered["service"], "s3");
    assert_eq!(rendered["name"], "open-data");
    assert_eq!(rendered["verdict"], "public");
}

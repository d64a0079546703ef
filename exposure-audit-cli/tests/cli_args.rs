use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

const PUBLIC_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [{
        "Effect": "Allow",
        "Principal": "*",
        "Action": "s3:GetObject",
        "Resource": "arn:aws:s3:::open-data/*"
    }]
}"#;

const SCOPED_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [{
        "Effect": "Allow",
        "Principal": {"AWS": "arn:aws:iam::111111111111:role/reader"},
        "Action": "s3:GetObject",
        "Resource": "arn:aws:s3:::team-data/*"
    }]
}"#;

const SNAPSHOT: &str = r#"{
    "account_id": "111111111111",
    "region": "us-east-1",
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
}"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("failed to write temp file");
    file
}

#[test]
fn test_services_lists_supported_keys() {
    let mut cmd = assert_cmd::Command::new(env!("CARGO_BIN_EXE_exposure-audit"));
    let mut assert = cmd.arg("services").assert().success();
    for key in ["s3", "sqs", "kms", "lambda-layer", "acm-pca"] {
        assert = assert.stdout(predicates::str::contains(key));
    }
}

#[test]
fn test_unsupported_service_is_rejected_with_supported_list() {
    let snapshot = write_temp(SNAPSHOT);
    let mut cmd = assert_cmd::Command::new(env!("CARGO_BIN_EXE_exposure-audit"));
    cmd.args(["list-resources", "--service", "dynamodb", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .failure()
        .stderr(predicates::str::contains("unsupported service"))
        .stderr(predicates::str::contains("s3"));
}

#[test]
fn test_evaluate_public_policy_prints_public_and_exits_2() {
    let policy = write_temp(PUBLIC_POLICY);
    let output = Command::new(env!("CARGO_BIN_EXE_exposure-audit"))
        .args(["evaluate", "--account-id", "111111111111", "--policy-file"])
        .arg(policy.path())
        .output()
        .expect("failed to run evaluate");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("public"), "stdout was: {stdout}");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_evaluate_same_account_policy_is_private() {
    let policy = write_temp(SCOPED_POLICY);
    let output = Command::new(env!("CARGO_BIN_EXE_exposure-audit"))
        .args(["evaluate", "--account-id", "111111111111", "--policy-file"])
        .arg(policy.path())
        .output()
        .expect("failed to run evaluate");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim().ends_with("private"), "stdout was: {stdout}");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_evaluate_json_output() {
    let policy = write_temp(PUBLIC_POLICY);
    let output = Command::new(env!("CARGO_BIN_EXE_exposure-audit"))
        .args([
            "evaluate",
            "--account-id",
            "111111111111",
            "--format",
            "json",
            "--policy-file",
        ])
        .arg(policy.path())
        .output()
        .expect("failed to run evaluate");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value =
        serde_json::from_str(&stdout).expect("output should be valid JSON");
    assert_eq!(value["verdict"], "public");
}

#[test]
fn test_list_resources_from_snapshot() {
    let snapshot = write_temp(SNAPSHOT);
    let output = Command::new(env!("CARGO_BIN_EXE_exposure-audit"))
        .args(["list-resources", "--service", "s3", "--snapshot"])
        .arg(snapshot.path())
        .output()
        .expect("failed to run list-resources");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("quiet") && stdout.contains("private"),
        "stdout was: {stdout}"
    );
}

#[test]
fn test_list_resources_accepts_service_alias() {
    let snapshot = write_temp(
        r#"{
            "account_id": "111111111111",
            "region": "us-east-1",
            "calls": [
                {"service": "logs", "operation": "DescribeResourcePolicies", "pages": [[]]}
            ]
        }"#,
    );
    let output = Command::new(env!("CARGO_BIN_EXE_exposure-audit"))
        .args(["list-resources", "--service", "cloudwatch", "--snapshot"])
        .arg(snapshot.path())
        .output()
        .expect("failed to run list-resources");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_malformed_policy_file_is_an_error() {
    let policy = write_temp("{not json");
    let output = Command::new(env!("CARGO_BIN_EXE_exposure-audit"))
        .args(["evaluate", "--account-id", "111111111111", "--policy-file"])
        .arg(policy.path())
        .output()
        .expect("failed to run evaluate");
    assert_ne!(output.status.code(), Some(0));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not parse"), "stderr was: {stderr}");
}

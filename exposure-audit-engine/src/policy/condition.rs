//! Condition block parsing and narrowing analysis.
//!
//! Conditions can narrow an otherwise-public grant (a source-IP or
//! VPC-endpoint restriction) but can never prove a resource private from
//! the outside: the engine only ever downgrades a confirmed-public grant
//! to needs-review. Any condition key outside the explicit narrowing
//! allow-list is treated as non-narrowing.

use serde_json::Value;

use crate::error::PolicyError;

/// Condition keys that restrict who can use an otherwise-public grant.
///
/// Keys are compared case-insensitively. Anything not listed here is
/// non-narrowing: a wildcard grant carrying only unknown keys stays
/// Public.
const NARROWING_KEYS: &[&str] = &[
    "aws:sourceip",
    "aws:sourcevpc",
    "aws:sourcevpce",
    "aws:sourceaccount",
    "aws:sourcearn",
    "aws:sourceowner",
    "aws:principalorgid",
    "aws:principalorgpaths",
    "aws:principalaccount",
    "aws:principalarn",
    "kms:calleraccount",
];

/// Condition keys whose values name an account or organization. Used to
/// decide whether a service-principal grant is scoped beyond the owning
/// account.
const ACCOUNT_VALUED_KEYS: &[&str] = &[
    "aws:sourceaccount",
    "aws:sourceowner",
    "aws:principalaccount",
    "kms:calleraccount",
];

const ARN_VALUED_KEYS: &[&str] = &["aws:sourcearn", "aws:principalarn"];

const ORG_KEYS: &[&str] = &["aws:principalorgid", "aws:principalorgpaths"];

/// Parsed base operator. Operators the engine does not reason about are
/// kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionOp {
    StringEquals,
    StringLike,
    ArnEquals,
    ArnLike,
    IpAddress,
    NotIpAddress,
    Bool,
    Null,
    Other(String),
}

/// `ForAllValues:` / `ForAnyValue:` set-operator qualifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetQualifier {
    ForAllValues,
    ForAnyValue,
}

/// One condition clause. Clauses within a statement are conjunctive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// The operator exactly as written, including qualifiers.
    pub operator_raw: String,
    pub op: ConditionOp,
    pub if_exists: bool,
    pub set_qualifier: Option<SetQualifier>,
    pub key: String,
    pub values: Vec<String>,
}

impl Condition {
    /// Build a single clause from its raw operator, key, and values.
    pub fn parse_single(operator: &str, key: &str, values: Vec<String>) -> Self {
        let mut base = operator;
        let set_qualifier = if let Some(rest) = base.strip_prefix("ForAllValues:") {
            base = rest;
            Some(SetQualifier::ForAllValues)
        } else if let Some(rest) = base.strip_prefix("ForAnyValue:") {
            base = rest;
            Some(SetQualifier::ForAnyValue)
        } else {
            None
        };
        let if_exists = if let Some(rest) = base.strip_suffix("IfExists") {
            base = rest;
            true
        } else {
            false
        };
        let op = match base {
            "StringEquals" | "StringEqualsIgnoreCase" => ConditionOp::StringEquals,
            "StringLike" => ConditionOp::StringLike,
            "ArnEquals" => ConditionOp::ArnEquals,
            "ArnLike" => ConditionOp::ArnLike,
            "IpAddress" => ConditionOp::IpAddress,
            "NotIpAddress" => ConditionOp::NotIpAddress,
            "Bool" => ConditionOp::Bool,
            "Null" => ConditionOp::Null,
            other => ConditionOp::Other(other.to_string()),
        };
        Self {
            operator_raw: operator.to_string(),
            op,
            if_exists,
            set_qualifier,
            key: key.to_string(),
            values,
        }
    }

    /// Whether this single clause provably restricts the set of callers.
    fn narrows_reach(&self) -> bool {
        // `IfExists` passes when the key is absent, and `ForAllValues`
        // passes on an empty request set; neither can be relied on.
        if self.if_exists || self.set_qualifier == Some(SetQualifier::ForAllValues) {
            return false;
        }
        if !NARROWING_KEYS.contains(&self.key.to_ascii_lowercase().as_str()) {
            return false;
        }
        if self.values.is_empty() {
            return false;
        }
        let positive_match = matches!(
            self.op,
            ConditionOp::StringEquals
                | ConditionOp::StringLike
                | ConditionOp::ArnEquals
                | ConditionOp::ArnLike
                | ConditionOp::IpAddress
        );
        positive_match && !self.values.iter().any(|v| is_broad_value(&self.op, v))
    }
}

/// Whether the conditions on a wildcard-principal Allow statement narrow
/// it enough to downgrade Public to Indeterminate.
///
/// True only when every clause present is a provably-narrowing clause.
/// Never used to conclude Private.
pub fn mitigates_public_grant(conditions: &[Condition]) -> bool {
    !conditions.is_empty() && conditions.iter().all(Condition::narrows_reach)
}

/// Whether any condition references an account or organization other than
/// the owning account. Used for service-principal classification.
pub fn references_external_account(conditions: &[Condition], owning_account_id: &str) -> bool {
    for condition in conditions {
        let key = condition.key.to_ascii_lowercase();
        if ORG_KEYS.contains(&key.as_str()) {
            // Organization membership is not resolvable from policy text.
            return true;
        }
        if ACCOUNT_VALUED_KEYS.contains(&key.as_str())
            && condition.values.iter().any(|v| v != owning_account_id)
        {
            return true;
        }
        if ARN_VALUED_KEYS.contains(&key.as_str())
            && condition
                .values
                .iter()
                .any(|v| arn_account(v) != Some(owning_account_id))
        {
            return true;
        }
    }
    false
}

/// Extract the account-id field of an ARN, if it is a concrete account.
fn arn_account(arn: &str) -> Option<&str> {
    let account = arn.split(':').nth(4)?;
    (account.len() == 12 && account.bytes().all(|b| b.is_ascii_digit())).then_some(account)
}

/// Values that make a would-be-narrowing clause match the whole world.
fn is_broad_value(op: &ConditionOp, value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '*') {
        return true;
    }
    *op == ConditionOp::IpAddress && (trimmed == "0.0.0.0/0" || trimmed == "::/0")
}

/// Parse a raw `Condition` block: operator -> key -> scalar-or-list.
pub fn parse_conditions(value: &Value) -> Result<Vec<Condition>, PolicyError> {
    let object = value
        .as_object()
        .ok_or_else(|| PolicyError::malformed("Condition must be an object"))?;

    let mut conditions = Vec::new();
    for (operator, keys) in object {
        let keys = keys.as_object().ok_or_else(|| {
            PolicyError::malformed(format!("Condition operator {operator} must map to an object"))
        })?;
        for (key, raw_values) in keys {
            let values = condition_values(raw_values)?;
            conditions.push(Condition::parse_single(operator, key, values));
        }
    }
    Ok(conditions)
}

fn condition_values(value: &Value) -> Result<Vec<String>, PolicyError> {
    fn scalar(value: &Value) -> Result<String, PolicyError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(PolicyError::malformed(format!(
                "condition value must be a scalar, got {other}"
            ))),
        }
    }
    match value {
        Value::Array(items) => items.iter().map(scalar).collect(),
        other => Ok(vec![scalar(other)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(operator: &str, key: &str, value: &str) -> Vec<Condition> {
        vec![Condition::parse_single(
            operator,
            key,
            vec![value.to_string()],
        )]
    }

    #[test]
    fn test_source_ip_restriction_mitigates() {
        assert!(mitigates_public_grant(&single(
            "IpAddress",
            "aws:SourceIp",
            "10.0.0.0/8"
        )));
    }

    #[test]
    fn test_vpc_endpoint_restriction_mitigates() {
        assert!(mitigates_public_grant(&single(
            "StringEquals",
            "aws:SourceVpce",
            "vpce-1a2b3c4d"
        )));
    }

    #[test]
    fn test_principal_org_id_mitigates() {
        assert!(mitigates_public_grant(&single(
            "StringEquals",
            "aws:PrincipalOrgID",
            "o-exampleorgid"
        )));
    }

    #[test]
    fn test_no_conditions_do_not_mitigate() {
        assert!(!mitigates_public_grant(&[]));
    }

    #[test]
    fn test_unknown_key_does_not_mitigate() {
        assert!(!mitigates_public_grant(&single(
            "StringEquals",
            "s3:x-amz-acl",
            "public-read"
        )));
    }

    #[test]
    fn test_world_open_cidr_does_not_mitigate() {
        assert!(!mitigates_public_grant(&single(
            "IpAddress",
            "aws:SourceIp",
            "0.0.0.0/0"
        )));
    }

    #[test]
    fn test_wildcard_value_does_not_mitigate() {
        assert!(!mitigates_public_grant(&single(
            "StringLike",
            "aws:PrincipalArn",
            "*"
        )));
    }

    #[test]
    fn test_if_exists_does_not_mitigate() {
        assert!(!mitigates_public_grant(&single(
            "StringEqualsIfExists",
            "aws:SourceVpce",
            "vpce-1a2b3c4d"
        )));
    }

    #[test]
    fn test_mixed_narrowing_and_unknown_does_not_mitigate() {
        let mut conditions = single("IpAddress", "aws:SourceIp", "10.0.0.0/8");
        conditions.extend(single("Bool", "aws:SecureTransport", "true"));
        assert!(!mitigates_public_grant(&conditions));
    }

    #[test]
    fn test_negated_ip_operator_does_not_mitigate() {
        assert!(!mitigates_public_grant(&single(
            "NotIpAddress",
            "aws:SourceIp",
            "10.0.0.0/8"
        )));
    }

    #[test]
    fn test_parse_conditions_block() {
        let raw = json!({
            "IpAddress": {"aws:SourceIp": ["10.0.0.0/8", "192.168.0.0/16"]},
            "StringEquals": {"aws:PrincipalOrgID": "o-exampleorgid"}
        });
        let conditions = parse_conditions(&raw).expect("should parse");
        assert_eq!(conditions.len(), 2);
        assert!(mitigates_public_grant(&conditions));
    }

    #[test]
    fn test_parse_conditions_rejects_non_object() {
        assert!(parse_conditions(&json!("nope")).is_err());
    }

    #[test]
    fn test_external_account_reference_detected() {
        let conditions = single("StringEquals", "aws:SourceAccount", "222222222222");
        assert!(references_external_account(&conditions, "111111111111"));
        let own = single("StringEquals", "aws:SourceAccount", "111111111111");
        assert!(!references_external_account(&own, "111111111111"));
    }

    #[test]
    fn test_source_arn_with_foreign_account_detected() {
        let conditions = single(
            "ArnLike",
            "aws:SourceArn",
            "arn:aws:sns:us-east-1:222222222222:topic",
        );
        assert!(references_external_account(&conditions, "111111111111"));
    }

    #[test]
    fn test_source_arn_without_account_field_is_external() {
        // S3 ARNs carry no account field; ownership cannot be proven.
        let conditions = single("ArnLike", "aws:SourceArn", "arn:aws:s3:::some-bucket");
        assert!(references_external_account(&conditions, "111111111111"));
    }
}

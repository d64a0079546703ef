//! Principal parsing and reach classification.
//!
//! A principal's reach is judged relative to the account that owns the
//! resource being evaluated. Anything that cannot be classified with
//! confidence is surfaced as `Indeterminate`; the engine never quietly
//! treats an unknown principal as private.

use std::sync::LazyLock;

use regex::Regex;

use crate::policy::condition::{references_external_account, Condition};

/// `arn:partition:iam::123456789012:root`
static ROOT_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:[^:]+:iam::(\d{12}):root$").expect("static regex")
});

/// Any IAM or STS entity ARN: users, roles, groups, assumed-role sessions.
static IAM_ENTITY_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:[^:]+:(?:iam|sts)::(\d{12}):.+$").expect("static regex")
});

/// A policy principal. The raw string is retained for audit output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub raw: String,
    pub kind: PrincipalKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalKind {
    /// The `*` principal: matches any actor.
    Wildcard,
    /// A bare 12-digit account id.
    AccountId(String),
    /// `arn:aws:iam::<account>:root`.
    RootAccount(String),
    /// A concrete IAM/STS entity within an account.
    IamEntity { account_id: String },
    /// An AWS service principal such as `lambda.amazonaws.com`.
    Service(String),
    /// A federated identity provider.
    Federated(String),
    /// An S3 canonical user id; ownership cannot be resolved locally.
    CanonicalUser(String),
    /// Anything we could not parse.
    Unrecognized,
}

impl Principal {
    /// Parse an entry from the `AWS` principal category (or the bare
    /// string shorthand).
    pub fn from_aws(raw: &str) -> Self {
        let kind = if raw == "*" {
            PrincipalKind::Wildcard
        } else if raw.len() == 12 && raw.bytes().all(|b| b.is_ascii_digit()) {
            PrincipalKind::AccountId(raw.to_string())
        } else if let Some(captures) = ROOT_ARN.captures(raw) {
            PrincipalKind::RootAccount(captures[1].to_string())
        } else if let Some(captures) = IAM_ENTITY_ARN.captures(raw) {
            PrincipalKind::IamEntity {
                account_id: captures[1].to_string(),
            }
        } else {
            PrincipalKind::Unrecognized
        };
        Self {
            raw: raw.to_string(),
            kind,
        }
    }

    /// Parse an entry from the `Service` principal category. Only
    /// `*.amazonaws.com` hostnames are genuine service principals;
    /// anything else is kept as unrecognized so it surfaces for review.
    pub fn service(raw: String) -> Self {
        let kind = if raw.ends_with(".amazonaws.com") {
            PrincipalKind::Service(raw.clone())
        } else {
            PrincipalKind::Unrecognized
        };
        Self { raw, kind }
    }

    pub fn federated(raw: String) -> Self {
        let kind = PrincipalKind::Federated(raw.clone());
        Self { raw, kind }
    }

    pub fn canonical_user(raw: String) -> Self {
        let kind = PrincipalKind::CanonicalUser(raw.clone());
        Self { raw, kind }
    }

    pub fn unrecognized(raw: String) -> Self {
        Self {
            raw,
            kind: PrincipalKind::Unrecognized,
        }
    }
}

/// The reach of a single statement's principal, relative to the owning
/// account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReachClass {
    SameAccount,
    CrossAccount(String),
    Public,
    Indeterminate(String),
}

/// Classify a principal against the owning account.
///
/// The wildcard principal is always `Public` here; condition-based
/// narrowing is applied later by the verdict engine and can only
/// downgrade a verdict, never upgrade one.
pub fn classify(
    principal: &Principal,
    owning_account_id: &str,
    conditions: &[Condition],
) -> ReachClass {
    match &principal.kind {
        PrincipalKind::Wildcard => ReachClass::Public,
        PrincipalKind::AccountId(account)
        | PrincipalKind::RootAccount(account)
        | PrincipalKind::IamEntity {
            account_id: account,
        } => {
            if account == owning_account_id {
                ReachClass::SameAccount
            } else {
                ReachClass::CrossAccount(account.clone())
            }
        }
        PrincipalKind::Service(name) => {
            // A service principal acts on behalf of whoever configured the
            // service. Without account-scoping conditions it is treated as
            // same-account-equivalent; conditions that reference a foreign
            // account or an organization cannot be verified here.
            if references_external_account(conditions, owning_account_id) {
                ReachClass::Indeterminate(format!(
                    "service principal {name} is scoped by external account or organization conditions"
                ))
            } else {
                ReachClass::SameAccount
            }
        }
        PrincipalKind::Federated(provider) => {
            ReachClass::Indeterminate(format!("federated principal {provider}"))
        }
        PrincipalKind::CanonicalUser(_) => {
            ReachClass::Indeterminate("canonical user grant cannot be resolved".to_string())
        }
        PrincipalKind::Unrecognized => ReachClass::Indeterminate(format!(
            "unrecognized principal {:?}",
            principal.raw
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::condition::{Condition, ConditionOp};

    const OWNER: &str = "111111111111";

    fn condition(operator: &str, key: &str, value: &str) -> Condition {
        Condition::parse_single(operator, key, vec![value.to_string()])
    }

    #[test]
    fn test_wildcard_is_public() {
        let principal = Principal::from_aws("*");
        assert_eq!(classify(&principal, OWNER, &[]), ReachClass::Public);
    }

    #[test]
    fn test_same_account_root_arn() {
        let principal = Principal::from_aws("arn:aws:iam::111111111111:root");
        assert_eq!(principal.kind, PrincipalKind::RootAccount(OWNER.to_string()));
        assert_eq!(classify(&principal, OWNER, &[]), ReachClass::SameAccount);
    }

    #[test]
    fn test_cross_account_entity_arn() {
        let principal = Principal::from_aws("arn:aws:iam::222222222222:role/deploy");
        assert_eq!(
            classify(&principal, OWNER, &[]),
            ReachClass::CrossAccount("222222222222".to_string())
        );
    }

    #[test]
    fn test_bare_account_id() {
        let principal = Principal::from_aws("222222222222");
        assert_eq!(
            classify(&principal, OWNER, &[]),
            ReachClass::CrossAccount("222222222222".to_string())
        );
    }

    #[test]
    fn test_service_principal_without_conditions_is_same_account() {
        let principal = Principal::service("logs.amazonaws.com".to_string());
        assert_eq!(classify(&principal, OWNER, &[]), ReachClass::SameAccount);
    }

    #[test]
    fn test_service_principal_with_own_source_account_is_same_account() {
        let principal = Principal::service("sns.amazonaws.com".to_string());
        let conditions = vec![condition("StringEquals", "aws:SourceAccount", OWNER)];
        assert_eq!(
            classify(&principal, OWNER, &conditions),
            ReachClass::SameAccount
        );
    }

    #[test]
    fn test_service_principal_with_foreign_source_account_is_indeterminate() {
        let principal = Principal::service("sns.amazonaws.com".to_string());
        let conditions = vec![condition("StringEquals", "aws:SourceAccount", "222222222222")];
        assert!(matches!(
            classify(&principal, OWNER, &conditions),
            ReachClass::Indeterminate(_)
        ));
    }

    #[test]
    fn test_non_aws_service_hostname_is_unrecognized() {
        let principal = Principal::service("evil.example.com".to_string());
        assert_eq!(principal.kind, PrincipalKind::Unrecognized);
        assert!(matches!(
            classify(&principal, OWNER, &[]),
            ReachClass::Indeterminate(_)
        ));
    }

    #[test]
    fn test_federated_is_indeterminate() {
        let principal = Principal::federated("accounts.google.com".to_string());
        assert!(matches!(
            classify(&principal, OWNER, &[]),
            ReachClass::Indeterminate(_)
        ));
    }

    #[test]
    fn test_garbage_arn_is_indeterminate_not_private() {
        let principal = Principal::from_aws("arn:aws:iam::not-an-account:root");
        assert_eq!(principal.kind, PrincipalKind::Unrecognized);
        assert!(matches!(
            classify(&principal, OWNER, &[]),
            ReachClass::Indeterminate(_)
        ));
    }

    #[test]
    fn test_assumed_role_session_arn_parses_account() {
        let principal = Principal::from_aws("arn:aws:sts::222222222222:assumed-role/ops/session");
        assert_eq!(
            classify(&principal, OWNER, &[]),
            ReachClass::CrossAccount("222222222222".to_string())
        );
    }

    #[test]
    fn test_condition_op_is_parsed() {
        let c = condition("IpAddress", "aws:SourceIp", "10.0.0.0/8");
        assert_eq!(c.op, ConditionOp::IpAddress);
    }
}

//! Exposure verdict engine.
//!
//! Combines the classified statements of every policy attached to a
//! resource into a single verdict. The bias is conservative throughout:
//! a grant that cannot be proven safe is surfaced as Indeterminate, never
//! collapsed into Private, so that exposure is never silently missed.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::policy::condition::mitigates_public_grant;
use crate::policy::document::{
    ActionClause, Effect, PrincipalClause, ResourceClause, Statement,
};
use crate::policy::principal::{classify, PrincipalKind, ReachClass};
use crate::resource::{ResourceDescriptor, ResourceIdentity};

/// Final exposure classification for one resource.
///
/// Severity order: Public > CrossAccount > Indeterminate > Private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum ExposureVerdict {
    Public,
    CrossAccount(BTreeSet<String>),
    Indeterminate(String),
    Private,
}

impl ExposureVerdict {
    /// Numeric severity, highest first. Useful for sorting findings.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Public => 3,
            Self::CrossAccount(_) => 2,
            Self::Indeterminate(_) => 1,
            Self::Private => 0,
        }
    }
}

impl fmt::Display for ExposureVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::CrossAccount(accounts) => {
                let joined: Vec<&str> = accounts.iter().map(String::as_str).collect();
                write!(f, "cross-account ({})", joined.join(", "))
            }
            Self::Indeterminate(reason) => write!(f, "indeterminate ({reason})"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// Evaluate all policies attached to a resource.
///
/// A resource with no attached policy documents is Private: resource
/// policies are the only grant source in scope. Statement order never
/// affects the outcome; the highest severity found wins.
pub fn evaluate(resource: &ResourceDescriptor) -> ExposureVerdict {
    if resource.policies.is_empty() {
        return ExposureVerdict::Private;
    }

    let owner = resource.identity.account_id.as_str();
    let namespace = resource.service.as_str();

    let statements: Vec<&Statement> = resource
        .policies
        .iter()
        .flat_map(|doc| doc.statements.iter())
        .collect();

    // An explicit Deny only suppresses grants when it provably covers
    // them: no conditions, plain Principal form, and full action/resource
    // coverage. Anything weaker is ignored rather than trusted.
    let mut wildcard_denied = false;
    let mut denied_accounts: BTreeSet<&str> = BTreeSet::new();
    for statement in &statements {
        if statement.effect != Effect::Deny || !statement.conditions.is_empty() {
            continue;
        }
        let PrincipalClause::Principals(principals) = &statement.principals else {
            continue;
        };
        if !deny_covers_actions(&statement.actions, namespace)
            || !deny_covers_resource(&statement.resources, &resource.identity)
        {
            continue;
        }
        for principal in principals {
            match &principal.kind {
                PrincipalKind::Wildcard => wildcard_denied = true,
                PrincipalKind::AccountId(account) | PrincipalKind::RootAccount(account) => {
                    denied_accounts.insert(account.as_str());
                }
                // An entity-level Deny blocks one entity, not its account.
                _ => {}
            }
        }
    }

    let mut reaches: Vec<ReachClass> = Vec::new();
    for statement in &statements {
        if statement.effect != Effect::Allow {
            continue;
        }
        if !allow_matches_actions(&statement.actions, namespace) {
            continue;
        }
        match &statement.principals {
            PrincipalClause::Absent => {
                reaches.push(ReachClass::Indeterminate(
                    "statement grants access without naming a principal".to_string(),
                ));
            }
            PrincipalClause::NotPrincipals(_) => {
                // "Everyone except" is near-public but its exact reach is
                // not provable from the document alone.
                reaches.push(ReachClass::Indeterminate(
                    "NotPrincipal grant applies to all but the listed principals".to_string(),
                ));
            }
            PrincipalClause::Principals(principals) => {
                for principal in principals {
                    match classify(principal, owner, &statement.conditions) {
                        ReachClass::Public => {
                            if wildcard_denied {
                                continue;
                            }
                            if mitigates_public_grant(&statement.conditions) {
                                reaches.push(ReachClass::Indeterminate(
                                    "public grant narrowed by restrictive conditions".to_string(),
                                ));
                            } else {
                                reaches.push(ReachClass::Public);
                            }
                        }
                        ReachClass::CrossAccount(account) => {
                            if !denied_accounts.contains(account.as_str()) {
                                reaches.push(ReachClass::CrossAccount(account));
                            }
                        }
                        ReachClass::SameAccount => {}
                        indeterminate @ ReachClass::Indeterminate(_) => {
                            reaches.push(indeterminate);
                        }
                    }
                }
            }
        }
    }

    aggregate(reaches)
}

/// Collapse statement reaches into one verdict by severity.
fn aggregate(reaches: Vec<ReachClass>) -> ExposureVerdict {
    let mut accounts: BTreeSet<String> = BTreeSet::new();
    let mut first_indeterminate: Option<String> = None;
    for reach in reaches {
        match reach {
            ReachClass::Public => return ExposureVerdict::Public,
            ReachClass::CrossAccount(account) => {
                accounts.insert(account);
            }
            ReachClass::Indeterminate(reason) => {
                first_indeterminate.get_or_insert(reason);
            }
            ReachClass::SameAccount => {}
        }
    }
    if !accounts.is_empty() {
        ExposureVerdict::CrossAccount(accounts)
    } else if let Some(reason) = first_indeterminate {
        ExposureVerdict::Indeterminate(reason)
    } else {
        ExposureVerdict::Private
    }
}

/// Whether an Allow statement's actions touch the resource's namespace.
/// `NotAction` inverts matching in ways that cannot be bounded here, so
/// it is treated as matching.
fn allow_matches_actions(actions: &ActionClause, namespace: &str) -> bool {
    match actions {
        ActionClause::NotActions(_) => true,
        ActionClause::Actions(set) => {
            namespace.is_empty() || set.iter().any(|a| action_in_namespace(a, namespace))
        }
    }
}

fn action_in_namespace(action: &str, namespace: &str) -> bool {
    if action == "*" {
        return true;
    }
    match action.split_once(':') {
        Some((prefix, _)) => prefix.eq_ignore_ascii_case(namespace),
        None => false,
    }
}

/// Whether a Deny statement's actions cover every meaningful action of
/// the namespace. Requires `*` or `<namespace>:*`.
fn deny_covers_actions(actions: &ActionClause, namespace: &str) -> bool {
    match actions {
        ActionClause::NotActions(_) => false,
        ActionClause::Actions(set) => set.iter().any(|a| {
            a == "*"
                || (!namespace.is_empty()
                    && a.split_once(':')
                        .is_some_and(|(prefix, rest)| {
                            prefix.eq_ignore_ascii_case(namespace) && rest == "*"
                        }))
        }),
    }
}

/// Whether a Deny statement's resources cover the resource under
/// evaluation (and its sub-resources).
fn deny_covers_resource(resources: &ResourceClause, identity: &ResourceIdentity) -> bool {
    match resources {
        // No Resource field in a resource policy means the attached
        // resource itself.
        ResourceClause::Absent => true,
        ResourceClause::NotResources(_) => false,
        ResourceClause::Resources(patterns) => patterns.iter().any(|pattern| {
            pattern == "*"
                || identity.arn.as_deref().is_some_and(|arn| {
                    glob_match(pattern, arn)
                        && glob_match(pattern, &format!("{arn}/sub-resource"))
                })
        }),
    }
}

/// Minimal ARN glob: `*` matches any run of characters, `?` exactly one.
///
/// Iterative two-pointer match with one backtrack point per `*`, so the
/// cost stays linear in pattern and text length however many stars a
/// policy carries.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            // Try the empty match first; remember where to grow it.
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

//! Policy document parsing and normalization.
//!
//! AWS services return policy JSON with loose field shapes: `Statement` may
//! be a single object or an array, and `Principal`/`Action`/`Resource`
//! accept either a single string or a list. Everything is normalized here,
//! at parse time, so that no downstream code branches on wire shape.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::PolicyError;
use crate::policy::condition::{parse_conditions, Condition};
use crate::policy::principal::Principal;

/// A parsed, normalized IAM policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    pub version: Option<String>,
    pub statements: Vec<Statement>,
}

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

/// The `Principal` / `NotPrincipal` side of a statement.
///
/// `Absent` appears in identity-attached documents (for example, an inline
/// role policy) where the principal is implied by attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalClause {
    Principals(Vec<Principal>),
    NotPrincipals(Vec<Principal>),
    Absent,
}

/// The `Action` / `NotAction` side of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionClause {
    Actions(BTreeSet<String>),
    NotActions(BTreeSet<String>),
}

/// The `Resource` / `NotResource` side of a statement. Resource policies
/// may omit the field entirely; the attached resource is then implied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceClause {
    Resources(BTreeSet<String>),
    NotResources(BTreeSet<String>),
    Absent,
}

/// One normalized policy statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sid: Option<String>,
    pub effect: Effect,
    pub principals: PrincipalClause,
    pub actions: ActionClause,
    pub resources: ResourceClause,
    pub conditions: Vec<Condition>,
}

impl PolicyDocument {
    /// Parse a raw policy blob as received from an AWS API.
    pub fn parse_str(raw: &str) -> Result<Self, PolicyError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    /// Parse an already-deserialized policy value.
    ///
    /// Unknown top-level keys (`Id`, service-specific extensions) are
    /// ignored; a missing or non-object/array `Statement` is an error.
    pub fn from_value(value: &Value) -> Result<Self, PolicyError> {
        let object = value
            .as_object()
            .ok_or_else(|| PolicyError::malformed("top level is not a JSON object"))?;

        let raw_statement = object
            .get("Statement")
            .ok_or_else(|| PolicyError::malformed("missing Statement"))?;

        let raw_statements: Vec<&Value> = match raw_statement {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![raw_statement],
            other => {
                return Err(PolicyError::malformed(format!(
                    "Statement must be an object or array, got {other}"
                )))
            }
        };

        let mut statements = Vec::with_capacity(raw_statements.len());
        for raw in raw_statements {
            statements.push(Statement::from_value(raw)?);
        }

        Ok(Self {
            version: object
                .get("Version")
                .and_then(Value::as_str)
                .map(str::to_string),
            statements,
        })
    }
}

impl Statement {
    fn from_value(value: &Value) -> Result<Self, PolicyError> {
        let object = value
            .as_object()
            .ok_or_else(|| PolicyError::malformed("statement is not an object"))?;

        let effect = match object.get("Effect").and_then(Value::as_str) {
            Some(s) if s.eq_ignore_ascii_case("allow") => Effect::Allow,
            Some(s) if s.eq_ignore_ascii_case("deny") => Effect::Deny,
            Some(other) => {
                return Err(PolicyError::malformed(format!("unknown Effect {other:?}")))
            }
            None => return Err(PolicyError::malformed("statement missing Effect")),
        };

        let principals = if let Some(v) = object.get("Principal") {
            PrincipalClause::Principals(parse_principals(v)?)
        } else if let Some(v) = object.get("NotPrincipal") {
            PrincipalClause::NotPrincipals(parse_principals(v)?)
        } else {
            PrincipalClause::Absent
        };

        let actions = if let Some(v) = object.get("Action") {
            ActionClause::Actions(string_set(v, "Action")?)
        } else if let Some(v) = object.get("NotAction") {
            ActionClause::NotActions(string_set(v, "NotAction")?)
        } else {
            return Err(PolicyError::malformed("statement missing Action/NotAction"));
        };

        let resources = if let Some(v) = object.get("Resource") {
            ResourceClause::Resources(string_set(v, "Resource")?)
        } else if let Some(v) = object.get("NotResource") {
            ResourceClause::NotResources(string_set(v, "NotResource")?)
        } else {
            ResourceClause::Absent
        };

        let conditions = match object.get("Condition") {
            Some(v) => parse_conditions(v)?,
            None => Vec::new(),
        };

        Ok(Self {
            sid: object.get("Sid").and_then(Value::as_str).map(str::to_string),
            effect,
            principals,
            actions,
            resources,
            conditions,
        })
    }
}

/// Normalize a string-or-list field into a set of strings.
fn string_set(value: &Value, field: &str) -> Result<BTreeSet<String>, PolicyError> {
    match value {
        Value::String(s) => Ok(BTreeSet::from([s.clone()])),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    PolicyError::malformed(format!("{field} list contains a non-string entry"))
                })
            })
            .collect(),
        other => Err(PolicyError::malformed(format!(
            "{field} must be a string or list, got {other}"
        ))),
    }
}

/// Normalize the `Principal` field: either the `"*"` shorthand, a bare
/// string, or an object keyed by principal category (`AWS`, `Service`,
/// `Federated`, `CanonicalUser`).
fn parse_principals(value: &Value) -> Result<Vec<Principal>, PolicyError> {
    match value {
        Value::String(s) => Ok(vec![Principal::from_aws(s)]),
        Value::Object(map) => {
            let mut principals = Vec::new();
            for (category, entries) in map {
                for raw in principal_strings(entries)? {
                    principals.push(match category.as_str() {
                        "AWS" => Principal::from_aws(&raw),
                        "Service" => Principal::service(raw),
                        "Federated" => Principal::federated(raw),
                        "CanonicalUser" => Principal::canonical_user(raw),
                        _ => Principal::unrecognized(raw),
                    });
                }
            }
            Ok(principals)
        }
        other => Err(PolicyError::malformed(format!(
            "Principal must be a string or object, got {other}"
        ))),
    }
}

fn principal_strings(value: &Value) -> Result<Vec<String>, PolicyError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    PolicyError::malformed("Principal list contains a non-string entry")
                })
            })
            .collect(),
        other => Err(PolicyError::malformed(format!(
            "Principal entry must be a string or list, got {other}"
        ))),
    }
}

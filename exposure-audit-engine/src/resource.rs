//! Service-agnostic resource identity and evaluation input.

use serde::Serialize;

use crate::policy::document::PolicyDocument;

/// Identity of one enumerated resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceIdentity {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    pub account_id: String,
    pub region: String,
}

impl ResourceIdentity {
    pub fn new(
        name: impl Into<String>,
        arn: Option<&str>,
        account_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            arn: arn.map(str::to_string),
            account_id: account_id.into(),
            region: region.into(),
        }
    }
}

/// Everything the verdict engine needs for one resource: its identity,
/// its action namespace (for example `s3` or `sts`), and zero or more
/// attached policy documents. Constructed fresh per evaluation and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub identity: ResourceIdentity,
    /// Action-prefix namespace used to select the statements that apply to
    /// this resource. Empty means all statements apply.
    pub service: String,
    pub policies: Vec<PolicyDocument>,
}

impl ResourceDescriptor {
    pub fn new(
        identity: ResourceIdentity,
        service: impl Into<String>,
        policies: Vec<PolicyDocument>,
    ) -> Self {
        Self {
            identity,
            service: service.into(),
            policies,
        }
    }
}

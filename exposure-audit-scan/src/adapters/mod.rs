//! Per-service resource adapters and the adapter registry.
//!
//! Each adapter knows three things about its service: how to enumerate
//! resources (which list call, how records look), where the resource
//! policy lives (a dedicated call, an attribute map, or embedded in the
//! record itself), and how to name a record. Everything else is shared:
//! pagination mechanics, retries, and policy evaluation. Adding a service
//! means one adapter module and one registry arm.

mod acm_pca;
mod ecr;
mod efs;
mod elasticsearch;
mod glacier;
mod iam;
mod kms;
mod lambda;
mod logs;
mod s3;
mod secrets_manager;
mod ses;
mod sns;
mod sqs;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use exposure_audit_engine::ResourceIdentity;

use crate::error::ScanError;
use crate::transport::{CloudTransport, TransportError};

pub use acm_pca::AcmPcaCertificateAuthorities;
pub use ecr::EcrRepositories;
pub use efs::ElasticFileSystems;
pub use elasticsearch::ElasticsearchDomains;
pub use glacier::GlacierVaults;
pub use iam::IamRoles;
pub use kms::KmsKeys;
pub use lambda::{LambdaFunctions, LambdaLayers};
pub use logs::CloudwatchResourcePolicies;
pub use s3::S3Buckets;
pub use secrets_manager::SecretsManagerSecrets;
pub use ses::SesIdentities;
pub use sns::SnsTopics;
pub use sqs::SqsQueues;

/// Account and region the scan runs under, shared by every adapter.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub account_id: String,
    pub region: String,
}

impl ScanContext {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
        }
    }
}

/// The fixed capability set every service adapter implements.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    fn service(&self) -> ServiceKey;

    /// Lazily enumerate raw resource records, paging as the stream is
    /// polled.
    fn enumerate(&self) -> BoxStream<'static, Result<Value, TransportError>>;

    /// Fetch the raw policy blobs attached to one record. An empty vec
    /// means the resource has no resource policy.
    async fn fetch_policy(&self, record: &Value) -> Result<Vec<String>, TransportError>;

    /// Name a raw record.
    fn identity(&self, record: &Value) -> Result<ResourceIdentity, TransportError>;
}

/// Canonical service keys, decoupled from user-facing aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKey {
    AcmPca,
    Ecr,
    Efs,
    Elasticsearch,
    Glacier,
    Iam,
    Kms,
    Lambda,
    LambdaLayer,
    Logs,
    S3,
    SecretsManager,
    Ses,
    Sns,
    Sqs,
}

impl ServiceKey {
    pub const ALL: [Self; 15] = [
        Self::AcmPca,
        Self::Ecr,
        Self::Efs,
        Self::Elasticsearch,
        Self::Glacier,
        Self::Iam,
        Self::Kms,
        Self::Lambda,
        Self::LambdaLayer,
        Self::Logs,
        Self::S3,
        Self::SecretsManager,
        Self::Ses,
        Self::Sns,
        Self::Sqs,
    ];

    /// The canonical key used for adapter selection and display.
    pub fn canonical(self) -> &'static str {
        match self {
            Self::AcmPca => "acm-pca",
            Self::Ecr => "ecr",
            Self::Efs => "efs",
            Self::Elasticsearch => "elasticsearch",
            Self::Glacier => "glacier",
            Self::Iam => "iam",
            Self::Kms => "kms",
            Self::Lambda => "lambda",
            Self::LambdaLayer => "lambda-layer",
            Self::Logs => "logs",
            Self::S3 => "s3",
            Self::SecretsManager => "secretsmanager",
            Self::Ses => "ses",
            Self::Sns => "sns",
            Self::Sqs => "sqs",
        }
    }

    /// Action prefix used when selecting the statements that matter for
    /// this resource type. IAM role trust policies grant `sts:` actions.
    pub fn action_namespace(self) -> &'static str {
        match self {
            Self::AcmPca => "acm-pca",
            Self::Ecr => "ecr",
            Self::Efs => "elasticfilesystem",
            Self::Elasticsearch => "es",
            Self::Glacier => "glacier",
            Self::Iam => "sts",
            Self::Kms => "kms",
            Self::Lambda | Self::LambdaLayer => "lambda",
            Self::Logs => "logs",
            Self::S3 => "s3",
            Self::SecretsManager => "secretsmanager",
            Self::Ses => "ses",
            Self::Sns => "sns",
            Self::Sqs => "sqs",
        }
    }

    /// Canonical keys of every supported service, for help and error
    /// output.
    pub fn supported() -> Vec<&'static str> {
        Self::ALL.iter().map(|key| key.canonical()).collect()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

impl FromStr for ServiceKey {
    type Err = ScanError;

    /// Translate a user-supplied service name to its canonical key.
    /// `cloudwatch` is the user-facing name for the `logs` policy API.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "acm-pca" | "acmpca" => Ok(Self::AcmPca),
            "ecr" => Ok(Self::Ecr),
            "efs" | "elasticfilesystem" => Ok(Self::Efs),
            "elasticsearch" | "es" => Ok(Self::Elasticsearch),
            "glacier" => Ok(Self::Glacier),
            "iam" => Ok(Self::Iam),
            "kms" => Ok(Self::Kms),
            "lambda" => Ok(Self::Lambda),
            "lambda-layer" | "lambda-layers" => Ok(Self::LambdaLayer),
            "logs" | "cloudwatch" => Ok(Self::Logs),
            "s3" => Ok(Self::S3),
            "secretsmanager" | "secrets-manager" => Ok(Self::SecretsManager),
            "ses" => Ok(Self::Ses),
            "sns" => Ok(Self::Sns),
            "sqs" => Ok(Self::Sqs),
            other => Err(ScanError::UnsupportedService(other.to_string())),
        }
    }
}

/// Maps canonical service keys to adapter instances sharing one transport
/// and scan context.
pub struct AdapterRegistry {
    transport: Arc<dyn CloudTransport>,
    context: ScanContext,
}

impl AdapterRegistry {
    pub fn new(transport: Arc<dyn CloudTransport>, context: ScanContext) -> Self {
        Self { transport, context }
    }

    pub fn context(&self) -> &ScanContext {
        &self.context
    }

    pub fn adapter(&self, key: ServiceKey) -> Arc<dyn ResourceAdapter> {
        let transport = self.transport.clone();
        let context = self.context.clone();
        match key {
            ServiceKey::AcmPca => Arc::new(AcmPcaCertificateAuthorities::new(transport, context)),
            ServiceKey::Ecr => Arc::new(EcrRepositories::new(transport, context)),
            ServiceKey::Efs => Arc::new(ElasticFileSystems::new(transport, context)),
            ServiceKey::Elasticsearch => Arc::new(ElasticsearchDomains::new(transport, context)),
            ServiceKey::Glacier => Arc::new(GlacierVaults::new(transport, context)),
            ServiceKey::Iam => Arc::new(IamRoles::new(transport, context)),
            ServiceKey::Kms => Arc::new(KmsKeys::new(transport, context)),
            ServiceKey::Lambda => Arc::new(LambdaFunctions::new(transport, context)),
            ServiceKey::LambdaLayer => Arc::new(LambdaLayers::new(transport, context)),
            ServiceKey::Logs => Arc::new(CloudwatchResourcePolicies::new(transport, context)),
            ServiceKey::S3 => Arc::new(S3Buckets::new(transport, context)),
            ServiceKey::SecretsManager => {
                Arc::new(SecretsManagerSecrets::new(transport, context))
            }
            ServiceKey::Ses => Arc::new(SesIdentities::new(transport, context)),
            ServiceKey::Sns => Arc::new(SnsTopics::new(transport, context)),
            ServiceKey::Sqs => Arc::new(SqsQueues::new(transport, context)),
        }
    }
}

/// Issue a get call for a policy that may legitimately not exist, and
/// pull the policy blob out of the named response field. `NotFound` means
/// "no policy attached", which the verdict engine reports as Private.
pub(crate) async fn fetch_optional_policy(
    transport: &dyn CloudTransport,
    call: crate::transport::ApiCall,
    field: &str,
) -> Result<Vec<String>, TransportError> {
    match transport.get(&call).await {
        Ok(response) => Ok(opt_string_field(&response, field).into_iter().collect()),
        Err(TransportError::NotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Read a required string field off a raw record.
pub(crate) fn str_field<'a>(record: &'a Value, field: &str) -> Result<&'a str, TransportError> {
    record.get(field).and_then(Value::as_str).ok_or_else(|| {
        TransportError::UnexpectedShape(format!("record is missing string field {field:?}"))
    })
}

/// Read an optional string field off a response payload.
pub(crate) fn opt_string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

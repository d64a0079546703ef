//! AWS session resolution.
//!
//! Loads credentials through the standard provider chain and resolves the
//! owning account id via STS, so that adapters can judge cross-account
//! reach. The session is an explicit value handed to the orchestrator;
//! there is no process-wide client state.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::Client as StsClient;
use log::info;

use crate::error::ScanError;

const DEFAULT_REGION: &str = "us-east-1";

/// Resolved scanning identity.
#[derive(Debug, Clone)]
pub struct AwsSession {
    pub account_id: String,
    pub region: String,
}

impl AwsSession {
    /// Resolve the enumerating account through the default credential
    /// provider chain, honoring an optional named profile and region
    /// override.
    pub async fn resolve(
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<Self, ScanError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;

        let sts = StsClient::new(&config);
        let identity = sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| ScanError::Session(format!("GetCallerIdentity failed: {e}")))?;
        let account_id = identity
            .account()
            .ok_or_else(|| {
                ScanError::Session("GetCallerIdentity returned no account id".to_string())
            })?
            .to_string();

        let region = config
            .region()
            .map(ToString::to_string)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        info!("scanning as account {account_id} in {region}");
        Ok(Self { account_id, region })
    }
}

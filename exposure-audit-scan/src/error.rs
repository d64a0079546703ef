//! Scan-layer error taxonomy.
//!
//! Only errors that prevent a run from beginning at all (unknown service
//! key, no usable session, unreadable snapshot) are fatal; everything
//! local to a single resource is absorbed into an Indeterminate finding
//! by the orchestrator.

use thiserror::Error;

use exposure_audit_engine::PolicyError;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ScanError {
    /// No adapter is registered for the requested canonical key.
    #[error("unsupported service: {0}")]
    UnsupportedService(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("AWS session error: {0}")]
    Session(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

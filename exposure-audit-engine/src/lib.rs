//! This crate provides the core evaluation logic for exposure auditing:
//! - IAM policy document parsing and normalization
//! - Principal classification against the owning account
//! - Condition narrowing analysis
//! - Exposure verdict aggregation
//!
//! The engine is pure: it performs no I/O, holds no state between
//! evaluations, and is safe to call from any number of concurrent workers.

mod error;
pub mod policy;
mod resource;
mod verdict;

// Re-exports for a small, focused public API
pub use error::PolicyError;
pub use policy::condition::{mitigates_public_grant, Condition, ConditionOp, SetQualifier};
pub use policy::document::{
    ActionClause, Effect, PolicyDocument, PrincipalClause, ResourceClause, Statement,
};
pub use policy::principal::{classify, Principal, PrincipalKind, ReachClass};
pub use resource::{ResourceDescriptor, ResourceIdentity};
pub use verdict::{evaluate, ExposureVerdict};

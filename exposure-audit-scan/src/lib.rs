//! Resource enumeration and exposure scanning.
//!
//! This crate turns the pure policy engine in `exposure-audit-engine`
//! into a working scanner: per-service adapters enumerate resources and
//! fetch their policies over a [`CloudTransport`], and the
//! [`Orchestrator`] streams one finding per resource, lazily and with
//! bounded concurrency.

pub mod adapters;
pub mod error;
pub mod orchestrator;
pub mod replay;
pub mod retry;
pub mod session;
pub mod transport;

pub use adapters::{AdapterRegistry, ResourceAdapter, ScanContext, ServiceKey};
pub use error::ScanError;
pub use orchestrator::{Orchestrator, ScanFinding};
pub use replay::{ReplayTransport, Snapshot};
pub use retry::RetryTransport;
pub use session::AwsSession;
pub use transport::{page_stream, ApiCall, CloudTransport, ListPage, TransportError};

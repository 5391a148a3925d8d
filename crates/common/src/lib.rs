//! Shared configuration, error types, ids, containers and observability for tdf crates.
//!
//! Architecture role:
//! - defines engine configuration and the runtime/task context passed across layers
//! - provides the common [`TdfError`] / [`Result`] contracts
//! - hosts the columnar containers ([`Batch`], [`Vector`], [`ScalarValue`])
//! - hosts prometheus metrics
//!
//! Key modules:
//! - [`config`]
//! - [`containers`]
//! - [`context`]
//! - [`error`]
//! - [`ids`]
//! - [`metrics`]

pub mod config;
pub mod containers;
pub mod context;
pub mod error;
pub mod ids;
pub mod metrics;

pub use config::EngineConfig;
pub use containers::{is_supported_type, Batch, ScalarValue, SchemaExt, Vector};
pub use context::{CancellationToken, RuntimeEnv, TaskContext};
pub use error::{Result, TdfError};
pub use ids::*;
pub use metrics::{global_metrics, MetricsRegistry};

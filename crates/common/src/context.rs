//! Session-scoped runtime and per-query task context.

use std::sync::Arc;

pub use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::ids::{SessionId, TaskId};
use crate::metrics::MetricsRegistry;

/// Resources shared by every query a session runs.
#[derive(Debug, Clone, Default)]
pub struct RuntimeEnv {
    pub config: EngineConfig,
    pub metrics: MetricsRegistry,
}

impl RuntimeEnv {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            metrics: MetricsRegistry::new(),
        }
    }
}

/// Everything one query execution needs at runtime.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub session_id: SessionId,
    pub task_id: TaskId,
    pub runtime: Arc<RuntimeEnv>,
    /// Cancelling this token aborts every worker the query spawned.
    pub cancellation: CancellationToken,
}

impl TaskContext {
    pub fn new(session_id: SessionId, runtime: Arc<RuntimeEnv>) -> Self {
        Self {
            session_id,
            task_id: TaskId::next(),
            runtime,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn batch_size_rows(&self) -> usize {
        self.runtime.config.batch_size_rows
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.runtime.metrics
    }
}

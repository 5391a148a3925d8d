use std::path::Path;
use std::sync::Arc;

use arrow_schema::SchemaRef;
use tdf_common::{EngineConfig, Result};
use tdf_execution::SessionState;
use tdf_planner::{LogicalPlanBuilder, OptimizerRule};
use tdf_storage::{ParquetTableProvider, TableProvider};
use tracing::debug;

use crate::DataFrame;

pub type SharedSession = Arc<SessionState>;

/// Entry point for building and running queries.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session: SharedSession,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SessionContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            session: Arc::new(SessionState::new(config)),
        }
    }

    /// Session configured from `TDF_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(EngineConfig::from_env()?))
    }

    pub fn state(&self) -> &SessionState {
        &self.session
    }

    /// Scans a Parquet file. Without `schema` it is read from the file footer.
    pub fn parquet(&self, path: impl AsRef<Path>, schema: Option<SchemaRef>) -> Result<DataFrame> {
        let path = path.as_ref();
        let provider = match schema {
            Some(schema) => ParquetTableProvider::with_schema(path, schema)?,
            None => ParquetTableProvider::try_new(path)?,
        };
        debug!(path = %path.display(), "parquet source opened");
        Ok(self.table(path.display().to_string(), Arc::new(provider)))
    }

    /// Scans any table provider; `path` is the label shown in plans.
    pub fn table(&self, path: impl Into<String>, provider: Arc<dyn TableProvider>) -> DataFrame {
        let builder = LogicalPlanBuilder::new().input(path, provider, None);
        DataFrame::new(self.session.clone(), builder)
    }

    /// Adds a rule run after the built-in optimizer passes.
    ///
    /// Returns `true` when a rule with the same name was replaced.
    pub fn register_optimizer_rule(&self, rule: Arc<dyn OptimizerRule>) -> bool {
        self.session.optimizer().register_rule(rule)
    }

    pub fn deregister_optimizer_rule(&self, name: &str) -> bool {
        self.session.optimizer().deregister_rule(name)
    }

    pub fn prometheus_metrics(&self) -> String {
        self.session.runtime().metrics.render_prometheus()
    }
}

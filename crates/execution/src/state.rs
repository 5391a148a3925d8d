//! Session state and the per-query lifecycle.
//!
//! A query moves `Planned -> Executing -> Finished | Failed` exactly once.
//! Batches already handed to the sink before a failure are not retracted.

use std::fmt;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tdf_common::{
    CancellationToken, EngineConfig, Result, RuntimeEnv, SessionId, TaskContext, TdfError,
};
use tdf_planner::{validate, LogicalPlan, Optimizer};
use tracing::{debug, info, warn};

use crate::operators::PhysicalPlan;
use crate::physical_planner::{DefaultQueryPlanner, QueryPlanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Planned,
    Executing,
    Finished,
    Failed,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryState::Planned => "planned",
            QueryState::Executing => "executing",
            QueryState::Finished => "finished",
            QueryState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Everything a session needs to turn logical plans into running queries.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: SessionId,
    pub started_at: SystemTime,
    query_planner: Arc<dyn QueryPlanner>,
    optimizer: Arc<Optimizer>,
    runtime: Arc<RuntimeEnv>,
}

impl SessionState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            session_id: SessionId::next(),
            started_at: SystemTime::now(),
            query_planner: Arc::new(DefaultQueryPlanner::new()),
            optimizer: Arc::new(Optimizer::new()),
            runtime: Arc::new(RuntimeEnv::new(config)),
        }
    }

    pub fn with_query_planner(mut self, planner: Arc<dyn QueryPlanner>) -> Self {
        self.query_planner = planner;
        self
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    pub fn runtime(&self) -> &Arc<RuntimeEnv> {
        &self.runtime
    }

    /// Fresh context with its own task id and cancellation token.
    pub fn task_context(&self) -> TaskContext {
        TaskContext::new(self.session_id, Arc::clone(&self.runtime))
    }

    pub fn optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        self.optimizer.optimize(plan)
    }

    /// Validates and optimizes `logical`, then compiles it.
    pub fn create_physical_plan(&self, logical: &LogicalPlan) -> Result<PhysicalPlan> {
        validate(logical)?;
        let optimized = self.optimize(logical.clone())?;
        self.query_planner.create_physical_plan(&optimized)
    }

    /// Plans `logical` into a query ready to run.
    pub fn create_query(&self, logical: &LogicalPlan) -> Result<Query> {
        let plan = self.create_physical_plan(logical)?;
        Ok(Query::new(plan, self.task_context()))
    }
}

/// A planned physical pipeline bound to one task context.
#[derive(Debug)]
pub struct Query {
    plan: PhysicalPlan,
    ctx: TaskContext,
    state: QueryState,
}

impl Query {
    pub fn new(plan: PhysicalPlan, ctx: TaskContext) -> Self {
        Self {
            plan,
            ctx,
            state: QueryState::Planned,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn plan(&self) -> &PhysicalPlan {
        &self.plan
    }

    pub fn task_context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Requests cancellation; workers observe it at their next queue receive.
    pub fn cancel(&self) {
        self.ctx.cancellation.cancel();
    }

    /// Handle for cancelling from elsewhere while `execute` holds the query.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancellation.clone()
    }

    /// Runs the pipeline to completion. A query can only run once.
    pub async fn execute(&mut self) -> Result<()> {
        if self.state != QueryState::Planned {
            return Err(TdfError::Execution(format!(
                "query {} cannot start: it is {}",
                self.ctx.task_id, self.state
            )));
        }
        self.state = QueryState::Executing;
        info!(
            session_id = %self.ctx.session_id,
            task_id = %self.ctx.task_id,
            "query executing"
        );
        debug!(plan = %self.plan.display_indent(), "executing physical plan");

        let started = Instant::now();
        let result = self.plan.execute(&self.ctx).await;
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(()) => {
                self.state = QueryState::Finished;
                info!(task_id = %self.ctx.task_id, elapsed_ms = elapsed.as_millis() as u64, "query finished");
                "finished"
            }
            Err(err) => {
                self.state = QueryState::Failed;
                warn!(task_id = %self.ctx.task_id, error = %err, "query failed");
                "failed"
            }
        };
        self.ctx
            .metrics()
            .record_query(outcome, elapsed.as_secs_f64());
        result
    }
}

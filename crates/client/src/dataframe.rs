use std::sync::{Arc, Mutex};

use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use tdf_common::{Batch, Result, TdfError};
use tdf_execution::PhysicalPlan;
use tdf_planner::{Expr, LogicalPlan, LogicalPlanBuilder, Sink};

use crate::session::SharedSession;

/// A lazily planned query over one table.
///
/// Operations only extend the logical plan; nothing runs until
/// [`DataFrame::collect`], [`DataFrame::collect_with`] or [`DataFrame::show`].
#[derive(Debug, Clone)]
pub struct DataFrame {
    session: SharedSession,
    builder: LogicalPlanBuilder,
}

impl DataFrame {
    pub(crate) fn new(session: SharedSession, builder: LogicalPlanBuilder) -> Self {
        Self { session, builder }
    }

    /// df.project(exprs)
    pub fn project(self, exprs: Vec<Expr>) -> Self {
        Self::new(self.session, self.builder.project(exprs))
    }

    /// df.filter(expr)
    pub fn filter(self, predicate: Expr) -> Self {
        Self::new(self.session, self.builder.filter(predicate))
    }

    /// df.aggregate(group_exprs, aggr_exprs)
    pub fn aggregate(self, group_exprs: Vec<Expr>, aggr_exprs: Vec<Expr>) -> Self {
        Self::new(self.session, self.builder.aggregate(group_exprs, aggr_exprs))
    }

    /// The validated logical plan, as built.
    pub fn logical_plan(&self) -> Result<LogicalPlan> {
        self.builder.build()
    }

    /// The logical plan after the session's optimizer passes.
    pub fn optimized_logical_plan(&self) -> Result<LogicalPlan> {
        self.session.optimize(self.logical_plan()?)
    }

    /// The physical plan this frame would run, with a discarding sink.
    pub fn physical_plan(&self) -> Result<PhysicalPlan> {
        let plan = self.with_sink(Sink::discard())?;
        self.session.create_physical_plan(&plan)
    }

    /// Runs the query, handing every result batch to `sink`.
    pub async fn collect_with(&self, sink: Sink) -> Result<()> {
        let plan = self.with_sink(sink)?;
        let mut query = self.session.create_query(&plan)?;
        query.execute().await
    }

    /// Runs the query and gathers its result batches.
    pub async fn collect(&self) -> Result<Vec<RecordBatch>> {
        let out = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&out);
        let sink = Sink::new(move |batch: Batch| {
            let batch = batch.to_record_batch()?;
            captured
                .lock()
                .expect("collect sink lock poisoned")
                .push(batch);
            Ok(())
        });
        self.collect_with(sink).await?;

        let batches = std::mem::take(&mut *out.lock().expect("collect sink lock poisoned"));
        Ok(batches)
    }

    /// Runs the query and prints the result as a table.
    pub async fn show(&self) -> Result<()> {
        let batches = self.collect().await?;
        let table = pretty_format_batches(&batches)
            .map_err(|e| TdfError::Execution(format!("failed to render results: {e}")))?;
        println!("{table}");
        Ok(())
    }

    fn with_sink(&self, sink: Sink) -> Result<LogicalPlan> {
        self.builder.clone().output(sink).build()
    }
}

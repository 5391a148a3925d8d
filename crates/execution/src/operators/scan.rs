use std::sync::Arc;

use arrow_schema::SchemaRef;
use futures::future::try_join_all;
use futures::FutureExt;
use tdf_common::{Batch, Result, TaskContext};
use tdf_storage::{BatchCallback, PushOptions, SnapshotTs, TableProvider};
use tracing::{debug, info};

use super::PhysicalPlan;

/// Pipeline driver: reads a snapshot of the source and pushes its batches
/// into every downstream operator.
#[derive(Debug)]
pub struct ScanExec {
    pub(crate) path: String,
    source: Arc<dyn TableProvider>,
    pub(crate) projection: Option<Vec<String>>,
    schema: SchemaRef,
    pub(crate) next: Vec<PhysicalPlan>,
}

impl ScanExec {
    pub fn new(
        path: impl Into<String>,
        source: Arc<dyn TableProvider>,
        projection: Option<Vec<String>>,
        schema: SchemaRef,
        next: Vec<PhysicalPlan>,
    ) -> Self {
        Self {
            path: path.into(),
            source,
            projection,
            schema,
            next,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Delivery phase under one snapshot, then a finish phase over every
    /// downstream operator. The first error of either phase is returned.
    pub(crate) async fn execute(&mut self, ctx: &TaskContext) -> Result<()> {
        let ScanExec {
            path,
            source,
            projection,
            next,
            ..
        } = &mut *self;
        let options = PushOptions {
            projection: projection.clone(),
        };
        let source: &dyn TableProvider = source.as_ref();
        info!(
            session_id = %ctx.session_id,
            task_id = %ctx.task_id,
            path = %path,
            consumers = next.len(),
            "scan started"
        );

        source
            .view(
                ctx,
                Box::new(move |snapshot: SnapshotTs| {
                    async move {
                        debug!(%snapshot, "scan snapshot acquired");
                        let callbacks: Vec<BatchCallback<'_>> = next
                            .iter_mut()
                            .map(|child| {
                                Box::new(move |batch: Batch| child.callback(batch)) as BatchCallback<'_>
                            })
                            .collect();
                        source.push(ctx, snapshot, callbacks, options).await
                    }
                    .boxed()
                }),
            )
            .await?;

        try_join_all(self.next.iter_mut().map(|child| async move { child.finish() })).await?;
        debug!(path = %self.path, "scan finished");
        Ok(())
    }
}

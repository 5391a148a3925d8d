use std::sync::{Arc, RwLock};

use arrow_schema::SchemaRef;
use futures::future::BoxFuture;
use futures::FutureExt;
use tdf_common::{Batch, Result, TaskContext, TdfError};
use tracing::debug;

use crate::fanout::fan_out;
use crate::provider::{
    project_batch, resolve_projection, BatchCallback, PushOptions, SnapshotTs, TableProvider,
    ViewFn,
};

/// In-memory table whose partitions are stamped with the version that
/// appended them.
///
/// A snapshot is the table version at `view` time; scans under it never see
/// partitions appended later.
#[derive(Debug)]
pub struct MemTableProvider {
    name: String,
    schema: SchemaRef,
    state: RwLock<MemState>,
}

#[derive(Debug, Default)]
struct MemState {
    version: u64,
    partitions: Vec<MemPartition>,
}

#[derive(Debug)]
struct MemPartition {
    version: u64,
    batches: Arc<Vec<Batch>>,
}

impl MemTableProvider {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self {
            name: name.into(),
            schema,
            state: RwLock::new(MemState::default()),
        }
    }

    /// Table pre-populated with one partition per entry of `partitions`.
    pub fn try_new(
        name: impl Into<String>,
        schema: SchemaRef,
        partitions: Vec<Vec<Batch>>,
    ) -> Result<Self> {
        let table = Self::new(name, schema);
        for p in partitions {
            table.append(p)?;
        }
        Ok(table)
    }

    /// Adds one partition and returns the new table version.
    pub fn append(&self, batches: Vec<Batch>) -> Result<SnapshotTs> {
        for b in &batches {
            let same = b.schema().fields().len() == self.schema.fields().len()
                && b
                    .schema()
                    .fields()
                    .iter()
                    .zip(self.schema.fields())
                    .all(|(a, e)| a.name() == e.name() && a.data_type() == e.data_type());
            if !same {
                return Err(TdfError::Source(format!(
                    "batch schema does not match table '{}'",
                    self.name
                )));
            }
        }
        let mut state = self.state.write().expect("mem table lock poisoned");
        state.version += 1;
        let version = state.version;
        state.partitions.push(MemPartition {
            version,
            batches: Arc::new(batches),
        });
        Ok(SnapshotTs(version))
    }

    pub fn version(&self) -> SnapshotTs {
        SnapshotTs(self.state.read().expect("mem table lock poisoned").version)
    }
}

impl TableProvider for MemTableProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn view<'a>(&'a self, _ctx: &'a TaskContext, f: ViewFn<'a>) -> BoxFuture<'a, Result<()>> {
        f(self.version())
    }

    fn push<'a>(
        &'a self,
        ctx: &'a TaskContext,
        snapshot: SnapshotTs,
        callbacks: Vec<BatchCallback<'a>>,
        options: PushOptions,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let ordinals = match &options.projection {
                Some(names) => Some(resolve_projection(&self.schema, names)?),
                None => None,
            };
            let visible: Vec<Arc<Vec<Batch>>> = {
                let state = self.state.read().expect("mem table lock poisoned");
                state
                    .partitions
                    .iter()
                    .filter(|p| p.version <= snapshot.0)
                    .map(|p| p.batches.clone())
                    .collect()
            };
            debug!(table = %self.name, %snapshot, partitions = visible.len(), "memory scan starting");
            fan_out(ctx, &self.name, visible, callbacks, |partition| {
                partition
                    .iter()
                    .map(|b| match &ordinals {
                        Some(ordinals) => project_batch(b, ordinals),
                        None => Ok(b.clone()),
                    })
                    .collect()
            })
            .await
        }
        .boxed()
    }
}

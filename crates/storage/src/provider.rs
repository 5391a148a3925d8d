use std::fmt;
use std::sync::Arc;

use arrow_schema::{Schema, SchemaRef};
use futures::future::BoxFuture;
use tdf_common::{Batch, Result, TaskContext, TdfError};

/// Point-in-time marker bounding which source data a scan may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotTs(
    /// Provider-defined value (wall-clock nanos, table version, ...).
    pub u64,
);

impl fmt::Display for SnapshotTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receives every batch a scan delivers to one downstream consumer.
pub type BatchCallback<'a> = Box<dyn FnMut(Batch) -> Result<()> + Send + 'a>;

/// Work run against a snapshot obtained through [`TableProvider::view`].
pub type ViewFn<'a> = Box<dyn FnOnce(SnapshotTs) -> BoxFuture<'a, Result<()>> + Send + 'a>;

/// Options honored by [`TableProvider::push`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Columns to deliver, in this order. `None` delivers every column.
    pub projection: Option<Vec<String>>,
}

/// Source of schema-typed batches for a logical scan.
///
/// Implementations own everything format specific: opening files, mapping
/// on-disk types to vector types, partitioning the data and closing handles.
pub trait TableProvider: fmt::Debug + Send + Sync {
    /// Short label used in logs and metrics.
    fn name(&self) -> &str;

    fn schema(&self) -> SchemaRef;

    /// Obtains a time-consistent view and runs `f` with its snapshot.
    fn view<'a>(&'a self, ctx: &'a TaskContext, f: ViewFn<'a>) -> BoxFuture<'a, Result<()>>;

    /// Streams all data visible at `snapshot` to the callbacks.
    ///
    /// The first callback or read error aborts delivery to every callback
    /// and is returned.
    fn push<'a>(
        &'a self,
        ctx: &'a TaskContext,
        snapshot: SnapshotTs,
        callbacks: Vec<BatchCallback<'a>>,
        options: PushOptions,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Resolves projection names against `schema`, ignoring ASCII case.
///
/// Returns the matching ordinals in request order.
pub fn resolve_projection(schema: &Schema, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            schema
                .fields()
                .iter()
                .position(|f| f.name().eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    TdfError::Source(format!("projected column '{name}' not found in source"))
                })
        })
        .collect()
}

/// Copies the selected columns of `batch` into a new batch.
pub fn project_batch(batch: &Batch, ordinals: &[usize]) -> Result<Batch> {
    let schema = Arc::new(batch.schema().project(ordinals).map_err(|e| {
        TdfError::Source(format!("batch projection failed: {e}"))
    })?);
    let columns = ordinals
        .iter()
        .map(|&i| {
            batch.column(i).cloned().ok_or_else(|| {
                TdfError::Source(format!("column ordinal {i} out of range"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Batch::try_new_with_rows(schema, columns, batch.num_rows())
}

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arrow_schema::{Schema, SchemaRef};
use futures::future::BoxFuture;
use futures::FutureExt;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use tdf_common::{is_supported_type, Batch, Result, TaskContext, TdfError, Vector};
use tracing::debug;

use crate::fanout::fan_out;
use crate::provider::{
    resolve_projection, BatchCallback, PushOptions, SnapshotTs, TableProvider, ViewFn,
};

/// Local parquet file read one row group per partition.
#[derive(Debug)]
pub struct ParquetTableProvider {
    path: PathBuf,
    label: String,
    schema: SchemaRef,
    /// File column ordinal for each field of `schema`.
    file_columns: Vec<usize>,
}

impl ParquetTableProvider {
    /// Opens `path` and infers the schema from the file footer.
    pub fn try_new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_schema = open_builder(&path)?.schema().clone();
        Self::bind(path, file_schema.clone(), &file_schema)
    }

    /// Uses a caller supplied schema instead of the file's.
    ///
    /// Every declared field is matched by name against the file footer and
    /// must have the same type there; scans deliver columns in the declared
    /// order.
    pub fn with_schema(path: impl AsRef<Path>, schema: SchemaRef) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_schema = open_builder(&path)?.schema().clone();
        Self::bind(path, schema, &file_schema)
    }

    fn bind(path: PathBuf, schema: SchemaRef, file_schema: &Schema) -> Result<Self> {
        check_supported(&schema)?;
        let names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let file_columns = resolve_projection(file_schema, &names)?;
        for (field, &ordinal) in schema.fields().iter().zip(&file_columns) {
            let stored = file_schema.field(ordinal).data_type();
            if stored != field.data_type() {
                return Err(TdfError::Source(format!(
                    "column '{}' is declared {:?} but '{}' stores {:?}",
                    field.name(),
                    field.data_type(),
                    path.display(),
                    stored
                )));
            }
        }
        Ok(Self {
            label: path.display().to_string(),
            path,
            schema,
            file_columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_row_group(
        &self,
        row_group: usize,
        columns: &[usize],
        out_schema: &SchemaRef,
        batch_size: usize,
    ) -> Result<Vec<Batch>> {
        let builder = open_builder(&self.path)?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), columns.iter().copied());
        let reader = builder
            .with_row_groups(vec![row_group])
            .with_projection(mask)
            .with_batch_size(batch_size)
            .build()
            .map_err(|e| TdfError::Source(format!("parquet reader open failed: {e}")))?;

        // the reader yields projected columns in file order
        let mut file_order = columns.to_vec();
        file_order.sort_unstable();
        file_order.dedup();
        let positions: Vec<usize> = columns
            .iter()
            .map(|c| file_order.binary_search(c).unwrap_or_default())
            .collect();

        let mut out = Vec::new();
        for rb in reader {
            let rb = rb.map_err(|e| TdfError::Source(format!("parquet decode failed: {e}")))?;
            let vectors = positions
                .iter()
                .map(|&p| Vector::try_new(rb.column(p).clone()))
                .collect::<Result<Vec<_>>>()
                .map_err(|e| TdfError::Source(format!("row group {row_group}: {e}")))?;
            out.push(Batch::try_new_with_rows(
                out_schema.clone(),
                vectors,
                rb.num_rows(),
            )?);
        }
        Ok(out)
    }
}

impl TableProvider for ParquetTableProvider {
    fn name(&self) -> &str {
        &self.label
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn view<'a>(&'a self, _ctx: &'a TaskContext, f: ViewFn<'a>) -> BoxFuture<'a, Result<()>> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        f(SnapshotTs(nanos))
    }

    fn push<'a>(
        &'a self,
        ctx: &'a TaskContext,
        snapshot: SnapshotTs,
        callbacks: Vec<BatchCallback<'a>>,
        options: PushOptions,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let builder = open_builder(&self.path)?;
            let declared = match &options.projection {
                Some(names) => resolve_projection(&self.schema, names)?,
                None => (0..self.schema.fields().len()).collect(),
            };
            let columns: Vec<usize> = declared.iter().map(|&i| self.file_columns[i]).collect();
            let out_schema: SchemaRef = Arc::new(
                self.schema
                    .project(&declared)
                    .map_err(|e| TdfError::Source(format!("parquet projection failed: {e}")))?,
            );
            let row_groups = builder.metadata().num_row_groups();
            drop(builder);
            debug!(
                path = %self.label,
                %snapshot,
                row_groups,
                columns = out_schema.fields().len(),
                "parquet scan starting"
            );

            let batch_size = ctx.batch_size_rows();
            fan_out(
                ctx,
                &self.label,
                (0..row_groups).collect(),
                callbacks,
                |row_group| self.read_row_group(row_group, &columns, &out_schema, batch_size),
            )
            .await
        }
        .boxed()
    }
}

fn open_builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path).map_err(|e| {
        TdfError::Source(format!("cannot open parquet file '{}': {e}", path.display()))
    })?;
    ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| TdfError::Source(format!("parquet reader build failed: {e}")))
}

fn check_supported(schema: &Schema) -> Result<()> {
    for field in schema.fields() {
        if !is_supported_type(field.data_type()) {
            return Err(TdfError::Source(format!(
                "unsupported type {:?} for column '{}'",
                field.data_type(),
                field.name()
            )));
        }
    }
    Ok(())
}

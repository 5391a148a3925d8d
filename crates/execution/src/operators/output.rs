use arrow_schema::SchemaRef;
use tdf_common::{Batch, Result};
use tdf_planner::Sink;

/// Terminal operator handing batches to the query's sink.
#[derive(Debug)]
pub struct OutputExec {
    sink: Sink,
    schema: SchemaRef,
}

impl OutputExec {
    pub fn new(sink: Sink, schema: SchemaRef) -> Self {
        Self { sink, schema }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub(crate) fn callback(&mut self, batch: Batch) -> Result<()> {
        self.sink.call(batch)
    }
}

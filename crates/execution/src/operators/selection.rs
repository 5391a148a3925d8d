use arrow_schema::SchemaRef;
use tdf_common::{Batch, Result};

use super::PhysicalPlan;
use crate::expressions::PhysicalExpr;

/// Keeps rows matching a boolean predicate.
///
/// Incoming batches are shrunk in place and forwarded, never copied.
#[derive(Debug)]
pub struct SelectionExec {
    pub(crate) predicate: PhysicalExpr,
    schema: SchemaRef,
    pub(crate) next: Box<PhysicalPlan>,
}

impl SelectionExec {
    pub fn new(predicate: PhysicalExpr, schema: SchemaRef, next: PhysicalPlan) -> Self {
        Self {
            predicate,
            schema,
            next: Box::new(next),
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub(crate) fn callback(&mut self, mut batch: Batch) -> Result<()> {
        let mask = self.predicate.evaluate(&batch)?;
        batch.shrink(mask.as_boolean()?)?;
        self.next.callback(batch)
    }
}

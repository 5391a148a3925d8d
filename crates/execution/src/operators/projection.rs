use arrow_schema::SchemaRef;
use tdf_common::{Batch, Result};

use super::PhysicalPlan;
use crate::expressions::PhysicalExpr;

#[derive(Debug)]
pub struct ProjectionExec {
    pub(crate) exprs: Vec<PhysicalExpr>,
    schema: SchemaRef,
    pub(crate) next: Box<PhysicalPlan>,
}

impl ProjectionExec {
    pub fn new(exprs: Vec<PhysicalExpr>, schema: SchemaRef, next: PhysicalPlan) -> Self {
        Self {
            exprs,
            schema,
            next: Box::new(next),
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub(crate) fn callback(&mut self, batch: Batch) -> Result<()> {
        let columns = self
            .exprs
            .iter()
            .map(|e| e.evaluate(&batch))
            .collect::<Result<Vec<_>>>()?;
        let out = Batch::try_new_with_rows(self.schema.clone(), columns, batch.num_rows())?;
        self.next.callback(out)
    }
}

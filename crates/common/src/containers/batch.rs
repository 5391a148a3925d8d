use arrow::array::{Array, BooleanArray, RecordBatch, RecordBatchOptions};
use arrow::compute::filter;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use arrow_schema::SchemaRef;

use super::vector::Vector;
use crate::error::{Result, TdfError};

/// A schema plus one equally long [`Vector`] per field.
#[derive(Debug, Clone)]
pub struct Batch {
    schema: SchemaRef,
    columns: Vec<Vector>,
    num_rows: usize,
}

impl Batch {
    pub fn try_new(schema: SchemaRef, columns: Vec<Vector>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, Vector::len);
        Self::try_new_with_rows(schema, columns, num_rows)
    }

    /// Like [`Batch::try_new`] but with an explicit row count, needed when the
    /// batch carries no columns.
    pub fn try_new_with_rows(
        schema: SchemaRef,
        columns: Vec<Vector>,
        num_rows: usize,
    ) -> Result<Self> {
        if columns.len() != schema.fields().len() {
            return Err(TdfError::Type(format!(
                "batch has {} columns but schema has {} fields",
                columns.len(),
                schema.fields().len()
            )));
        }
        for (field, col) in schema.fields().iter().zip(&columns) {
            if col.len() != num_rows {
                return Err(TdfError::Type(format!(
                    "column '{}' has {} rows, expected {num_rows}",
                    field.name(),
                    col.len()
                )));
            }
            if col.data_type() != field.data_type() {
                return Err(TdfError::Type(format!(
                    "column '{}' is {:?} but schema declares {:?}",
                    field.name(),
                    col.data_type(),
                    field.data_type()
                )));
            }
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let columns = batch
            .columns()
            .iter()
            .map(|a| Vector::try_new(a.clone()))
            .collect::<Result<Vec<_>>>()?;
        Self::try_new_with_rows(batch.schema(), columns, batch.num_rows())
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        RecordBatch::try_new_with_options(
            self.schema.clone(),
            self.columns.iter().map(|c| c.array().clone()).collect(),
            &options,
        )
        .map_err(|e| TdfError::Execution(format!("record batch assembly failed: {e}")))
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, ordinal: usize) -> Option<&Vector> {
        self.columns.get(ordinal)
    }

    pub fn columns(&self) -> &[Vector] {
        &self.columns
    }

    /// Keeps only rows whose mask entry is `true` (null counts as false).
    ///
    /// The batch is modified in place: anyone holding this batch observes the
    /// reduced row set afterwards.
    pub fn shrink(&mut self, mask: &BooleanArray) -> Result<()> {
        if mask.len() != self.num_rows {
            return Err(TdfError::Type(format!(
                "selection mask has {} entries for a batch of {} rows",
                mask.len(),
                self.num_rows
            )));
        }
        let mut kept = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let filtered = filter(col.array().as_ref(), mask)
                .map_err(|e| TdfError::Execution(format!("filter kernel failed: {e}")))?;
            kept.push(Vector::try_new(filtered)?);
        }
        self.num_rows = if mask.null_count() == 0 {
            mask.true_count()
        } else {
            (0..mask.len())
                .filter(|&i| mask.is_valid(i) && mask.value(i))
                .count()
        };
        self.columns = kept;
        Ok(())
    }

    /// One comma separated line per row.
    pub fn row_strings(&self) -> Result<Vec<String>> {
        let options = FormatOptions::default().with_null("null");
        let formatters = self
            .columns
            .iter()
            .map(|c| ArrayFormatter::try_new(c.array().as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TdfError::Execution(format!("row formatting failed: {e}")))?;
        Ok((0..self.num_rows)
            .map(|row| {
                formatters
                    .iter()
                    .map(|f| f.value(row).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Int64Array, StringArray};
    use arrow_schema::{DataType, Field, Schema};

    use super::*;

    fn batch() -> Batch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        Batch::try_new(
            schema,
            vec![
                Vector::try_new(Arc::new(Int64Array::from(vec![1, 2, 3]))).expect("ids"),
                Vector::try_new(Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])))
                    .expect("names"),
            ],
        )
        .expect("batch")
    }

    #[test]
    fn shrink_keeps_selected_rows_in_order() {
        let mut b = batch();
        b.shrink(&BooleanArray::from(vec![true, false, true]))
            .expect("shrink");
        assert_eq!(b.num_rows(), 2);
        assert_eq!(b.row_strings().expect("rows"), vec!["1, a", "3, c"]);
    }

    #[test]
    fn shrink_treats_null_mask_as_false() {
        let mut b = batch();
        b.shrink(&BooleanArray::from(vec![Some(true), None, Some(false)]))
            .expect("shrink");
        assert_eq!(b.num_rows(), 1);
    }

    #[test]
    fn shrink_rejects_wrong_mask_length() {
        let mut b = batch();
        assert!(b.shrink(&BooleanArray::from(vec![true])).is_err());
        assert_eq!(b.num_rows(), 3);
    }

    #[test]
    fn rows_render_nulls() {
        assert_eq!(batch().row_strings().expect("rows")[1], "2, null");
    }

    #[test]
    fn mismatched_column_lengths_are_rejected() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Int64, false),
        ]));
        let err = Batch::try_new(
            schema,
            vec![
                Vector::try_new(Arc::new(Int64Array::from(vec![1, 2]))).expect("a"),
                Vector::try_new(Arc::new(Int64Array::from(vec![1]))).expect("b"),
            ],
        )
        .expect_err("length mismatch");
        assert!(matches!(err, TdfError::Type(_)));
    }

    #[test]
    fn record_batch_interop_preserves_rows() {
        let rb = batch().to_record_batch().expect("record batch");
        assert_eq!(rb.num_rows(), 3);
        let back = Batch::from_record_batch(&rb).expect("batch");
        assert_eq!(back.num_columns(), 2);
    }
}

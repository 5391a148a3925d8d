#![allow(dead_code)]

use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arrow::array::{ArrayRef, Int64Array};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

pub fn unique_path(prefix: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{}_{nanos}.{ext}", std::process::id()))
}

/// A fixture file removed when the guard is dropped.
pub struct TempParquet(PathBuf);

impl Deref for TempParquet {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for TempParquet {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempParquet {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

pub fn write_parquet(path: &Path, schema: SchemaRef, cols: Vec<ArrayRef>, row_group_rows: usize) {
    let batch = RecordBatch::try_new(schema.clone(), cols).expect("build batch");
    let props = WriterProperties::builder()
        .set_max_row_group_size(row_group_rows)
        .build();
    let file = File::create(path).expect("create parquet");
    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).expect("writer");
    writer.write(&batch).expect("write");
    writer.close().expect("close");
}

pub fn c123_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("c1", DataType::Int64, false),
        Field::new("c2", DataType::Int64, false),
        Field::new("c3", DataType::Int64, false),
    ]))
}

/// Three int64 columns over six rows, two rows per row group.
///
/// | c1  | c2 | c3 |
/// |-----|----|----|
/// | 100 | 1  | 7  |
/// | 200 | 2  | 8  |
/// | 200 | 3  | 8  |
/// | 300 | 4  | 9  |
/// | 200 | 5  | 7  |
/// | 100 | 6  | 9  |
pub fn c123_fixture() -> TempParquet {
    let path = TempParquet(unique_path("tdf_client_c123", "parquet"));
    write_parquet(
        &path,
        c123_schema(),
        vec![
            Arc::new(Int64Array::from(vec![100_i64, 200, 200, 300, 200, 100])),
            Arc::new(Int64Array::from(vec![1_i64, 2, 3, 4, 5, 6])),
            Arc::new(Int64Array::from(vec![7_i64, 8, 8, 9, 7, 9])),
        ],
        2,
    );
    path
}

/// Every row of `batches` as `a, b, ...` strings, sorted.
pub fn sorted_rows(batches: &[RecordBatch]) -> Vec<String> {
    let mut rows = Vec::new();
    for batch in batches {
        let batch = tdf_common::Batch::from_record_batch(batch).expect("batch");
        rows.extend(batch.row_strings().expect("rows"));
    }
    rows.sort();
    rows
}

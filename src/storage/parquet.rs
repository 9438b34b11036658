//! Parquet Storage Format Implementation
//!
//! Tables are written through Arrow with Snappy compression. Narrow Arrow
//! types found in foreign files (Int32, Float32, LargeUtf8, ...) are widened
//! on load to the column types tables use.

use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::error::{StorageError, StorageResult};
use crate::relation::Batch;
use crate::value::{batch_to_record_batch, record_batch_to_batch, ArrowConvertError, Schema};

/// Save a batch to a Parquet file with Snappy compression
pub fn save_parquet<P: AsRef<Path>>(path: P, batch: &Batch) -> StorageResult<()> {
    let path = path.as_ref();
    let record_batch = batch_to_record_batch(batch)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, record_batch.schema(), Some(props))?;
    writer.write(&record_batch)?;
    writer.close()?;

    debug!(path = %path.display(), rows = batch.num_rows(), "parquet saved");
    Ok(())
}

/// Load every row group of a Parquet file into one batch
pub fn load_parquet<P: AsRef<Path>>(path: P) -> StorageResult<Batch> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let arrow_schema = Arc::clone(builder.schema());
    let reader = builder.build()?;

    let mut schema: Option<Schema> = None;
    let mut rows = Vec::new();
    for record_batch in reader {
        let batch = record_batch_to_batch(&record_batch?)?;
        if schema.is_none() {
            schema = Some(batch.schema().clone());
        }
        rows.extend(batch.into_rows());
    }

    let schema = match schema {
        Some(s) => s,
        None => Schema::from_arrow(&arrow_schema).ok_or_else(|| {
            StorageError::Convert(ArrowConvertError::UnsupportedType(format!(
                "{:?}",
                arrow_schema.fields()
            )))
        })?,
    };

    debug!(path = %path.display(), rows = rows.len(), "parquet loaded");
    Ok(Batch::new(schema, rows))
}

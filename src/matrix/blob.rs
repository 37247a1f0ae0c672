//! Parquet encoding of one matrix blob.
//!
//! A blob holds a block of columns of a storage-oriented matrix in a single non-nullable
//! `values` column, in column-major order. The block shape is kept in the Arrow schema
//! metadata under the `rows` and `cols` keys.

use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::sync::Arc;

use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use nalgebra::DMatrix;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::reader::ChunkReader;

use crate::data::table::read;
use crate::error::{Error, Result};

pub const VALUES: &str = "values";

/// Upper bound on the number of values per record batch.
const BATCH_VALUES: usize = 1 << 20;

fn blob_schema(rows: usize, cols: usize) -> SchemaRef {
    let metadata = HashMap::from([
        ("rows".to_string(), rows.to_string()),
        ("cols".to_string(), cols.to_string()),
    ]);
    let fields = vec![Field::new(VALUES, DataType::Float64, false)];
    Arc::new(Schema::new(fields).with_metadata(metadata))
}

/// Writes the `columns` of `matrix` as a blob; returns the payload size in bytes.
pub fn write_blob<W: Write + Send>(
    writer: W,
    matrix: &DMatrix<f64>,
    columns: Range<usize>,
) -> Result<u64> {
    let rows = matrix.nrows();
    let cols = columns.len();
    let schema = blob_schema(rows, cols);
    let mut writer = ArrowWriter::try_new(writer, schema.clone(), None)?;

    let step = (BATCH_VALUES / rows.max(1)).max(1);
    let mut start = columns.start;
    while start < columns.end {
        let n = step.min(columns.end - start);
        let values = Float64Array::from_iter_values(matrix.columns(start, n).iter().copied());
        writer.write(&RecordBatch::try_new(schema.clone(), vec![Arc::new(values)])?)?;
        start += n;
    }
    writer.close()?;
    Ok((rows * cols * std::mem::size_of::<f64>()) as u64)
}

fn shape_entry(schema: &Schema, key: &str) -> Result<usize> {
    schema
        .metadata()
        .get(key)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| Error::ReadColumn(format!("{VALUES}.{key}")))
}

/// Reads a blob back into a matrix.
pub fn read_blob<R: ChunkReader + 'static>(name: &str, reader: R) -> Result<DMatrix<f64>> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
    let rows = shape_entry(builder.schema(), "rows")?;
    let cols = shape_entry(builder.schema(), "cols")?;

    let mut data: Vec<f64> = Vec::with_capacity(rows * cols);
    for batch in builder.build()? {
        let batch = batch?;
        data.extend(read::<Float64Array>(&batch, VALUES)?.values().iter());
    }
    if data.len() != rows * cols {
        return Err(Error::Shape {
            name: name.to_string(),
            expected: (rows, cols),
            found: (data.len(), 1),
        });
    }
    Ok(DMatrix::from_vec(rows, cols, data))
}

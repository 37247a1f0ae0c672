//! The `<name>_mat` entry: a one-row table of list columns.

use std::sync::Arc;

use arrow::array::{
    Array, Float64Array, Float64Builder, ListArray, ListBuilder, UInt8Array, UInt8Builder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::data::model::ModelMetadata;
use crate::data::table::read;
use crate::error::{Error, Result};

const DESCRIPTION: &str = "modelDescription";
const EIGEN_FREQUENCIES: &str = "eigenfrequencies";
const DAMPING: &str = "proportionalDampingVec";

fn list_of(data_type: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", data_type, true)))
}

pub fn metadata_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(DESCRIPTION, list_of(DataType::UInt8), false),
        Field::new(EIGEN_FREQUENCIES, list_of(DataType::Float64), false),
        Field::new(DAMPING, list_of(DataType::Float64), false),
    ]))
}

fn f64_list(values: &[f64]) -> ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    builder.values().append_slice(values);
    builder.append(true);
    builder.finish()
}

impl ModelMetadata {
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut description = ListBuilder::new(UInt8Builder::new());
        description.values().append_slice(&self.description);
        description.append(true);

        Ok(RecordBatch::try_new(
            metadata_schema(),
            vec![
                Arc::new(description.finish()),
                Arc::new(f64_list(&self.eigen_frequencies)),
                Arc::new(f64_list(&self.proportional_damping)),
            ],
        )?)
    }

    /// Decodes the first row of the `<name>_mat` entry.
    pub fn from_record_batches(batches: &[RecordBatch]) -> Result<Self> {
        let batch = batches
            .iter()
            .find(|batch| batch.num_rows() > 0)
            .ok_or_else(|| Error::ReadColumn(DESCRIPTION.to_string()))?;

        let description = first_row::<UInt8Array>(batch, DESCRIPTION)?;
        let eigen_frequencies = first_row::<Float64Array>(batch, EIGEN_FREQUENCIES)?;
        let proportional_damping = first_row::<Float64Array>(batch, DAMPING)?;

        Ok(Self {
            description: description.values().to_vec(),
            eigen_frequencies: eigen_frequencies.values().to_vec(),
            proportional_damping: proportional_damping.values().to_vec(),
        })
    }
}

fn first_row<T>(batch: &RecordBatch, col: &str) -> Result<T>
where
    T: Array + Clone + 'static,
{
    read::<ListArray>(batch, col)?
        .value(0)
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| Error::ReadColumn(col.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_record_batch() {
        let metadata = ModelMetadata {
            description: b"GMT FEM".to_vec(),
            eigen_frequencies: vec![0.0, 1.5, 2.25],
            proportional_damping: vec![0.02; 3],
        };
        let batch = metadata.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.schema(), metadata_schema());
        assert_eq!(ModelMetadata::from_record_batches(&[batch]).unwrap(), metadata);
    }

    #[test]
    fn test_static_model_has_empty_vectors() {
        let metadata = ModelMetadata {
            description: vec![255, 0, 72],
            ..Default::default()
        };
        let batch = metadata.to_record_batch().unwrap();
        let decoded = ModelMetadata::from_record_batches(&[batch]).unwrap();
        assert_eq!(decoded.n_modes(), 0);
        assert_eq!(decoded.description, vec![255, 0, 72]);
    }
}

//! The sealed model archive.
//!
//! Layout of the ZIP container, for a model named `<name>`:
//!
//! ```text
//!  <name>_in.parquet                    flat input table
//!  <name>_out.parquet                   flat output table
//!  <name>_mat.parquet                   description, eigen frequencies, damping
//!  inputs2ModalF.parquet                single blob ...
//!  inputs2ModalF/slice_<i>.parquet      ... or slices 1..k
//!  modalDisp2Outputs[.parquet|/slice_<i>.parquet]
//!  static_gain[.parquet|/slice_<i>.parquet]   optional
//! ```

pub mod metadata;
pub mod reader;
pub mod writer;

use crate::data::table::TableKind;
use crate::matrix::chunk::ChunkPlan;

pub use crate::merge::STATIC_GAIN;

/// Entry name of the inputs to modal forces matrix.
pub const INPUTS_TO_MODAL_FORCES: &str = "inputs2ModalF";
/// Entry name of the modal displacements to outputs matrix.
pub const MODAL_DISP_TO_OUTPUTS: &str = "modalDisp2Outputs";

const EXTENSION: &str = "parquet";

/// `<name>_in` or `<name>_out`.
pub fn table_entry(model_name: &str, kind: TableKind) -> String {
    format!("{model_name}_{}", kind.suffix())
}

/// `<name>_mat`.
pub fn metadata_entry(model_name: &str) -> String {
    format!("{model_name}_mat")
}

/// File name of a single blob entry.
pub fn blob_path(entry: &str) -> String {
    format!("{entry}.{EXTENSION}")
}

/// File name of slice `index` (from 1) of a chunked entry.
pub fn slice_path(entry: &str, index: usize) -> String {
    format!("{entry}/slice_{index}.{EXTENSION}")
}

/// How a matrix entry is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLayout {
    Single,
    Chunked(usize),
}

impl From<ChunkPlan> for StoreLayout {
    fn from(plan: ChunkPlan) -> Self {
        match plan {
            ChunkPlan::Single => StoreLayout::Single,
            ChunkPlan::Sliced { count, .. } => StoreLayout::Chunked(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_names() {
        let name = crate::config::DEFAULT_MODEL_NAME;
        assert_eq!(
            blob_path(&table_entry(name, TableKind::Inputs)),
            "modal_state_space_model_2ndOrder_in.parquet"
        );
        assert_eq!(
            table_entry(name, TableKind::Outputs),
            "modal_state_space_model_2ndOrder_out"
        );
        assert_eq!(metadata_entry(name), "modal_state_space_model_2ndOrder_mat");
        assert_eq!(slice_path(INPUTS_TO_MODAL_FORCES, 3), "inputs2ModalF/slice_3.parquet");
    }
}

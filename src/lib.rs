//! Converts a finite element model into a self-contained archive.
//!
//! The source model (channel groups, modal state space matrices and an optional static gain) is
//! flattened into two Parquet tables, its matrices are transposed and cut into blobs of bounded
//! size, and everything is sealed into one ZIP container that [`ArchiveReader`] reads back.

pub mod archive;
pub mod config;
pub mod data;
pub mod error;
pub mod matrix;
pub mod merge;
pub mod pipeline;
pub mod report;

pub use archive::reader::{ArchiveReader, ModelSummary};
pub use archive::StoreLayout;
pub use config::{ConversionConfig, GroupRename, DEFAULT_BYTE_BUDGET, DEFAULT_MODEL_NAME};
pub use data::table::TableKind;
pub use error::{Error, Result};
pub use merge::MergeOutcome;
pub use pipeline::{convert, convert_model, RunContext};
pub use report::{ConversionReport, Warning};

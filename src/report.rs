use std::fmt;
use std::path::PathBuf;

use crate::archive::StoreLayout;
use crate::data::table::{GroupSummary, TableKind};
use crate::merge::MergeOutcome;

/// A recoverable condition met during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The record had no location; `(0,0,0)` was written instead.
    MissingLocation {
        table: TableKind,
        group: String,
        index: u32,
        cs_label: String,
    },
    /// The configured static reduction artifact does not exist; no gain was merged.
    MissingStaticReduction { path: PathBuf },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingLocation {
                table,
                group,
                index,
                cs_label,
            } => write!(
                f,
                "[{cs_label}] {table} `{group}` #{index}: no location, set to (0,0,0)"
            ),
            Warning::MissingStaticReduction { path } => {
                write!(f, "static reduction model {path:?} not found, merge skipped")
            }
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub archive: PathBuf,
    pub inputs: Vec<GroupSummary>,
    pub outputs: Vec<GroupSummary>,
    /// Matrix entries in archive order.
    pub stores: Vec<(String, StoreLayout)>,
    pub merge: MergeOutcome,
    pub warnings: Vec<Warning>,
}

impl ConversionReport {
    pub fn store(&self, name: &str) -> Option<StoreLayout> {
        self.stores
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, layout)| *layout)
    }

    pub fn n_inputs(&self) -> usize {
        self.inputs.iter().map(|g| g.size).sum()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.iter().map(|g| g.size).sum()
    }
}

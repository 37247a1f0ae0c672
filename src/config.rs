//! Conversion settings.
//!
//! A [`ConversionConfig`] is built once by the caller, either in code or from a JSON file, and
//! handed to [`crate::convert`]. Nothing in the pipeline reads environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-blob byte budget: no stored matrix blob may hold more than this many payload bytes.
pub const DEFAULT_BYTE_BUDGET: u64 = 1 << 31;

/// Name prefix of the table and metadata entries.
pub const DEFAULT_MODEL_NAME: &str = "modal_state_space_model_2ndOrder";

/// An output group to rename before flattening.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupRename {
    pub from: String,
    pub to: String,
}

impl GroupRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Settings for one conversion run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConversionConfig {
    /// Prefix of the `<name>_in`, `<name>_out` and `<name>_mat` entries.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Source model document.
    pub source: PathBuf,

    /// Optional static reduction artifact. A configured path that does not exist is skipped.
    #[serde(default)]
    pub static_source: Option<PathBuf>,

    /// Destination of the sealed archive.
    pub archive: PathBuf,

    /// Maximum payload bytes per matrix blob.
    #[serde(default = "default_byte_budget")]
    pub byte_budget: u64,

    /// Renames applied to the output table only.
    #[serde(default = "default_output_group_renames")]
    pub output_group_renames: Vec<GroupRename>,

    /// Parent directory of the staging directory; the system temp directory when unset.
    #[serde(default)]
    pub staging_root: Option<PathBuf>,
}

impl ConversionConfig {
    /// Creates a configuration with default settings.
    pub fn new(source: impl Into<PathBuf>, archive: impl Into<PathBuf>) -> Self {
        Self {
            model_name: default_model_name(),
            source: source.into(),
            static_source: None,
            archive: archive.into(),
            byte_budget: default_byte_budget(),
            output_group_renames: default_output_group_renames(),
            staging_root: None,
        }
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_static_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_source = Some(path.into());
        self
    }

    pub fn with_byte_budget(mut self, byte_budget: u64) -> Self {
        self.byte_budget = byte_budget;
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_output_group_renames(mut self, renames: Vec<GroupRename>) -> Self {
        self.output_group_renames = renames;
        self
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_byte_budget() -> u64 {
    DEFAULT_BYTE_BUDGET
}

/// The 6-axis local output group shares its name with the local-frame input group.
fn default_output_group_renames() -> Vec<GroupRename> {
    vec![GroupRename::new("OSS_M1_lcl", "OSS_M1_lcl_6D")]
}

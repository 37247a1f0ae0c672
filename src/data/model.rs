use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::matrix::DenseMatrix;

// ---------------------------------------------------------------------------
// CodedText – text stored either as a string or as character codes
// ---------------------------------------------------------------------------

/// Vendor text fields come either as plain strings or as arrays of character codes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CodedText {
    Text(String),
    Codes(Vec<f64>),
}

impl Default for CodedText {
    fn default() -> Self {
        CodedText::Text(String::new())
    }
}

/// Clamps a character code into a byte; out-of-range codes saturate instead of wrapping.
pub fn saturate(code: f64) -> u8 {
    if code.is_nan() {
        0
    } else {
        code.clamp(0.0, 255.0) as u8
    }
}

impl CodedText {
    /// Raw bytes of the text, with character codes saturated into `[0,255]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            CodedText::Text(s) => s.as_bytes().to_vec(),
            CodedText::Codes(codes) => codes.iter().map(|&c| saturate(c)).collect(),
        }
    }

    /// Decoded text; invalid UTF-8 sequences are replaced.
    pub fn decode(&self) -> String {
        match self {
            CodedText::Text(s) => s.clone(),
            CodedText::Codes(_) => String::from_utf8_lossy(&self.to_bytes()).into_owned(),
        }
    }
}

impl fmt::Display for CodedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.decode())
    }
}

// ---------------------------------------------------------------------------
// ChannelRecord – one input or output channel of a group
// ---------------------------------------------------------------------------

/// Channel properties; only `location` and `csLabel` reach the flat tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub location: Option<Vec<f64>>,
    #[serde(rename = "csLabel", default)]
    pub cs_label: Option<CodedText>,
    #[serde(rename = "nodeID", default)]
    pub node_id: Option<Vec<u32>>,
    #[serde(rename = "csNumber", default)]
    pub cs_number: Option<Vec<u32>>,
    #[serde(default)]
    pub component: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelRecord {
    #[serde(default)]
    pub types: CodedText,
    /// Excitation identifiers, inputs only.
    #[serde(rename = "exciteIDs", default)]
    pub excite_ids: Option<Vec<u32>>,
    #[serde(default)]
    pub descriptions: CodedText,
    #[serde(default)]
    pub indices: Vec<u32>,
    #[serde(default)]
    pub properties: Properties,
}

impl ChannelRecord {
    /// The channel index, i.e. the first of `indices`.
    pub fn index(&self) -> Option<u32> {
        self.indices.first().copied()
    }

    /// The `[x, y, z]` location, if the source provides exactly three values.
    pub fn location(&self) -> Option<[f64; 3]> {
        match self.properties.location.as_deref() {
            Some(&[x, y, z]) => Some([x, y, z]),
            _ => None,
        }
    }

    /// The coordinate system label, empty when the source has none.
    pub fn cs_label(&self) -> String {
        self.properties
            .cs_label
            .as_ref()
            .map(|label| label.decode())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ChannelGroup – named, ordered list of records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ChannelGroup {
    pub name: String,
    pub records: Vec<ChannelRecord>,
}

impl ChannelGroup {
    pub fn new(name: impl Into<String>, records: Vec<ChannelRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    /// Number of records in the group.
    pub fn size(&self) -> usize {
        self.records.len()
    }
}

/// All the groups of either the inputs or the outputs, in source order.
pub type ChannelSet = Vec<ChannelGroup>;

// ---------------------------------------------------------------------------
// Model – the whole source model
// ---------------------------------------------------------------------------

/// Modal (second order) state space matrices and their scalars.
#[derive(Debug, Clone)]
pub struct ModalDynamics {
    /// Eigen frequencies `[Hz]`.
    pub eigen_frequencies: Vec<f64>,
    pub proportional_damping: Vec<f64>,
    /// `[n_modes, n_inputs]`
    pub inputs_to_modal_forces: DenseMatrix,
    /// `[n_outputs, n_modes]`
    pub modal_disp_to_outputs: DenseMatrix,
}

impl ModalDynamics {
    pub fn n_modes(&self) -> usize {
        self.eigen_frequencies.len()
    }
}

/// Which of the two gain matrix representations a model carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainVariant {
    MountControlled,
    Plain,
}

impl fmt::Display for GainVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GainVariant::MountControlled => write!(f, "mount controlled"),
            GainVariant::Plain => write!(f, "plain"),
        }
    }
}

/// Static gain `[n_outputs, n_inputs]` as resolved by the loader.
#[derive(Debug, Clone, Default)]
pub enum GainSource {
    MountControlled(DenseMatrix),
    Plain(DenseMatrix),
    #[default]
    Absent,
}

impl GainSource {
    pub fn variant(&self) -> Option<GainVariant> {
        match self {
            GainSource::MountControlled(_) => Some(GainVariant::MountControlled),
            GainSource::Plain(_) => Some(GainVariant::Plain),
            GainSource::Absent => None,
        }
    }

    pub fn into_matrix(self) -> Option<(GainVariant, DenseMatrix)> {
        match self {
            GainSource::MountControlled(m) => Some((GainVariant::MountControlled, m)),
            GainSource::Plain(m) => Some((GainVariant::Plain, m)),
            GainSource::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, GainSource::Absent)
    }
}

/// The model to convert, as produced by the loader.
#[derive(Debug, Clone, Default)]
pub struct SourceModel {
    pub description: CodedText,
    pub inputs: Option<ChannelSet>,
    pub outputs: Option<ChannelSet>,
    pub dynamics: Option<ModalDynamics>,
    pub gain: GainSource,
}

/// The secondary artifact holding the static reduction gain.
#[derive(Debug, Clone)]
pub struct StaticReduction {
    pub source: PathBuf,
    pub gain: GainSource,
}

/// Scalars stored in the `<name>_mat` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMetadata {
    /// Description bytes, saturated into `[0,255]`.
    pub description: Vec<u8>,
    pub eigen_frequencies: Vec<f64>,
    pub proportional_damping: Vec<f64>,
}

impl ModelMetadata {
    pub fn description_text(&self) -> String {
        String::from_utf8_lossy(&self.description).into_owned()
    }

    pub fn n_modes(&self) -> usize {
        self.eigen_frequencies.len()
    }
}

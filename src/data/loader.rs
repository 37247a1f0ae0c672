use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::model::{
    ChannelGroup, ChannelRecord, ChannelSet, CodedText, GainSource, ModalDynamics, SourceModel,
    StaticReduction,
};
use crate::error::{Error, Result};
use crate::matrix::DenseMatrix;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the source model from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json` – the vendor model document
pub fn load_source(path: &Path) -> Result<SourceModel> {
    log::info!("loading source model from {path:?}");
    read_document(path)?.into_model()
}

/// Load the static reduction artifact.
///
/// A missing file is not an error: the caller gets `None` and skips the merge. An existing
/// artifact without a gain matrix is fatal.
pub fn load_static_reduction(path: &Path) -> Result<Option<StaticReduction>> {
    if !path.try_exists()? {
        log::warn!("static reduction model {path:?} not found, skipping merge");
        return Ok(None);
    }
    log::info!("loading static reduction model from {path:?}");
    let gain = read_document(path)?.gain()?;
    if gain.is_absent() {
        return Err(Error::StaticGain(path.to_path_buf()));
    }
    Ok(Some(StaticReduction {
        source: path.to_path_buf(),
        gain,
    }))
}

fn read_document(path: &Path) -> Result<SourceDocument> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => {
            let bytes = std::fs::read(path)?;
            Ok(serde_json::from_slice(&bytes)?)
        }
        _ => Err(Error::UnsupportedSource(path.to_path_buf())),
    }
}

// ---------------------------------------------------------------------------
// JSON document
// ---------------------------------------------------------------------------

/// A channel set as a list of `{ "<group>": [records] }` objects.
///
/// Keys of an object keep their document order (`preserve_order`), so an element holding several
/// groups is flattened in the order the source wrote them.
type GroupList = Vec<Map<String, Value>>;

/// Row-major matrix as exported from the vendor model.
#[derive(Debug, Deserialize)]
struct MatrixDocument {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl MatrixDocument {
    fn into_matrix(self, name: &str) -> Result<DenseMatrix> {
        DenseMatrix::from_row_major(name, self.rows, self.cols, &self.data)
    }
}

/// Expected JSON layout:
///
/// ```json
/// {
///   "modelDescription": "..." | [77, 111, ...],
///   "inputs":  [ { "OSS_M1_lcl": [ { "descriptions": ..., "indices": [1], "properties": {...} } ] } ],
///   "outputs": [ ... ],
///   "eigenfrequencies": [...],
///   "proportionalDampingVec": [...],
///   "inputs2ModalF":     { "rows": n_modes,   "cols": n_inputs, "data": [...] },
///   "modalDisp2Outputs": { "rows": n_outputs, "cols": n_modes,  "data": [...] },
///   "gainMatrix":                { "rows": n_outputs, "cols": n_inputs, "data": [...] },
///   "gainMatrixMountControlled": { "rows": n_outputs, "cols": n_inputs, "data": [...] }
/// }
/// ```
#[derive(Debug, Deserialize)]
struct SourceDocument {
    #[serde(rename = "modelDescription", default)]
    model_description: CodedText,
    #[serde(default)]
    inputs: Option<GroupList>,
    #[serde(default)]
    outputs: Option<GroupList>,
    #[serde(default)]
    eigenfrequencies: Option<Vec<f64>>,
    #[serde(rename = "proportionalDampingVec", default)]
    proportional_damping_vec: Option<Vec<f64>>,
    #[serde(rename = "inputs2ModalF", default)]
    inputs_to_modal_forces: Option<MatrixDocument>,
    #[serde(rename = "modalDisp2Outputs", default)]
    modal_disp_to_outputs: Option<MatrixDocument>,
    #[serde(rename = "gainMatrix", default)]
    gain_matrix: Option<MatrixDocument>,
    #[serde(rename = "gainMatrixMountControlled", default)]
    gain_matrix_mount_controlled: Option<MatrixDocument>,
}

impl SourceDocument {
    fn into_model(mut self) -> Result<SourceModel> {
        let gain = self.gain()?;
        let dynamics = self.dynamics()?;
        let inputs = self
            .inputs
            .take()
            .map(|groups| channel_set("inputs", groups))
            .transpose()?;
        let outputs = self
            .outputs
            .take()
            .map(|groups| channel_set("outputs", groups))
            .transpose()?;
        Ok(SourceModel {
            description: self.model_description,
            inputs,
            outputs,
            dynamics,
            gain,
        })
    }

    /// The mount controlled gain always wins over the plain one.
    fn gain(&mut self) -> Result<GainSource> {
        let mount_controlled = self.gain_matrix_mount_controlled.take();
        let plain = self.gain_matrix.take();
        Ok(match (mount_controlled, plain) {
            (Some(m), plain) => {
                if plain.is_some() {
                    log::info!("both gain matrices found, using the mount controlled one");
                }
                GainSource::MountControlled(m.into_matrix("gainMatrixMountControlled")?)
            }
            (None, Some(m)) => GainSource::Plain(m.into_matrix("gainMatrix")?),
            (None, None) => GainSource::Absent,
        })
    }

    fn dynamics(&mut self) -> Result<Option<ModalDynamics>> {
        match (
            self.eigenfrequencies.take(),
            self.proportional_damping_vec.take(),
            self.inputs_to_modal_forces.take(),
            self.modal_disp_to_outputs.take(),
        ) {
            (Some(eigen_frequencies), Some(proportional_damping), Some(b), Some(c)) => {
                Ok(Some(ModalDynamics {
                    eigen_frequencies,
                    proportional_damping,
                    inputs_to_modal_forces: b.into_matrix("inputs2ModalF")?,
                    modal_disp_to_outputs: c.into_matrix("modalDisp2Outputs")?,
                }))
            }
            (None, None, None, None) => Ok(None),
            _ => {
                log::warn!("incomplete modal state space matrices, ignoring them");
                Ok(None)
            }
        }
    }
}

fn channel_set(table: &'static str, groups: GroupList) -> Result<ChannelSet> {
    let mut seen = HashSet::new();
    let mut set = ChannelSet::with_capacity(groups.len());
    for (name, records) in groups.into_iter().flatten() {
        if !seen.insert(name.clone()) {
            return Err(Error::DuplicateGroup { table, group: name });
        }
        let records: Vec<ChannelRecord> = serde_json::from_value(records)?;
        log::debug!("{table} group {name}: {} records", records.len());
        set.push(ChannelGroup::new(name, records));
    }
    Ok(set)
}

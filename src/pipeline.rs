//! The conversion run: source model in, sealed archive out.
//!
//! ```text
//!  load → flatten → transpose + plan → merge → model check → assemble → seal
//! ```
//!
//! Every stage runs to completion before the next one starts. Nothing is written at the
//! archive destination unless all of them succeed.

use crate::archive::writer::Assembler;
use crate::archive::{INPUTS_TO_MODAL_FORCES, MODAL_DISP_TO_OUTPUTS};
use crate::config::ConversionConfig;
use crate::data::loader;
use crate::data::model::{ModalDynamics, ModelMetadata, SourceModel, StaticReduction};
use crate::data::table::{flatten, TableKind};
use crate::error::{Error, Result};
use crate::matrix::{check_shape, MatrixStore};
use crate::merge::merge_static_gain;
use crate::report::{ConversionReport, Warning};

/// State threaded through the stages of one run.
#[derive(Debug)]
pub struct RunContext {
    pub config: ConversionConfig,
    pub warnings: Vec<Warning>,
}

/// Loads the configured source files and converts them.
pub fn convert(config: ConversionConfig) -> Result<ConversionReport> {
    let source = loader::load_source(&config.source)?;
    let mut context = RunContext::new(config);
    let static_reduction = context.load_static_reduction()?;
    context.run(source, static_reduction)
}

/// Converts an already loaded model.
pub fn convert_model(
    config: ConversionConfig,
    source: SourceModel,
    static_reduction: Option<StaticReduction>,
) -> Result<ConversionReport> {
    RunContext::new(config).run(source, static_reduction)
}

impl RunContext {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            warnings: Vec::new(),
        }
    }

    /// Loads the static reduction artifact, if one is configured and exists.
    pub fn load_static_reduction(&mut self) -> Result<Option<StaticReduction>> {
        let Some(path) = self.config.static_source.clone() else {
            return Ok(None);
        };
        let reduction = loader::load_static_reduction(&path)?;
        if reduction.is_none() {
            self.warnings.push(Warning::MissingStaticReduction { path });
        }
        Ok(reduction)
    }

    /// Transposes and plans the modal matrices against the flat table sizes.
    fn modal_stores(
        &self,
        dynamics: ModalDynamics,
        io: (usize, usize),
    ) -> Result<[MatrixStore; 2]> {
        let (n_outputs, n_inputs) = io;
        let n_modes = dynamics.n_modes();
        check_shape(
            "proportionalDampingVec",
            (dynamics.proportional_damping.len(), 1),
            (n_modes, 1),
        )?;
        check_shape(
            INPUTS_TO_MODAL_FORCES,
            dynamics.inputs_to_modal_forces.shape(),
            (n_modes, n_inputs),
        )?;
        check_shape(
            MODAL_DISP_TO_OUTPUTS,
            dynamics.modal_disp_to_outputs.shape(),
            (n_outputs, n_modes),
        )?;
        let budget = self.config.byte_budget;
        Ok([
            MatrixStore::prepare(INPUTS_TO_MODAL_FORCES, dynamics.inputs_to_modal_forces, budget)?,
            MatrixStore::prepare(MODAL_DISP_TO_OUTPUTS, dynamics.modal_disp_to_outputs, budget)?,
        ])
    }

    /// Runs every stage after loading.
    pub fn run(
        mut self,
        source: SourceModel,
        static_reduction: Option<StaticReduction>,
    ) -> Result<ConversionReport> {
        let inputs = source.inputs.ok_or(Error::MissingTable("inputs"))?;
        let outputs = source.outputs.ok_or(Error::MissingTable("outputs"))?;

        let renames = &self.config.output_group_renames;
        let inputs = flatten(TableKind::Inputs, &inputs, renames, &mut self.warnings)?;
        let outputs = flatten(TableKind::Outputs, &outputs, renames, &mut self.warnings)?;
        let io = (outputs.len(), inputs.len());

        let mut metadata = ModelMetadata {
            description: source.description.to_bytes(),
            ..Default::default()
        };
        let mut stores = Vec::with_capacity(3);
        if let Some(dynamics) = source.dynamics {
            log::info!("modal model with {} modes", dynamics.n_modes());
            metadata.eigen_frequencies = dynamics.eigen_frequencies.clone();
            metadata.proportional_damping = dynamics.proportional_damping.clone();
            stores.extend(self.modal_stores(dynamics, io)?);
        }

        let (merge, static_gain) =
            merge_static_gain(source.gain, static_reduction, io, self.config.byte_budget)?;
        let has_dynamics = !stores.is_empty();
        stores.extend(static_gain);
        if stores.is_empty() {
            return Err(Error::NoModel);
        }
        if !has_dynamics {
            log::info!("static reduction model, no modal matrices");
        }

        let mut assembler =
            Assembler::new(&self.config.model_name, self.config.staging_root.as_deref())?;
        assembler.stage_table(&inputs)?;
        assembler.stage_table(&outputs)?;
        assembler.stage_metadata(&metadata)?;
        let mut layouts = Vec::with_capacity(stores.len());
        for store in &stores {
            layouts.push((store.name.clone(), assembler.stage_matrix(store)?));
        }
        let archive = assembler.seal(&self.config.archive)?;

        if !self.warnings.is_empty() {
            log::warn!("conversion finished with {} warnings", self.warnings.len());
        }
        Ok(ConversionReport {
            archive,
            inputs: inputs.group_summaries(),
            outputs: outputs.group_summaries(),
            stores: layouts,
            merge,
            warnings: self.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{ChannelGroup, ChannelRecord, GainSource};
    use crate::matrix::DenseMatrix;
    use tempfile::TempDir;

    fn channels(name: &str, n: u32) -> Vec<ChannelGroup> {
        let records = (1..=n)
            .map(|i| ChannelRecord {
                indices: vec![i],
                ..Default::default()
            })
            .collect();
        vec![ChannelGroup::new(name, records)]
    }

    fn config(dir: &TempDir) -> ConversionConfig {
        ConversionConfig::new(dir.path().join("model.json"), dir.path().join("model.zip"))
            .with_staging_root(dir.path())
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let dir = TempDir::new().unwrap();
        let source = SourceModel {
            inputs: Some(channels("in", 1)),
            ..Default::default()
        };
        assert!(matches!(
            convert_model(config(&dir), source, None),
            Err(Error::MissingTable("outputs"))
        ));
    }

    #[test]
    fn test_no_model_leaves_no_archive() {
        let dir = TempDir::new().unwrap();
        let source = SourceModel {
            inputs: Some(channels("in", 2)),
            outputs: Some(channels("out", 3)),
            ..Default::default()
        };
        let config = config(&dir);
        let archive = config.archive.clone();
        assert!(matches!(convert_model(config, source, None), Err(Error::NoModel)));
        assert!(!archive.exists());
    }

    #[test]
    fn test_modal_matrices_must_match_tables() {
        let dir = TempDir::new().unwrap();
        let dynamics = ModalDynamics {
            eigen_frequencies: vec![1.0],
            proportional_damping: vec![0.02],
            inputs_to_modal_forces: DenseMatrix::from_row_major("b", 1, 3, &[1.0; 3]).unwrap(),
            modal_disp_to_outputs: DenseMatrix::from_row_major("c", 3, 1, &[1.0; 3]).unwrap(),
        };
        let source = SourceModel {
            inputs: Some(channels("in", 2)),
            outputs: Some(channels("out", 3)),
            dynamics: Some(dynamics),
            ..Default::default()
        };
        assert!(matches!(
            convert_model(config(&dir), source, None),
            Err(Error::Shape { name, expected: (1, 2), .. }) if name == INPUTS_TO_MODAL_FORCES
        ));
    }

    #[test]
    fn test_damping_length_must_match_modes() {
        let dir = TempDir::new().unwrap();
        let dynamics = ModalDynamics {
            eigen_frequencies: vec![1.0, 2.0],
            proportional_damping: vec![0.02],
            inputs_to_modal_forces: DenseMatrix::from_row_major("b", 2, 1, &[1.0; 2]).unwrap(),
            modal_disp_to_outputs: DenseMatrix::from_row_major("c", 1, 2, &[1.0; 2]).unwrap(),
        };
        let source = SourceModel {
            inputs: Some(channels("in", 1)),
            outputs: Some(channels("out", 1)),
            dynamics: Some(dynamics),
            ..Default::default()
        };
        assert!(matches!(
            convert_model(config(&dir), source, None),
            Err(Error::Shape { name, expected: (2, 1), found: (1, 1) })
                if name == "proportionalDampingVec"
        ));
    }

    #[test]
    fn test_missing_static_artifact_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir).with_static_source(dir.path().join("absent.json"));
        let mut context = RunContext::new(config);
        assert!(context.load_static_reduction().unwrap().is_none());
        assert!(matches!(
            context.warnings.as_slice(),
            [Warning::MissingStaticReduction { .. }]
        ));

        let source = SourceModel {
            inputs: Some(channels("in", 1)),
            outputs: Some(channels("out", 1)),
            gain: GainSource::Plain(DenseMatrix::from_row_major("g", 1, 1, &[4.0]).unwrap()),
            ..Default::default()
        };
        let report = context.run(source, None).unwrap();
        assert!(report.archive.exists());
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::MissingStaticReduction { .. })));
    }
}

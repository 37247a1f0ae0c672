//! End-to-end conversion tests: JSON source files in, archive out, archive read back.

use std::path::{Path, PathBuf};

use anyhow::Result;
use fem_archive::archive::{INPUTS_TO_MODAL_FORCES, MODAL_DISP_TO_OUTPUTS, STATIC_GAIN};
use fem_archive::{
    convert, ArchiveReader, ConversionConfig, Error, MergeOutcome, StoreLayout, TableKind,
    Warning, DEFAULT_MODEL_NAME,
};
use nalgebra::DMatrix;
use serde_json::{json, Value};
use tempfile::TempDir;

const N_MODES: usize = 6;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn records(first: u32, n: u32, cs_label: &str, located: bool) -> Value {
    let records: Vec<Value> = (first..first + n)
        .map(|i| {
            let mut properties = json!({ "csLabel": cs_label });
            if located {
                properties["location"] = json!([i as f64, 2.0 * i as f64, -1.0]);
            }
            json!({
                "descriptions": format!("channel {i}"),
                "indices": [i],
                "properties": properties,
            })
        })
        .collect();
    Value::Array(records)
}

/// 5 inputs in 2 groups, 7 outputs in 2 groups; the MC group has no locations.
fn channels() -> (Value, Value) {
    let inputs = json!([
        { "OSS_M1_lcl": records(1, 3, "OSS", true) },
        { "MC_M2_lcl_force_F": records(4, 2, "MC", false) },
    ]);
    let outputs = json!([
        { "OSS_M1_lcl": records(1, 4, "OSS", true) },
        { "OSS_Hardpoint_D": records(5, 3, "OSS", true) },
    ]);
    (inputs, outputs)
}

fn sequence(rows: usize, cols: usize, offset: f64) -> Vec<f64> {
    (0..rows * cols).map(|i| offset + i as f64).collect()
}

fn matrix(rows: usize, cols: usize, offset: f64) -> Value {
    json!({ "rows": rows, "cols": cols, "data": sequence(rows, cols, offset) })
}

/// The storage orientation of a row-major `[rows, cols]` matrix.
fn stored(rows: usize, cols: usize, offset: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(rows, cols, &sequence(rows, cols, offset)).transpose()
}

fn modal_model() -> Value {
    let (inputs, outputs) = channels();
    json!({
        "modelDescription": [71, 77, 84, 300],
        "inputs": inputs,
        "outputs": outputs,
        "eigenfrequencies": [0.0, 0.0, 1.5, 2.5, 3.5, 4.5],
        "proportionalDampingVec": [0.02, 0.02, 0.02, 0.02, 0.02, 0.05],
        "inputs2ModalF": matrix(N_MODES, 5, 0.0),
        "modalDisp2Outputs": matrix(7, N_MODES, 100.0),
    })
}

fn write(dir: &Path, name: &str, value: &Value) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec(value)?)?;
    Ok(path)
}

struct Fixture {
    dir: TempDir,
    config: ConversionConfig,
}

impl Fixture {
    fn new(model: &Value) -> Result<Self> {
        init();
        let dir = TempDir::new()?;
        let source = write(dir.path(), "model.json", model)?;
        let staging = dir.path().join("staging");
        std::fs::create_dir(&staging)?;
        let config = ConversionConfig::new(source, dir.path().join("model.zip"))
            .with_staging_root(staging)
            .with_byte_budget(80);
        Ok(Self { dir, config })
    }

    fn with_static(mut self, model: &Value) -> Result<Self> {
        let path = write(self.dir.path(), "static_reduction_model.json", model)?;
        self.config = self.config.with_static_source(path);
        Ok(self)
    }

    fn staging_is_empty(&self) -> Result<bool> {
        let staging = self.dir.path().join("staging");
        Ok(std::fs::read_dir(staging)?.next().is_none())
    }

    fn reader(&self) -> Result<ArchiveReader> {
        Ok(ArchiveReader::open(&self.config.archive, DEFAULT_MODEL_NAME)?)
    }
}

#[test]
fn modal_model_round_trips_through_archive() -> Result<()> {
    let fixture = Fixture::new(&modal_model())?;
    let report = convert(fixture.config.clone())?;

    assert_eq!(report.archive, fixture.config.archive);
    assert_eq!(report.n_inputs(), 5);
    assert_eq!(report.n_outputs(), 7);
    assert_eq!(report.merge, MergeOutcome::Skipped);
    // stored as [5x6] and [6x7] under an 80 bytes budget
    assert_eq!(report.store(INPUTS_TO_MODAL_FORCES), Some(StoreLayout::Chunked(4)));
    assert_eq!(report.store(MODAL_DISP_TO_OUTPUTS), Some(StoreLayout::Chunked(8)));
    assert_eq!(report.store(STATIC_GAIN), None);
    assert!(fixture.staging_is_empty()?);

    let mut reader = fixture.reader()?;
    assert_eq!(reader.matrix(INPUTS_TO_MODAL_FORCES)?, stored(N_MODES, 5, 0.0));
    assert_eq!(reader.matrix(MODAL_DISP_TO_OUTPUTS)?, stored(7, N_MODES, 100.0));
    assert_eq!(reader.store_layout(MODAL_DISP_TO_OUTPUTS)?, StoreLayout::Chunked(8));
    assert!(reader.static_gain()?.is_none());

    let metadata = reader.metadata()?;
    assert_eq!(metadata.description, vec![71, 77, 84, 255]);
    assert_eq!(metadata.n_modes(), N_MODES);
    assert_eq!(metadata.proportional_damping[5], 0.05);

    let inputs = reader.inputs()?;
    assert_eq!(inputs.len(), 5);
    assert_eq!(inputs.rows[1].description, "channel 2");
    assert_eq!((inputs.rows[2].x, inputs.rows[2].y, inputs.rows[2].z), (3.0, 6.0, -1.0));
    assert_eq!((inputs.rows[4].x, inputs.rows[4].y, inputs.rows[4].z), (0.0, 0.0, 0.0));
    assert_eq!(inputs.rows[4].cs_label, "MC");
    Ok(())
}

#[test]
fn missing_locations_are_reported() -> Result<()> {
    let fixture = Fixture::new(&modal_model())?;
    let report = convert(fixture.config.clone())?;

    let missing: Vec<_> = report
        .warnings
        .iter()
        .filter_map(|w| match w {
            Warning::MissingLocation { table, group, index, .. } => {
                Some((*table, group.as_str(), *index))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        missing,
        [
            (TableKind::Inputs, "MC_M2_lcl_force_F", 4),
            (TableKind::Inputs, "MC_M2_lcl_force_F", 5)
        ]
    );
    Ok(())
}

#[test]
fn output_group_is_renamed_in_archive() -> Result<()> {
    let fixture = Fixture::new(&modal_model())?;
    let report = convert(fixture.config.clone())?;
    assert_eq!(report.outputs[0].name, "OSS_M1_lcl_6D");
    assert_eq!(report.outputs[0].size, 4);

    let mut reader = fixture.reader()?;
    assert_eq!(
        reader.group_names(TableKind::Outputs)?,
        ["OSS_M1_lcl_6D", "OSS_Hardpoint_D"]
    );
    assert_eq!(
        reader.group_names(TableKind::Inputs)?,
        ["OSS_M1_lcl", "MC_M2_lcl_force_F"]
    );
    Ok(())
}

#[test]
fn mount_controlled_static_gain_is_merged() -> Result<()> {
    let fixture = Fixture::new(&modal_model())?.with_static(&json!({
        "gainMatrix": matrix(7, 5, -50.0),
        "gainMatrixMountControlled": matrix(7, 5, 50.0),
    }))?;
    let report = convert(fixture.config.clone())?;
    assert_eq!(report.merge, MergeOutcome::MountControlled);
    assert_eq!(report.store(STATIC_GAIN), Some(StoreLayout::Chunked(4)));

    let mut reader = fixture.reader()?;
    assert_eq!(reader.static_gain()?, Some(stored(7, 5, 50.0)));
    assert!(reader.summary()?.static_gain);
    Ok(())
}

#[test]
fn missing_static_artifact_skips_merge() -> Result<()> {
    let mut fixture = Fixture::new(&modal_model())?;
    fixture.config = fixture
        .config
        .clone()
        .with_static_source(fixture.dir.path().join("static_reduction_model.json"));
    let report = convert(fixture.config.clone())?;

    assert_eq!(report.merge, MergeOutcome::Skipped);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::MissingStaticReduction { .. })));
    assert!(fixture.reader()?.static_gain()?.is_none());
    Ok(())
}

#[test]
fn static_reduction_model_has_no_modal_matrices() -> Result<()> {
    let (inputs, outputs) = channels();
    let fixture = Fixture::new(&json!({
        "modelDescription": "static",
        "inputs": inputs,
        "outputs": outputs,
        "gainMatrix": matrix(7, 5, 1.0),
    }))?;
    let report = convert(fixture.config.clone())?;
    assert_eq!(report.merge, MergeOutcome::Plain);
    assert_eq!(report.stores.len(), 1);

    let mut reader = fixture.reader()?;
    assert!(matches!(
        reader.store_layout(INPUTS_TO_MODAL_FORCES),
        Err(Error::MissingEntry(_))
    ));
    assert_eq!(reader.metadata()?.n_modes(), 0);
    assert_eq!(reader.static_gain()?, Some(stored(7, 5, 1.0)));
    let summary = reader.summary()?.to_string();
    assert!(summary.contains("# of modes: 0"));
    assert!(!summary.contains("eigen frequencies"));
    Ok(())
}

#[test]
fn model_without_dynamics_or_gain_is_fatal() -> Result<()> {
    let (inputs, outputs) = channels();
    let fixture = Fixture::new(&json!({ "inputs": inputs, "outputs": outputs }))?;
    let result = convert(fixture.config.clone());

    assert!(matches!(result, Err(Error::NoModel)));
    assert!(!fixture.config.archive.exists());
    assert!(fixture.staging_is_empty()?);
    Ok(())
}

#[test]
fn unsatisfiable_budget_is_fatal() -> Result<()> {
    let mut fixture = Fixture::new(&modal_model())?;
    // one stored column of modalDisp2Outputs is 6 * 8 = 48 bytes
    fixture.config.byte_budget = 40;
    let result = convert(fixture.config.clone());

    assert!(matches!(result, Err(Error::Budget { budget: 40, .. })));
    assert!(!fixture.config.archive.exists());
    assert!(fixture.staging_is_empty()?);
    Ok(())
}

#[test]
fn configuration_is_read_from_json() -> Result<()> {
    let fixture = Fixture::new(&modal_model())?;
    let path = write(
        fixture.dir.path(),
        "config.json",
        &json!({
            "source": fixture.config.source,
            "archive": fixture.dir.path().join("renamed.zip"),
            "model_name": "fem",
            "output_group_renames": [],
        }),
    )?;
    let config = ConversionConfig::from_json_file(&path)?;
    assert_eq!(config.byte_budget, fem_archive::DEFAULT_BYTE_BUDGET);

    let report = convert(config)?;
    assert_eq!(report.store(INPUTS_TO_MODAL_FORCES), Some(StoreLayout::Single));
    let mut reader = ArchiveReader::open(&report.archive, "fem")?;
    assert_eq!(reader.group_names(TableKind::Outputs)?[0], "OSS_M1_lcl");
    assert!(matches!(
        ArchiveReader::open(&report.archive, DEFAULT_MODEL_NAME),
        Err(Error::MissingEntry(_))
    ));
    Ok(())
}

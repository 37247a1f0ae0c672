use std::path::Path;

use anyhow::Context;
use arrow::util::pretty::pretty_format_batches;
use fem_archive::{ArchiveReader, ConversionConfig, TableKind};
use serde_json::{json, Value};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[lo, hi)`
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    fn matrix(&mut self, rows: usize, cols: usize) -> Value {
        let data: Vec<f64> = (0..rows * cols).map(|_| self.uniform(-1.0, 1.0)).collect();
        json!({ "rows": rows, "cols": cols, "data": data })
    }
}

/// `(group, size, cs label)`; records of groups with an empty label have no location.
const INPUTS: [(&str, usize, &str); 3] = [
    ("OSS_M1_lcl", 42, "OSS"),
    ("OSS_Harpoint_delta_F", 42, "OSS"),
    ("MC_M2_S1_VC_delta_F", 14, ""),
];
const OUTPUTS: [(&str, usize, &str); 4] = [
    ("OSS_M1_lcl", 42, "OSS"),
    ("OSS_Hardpoint_D", 84, "OSS"),
    ("MC_M2_S1_VC_delta_D", 14, ""),
    ("M1_segment_1_axial_d", 6, "M1_S1"),
];
const N_MODES: usize = 120;

fn channel_set(groups: &[(&str, usize, &str)], rng: &mut SimpleRng) -> (Value, usize) {
    let mut index = 0u32;
    let set: Vec<Value> = groups
        .iter()
        .map(|&(name, size, cs_label)| {
            let records: Vec<Value> = (0..size)
                .map(|k| {
                    index += 1;
                    let mut properties = json!({ "nodeID": [100_000 + index] });
                    if !cs_label.is_empty() {
                        properties["csLabel"] = json!(cs_label);
                        properties["location"] = json!([
                            rng.uniform(-4.0, 4.0),
                            rng.uniform(-4.0, 4.0),
                            rng.uniform(0.0, 5.0)
                        ]);
                    }
                    json!({
                        "types": "OSS.MC",
                        "descriptions": format!("{name} #{}", k + 1),
                        "indices": [index],
                        "properties": properties,
                    })
                })
                .collect();
            let mut group = serde_json::Map::new();
            group.insert(name.to_string(), Value::Array(records));
            Value::Object(group)
        })
        .collect();
    (Value::Array(set), index as usize)
}

fn write_json(path: &Path, value: &Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {path:?}"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let (inputs, n_inputs) = channel_set(&INPUTS, &mut rng);
    let (outputs, n_outputs) = channel_set(&OUTPUTS, &mut rng);

    // Eigen frequencies: 6 rigid body modes then increasing
    let eigenfrequencies: Vec<f64> = (0..N_MODES)
        .map(|i| if i < 6 { 0.0 } else { 0.25 * i as f64 + rng.uniform(0.0, 0.2) })
        .collect();

    let model = json!({
        "modelDescription": "Synthetic modal model, 2nd order",
        "inputs": inputs,
        "outputs": outputs,
        "eigenfrequencies": eigenfrequencies,
        "proportionalDampingVec": vec![0.02; N_MODES],
        "inputs2ModalF": rng.matrix(N_MODES, n_inputs),
        "modalDisp2Outputs": rng.matrix(n_outputs, N_MODES),
    });
    let static_reduction = json!({
        "modelDescription": "Synthetic static reduction",
        "gainMatrix": rng.matrix(n_outputs, n_inputs),
        "gainMatrixMountControlled": rng.matrix(n_outputs, n_inputs),
    });

    let source = Path::new("sample_model.json");
    let static_source = Path::new("sample_static_reduction_model.json");
    write_json(source, &model)?;
    write_json(static_source, &static_reduction)?;
    println!("Wrote {n_inputs} inputs, {n_outputs} outputs and {N_MODES} modes to {source:?}");

    // A small byte budget so the modal matrices are sliced
    let config = ConversionConfig::new(source, "sample_model.zip")
        .with_static_source(static_source)
        .with_byte_budget(32 * 1024);
    let model_name = config.model_name.clone();
    let report = fem_archive::convert(config)?;

    let mut reader = ArchiveReader::open(&report.archive, &model_name)?;
    println!("{}", reader.summary()?);
    let inputs = reader.inputs()?;
    let head = inputs.rows.len().min(5);
    let batch = inputs.to_record_batch()?.slice(0, head);
    println!("{}", pretty_format_batches(&[batch])?);
    println!("Output groups: {:?}", reader.group_names(TableKind::Outputs)?);
    for (entry, layout) in &report.stores {
        println!("{entry:>32}: {layout:?}");
    }
    println!("{} warnings, {}", report.warnings.len(), report.merge);
    Ok(())
}

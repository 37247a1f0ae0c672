use std::path::PathBuf;

use anyhow::{bail, Context};
use fem_archive::{ArchiveReader, ConversionConfig};

const USAGE: &str = "usage: fem-archive <config.json>
       fem-archive <model.json> <archive.zip> [static_reduction_model.json]";

fn config_from_args(args: &[String]) -> anyhow::Result<ConversionConfig> {
    match args {
        [config] => ConversionConfig::from_json_file(config)
            .with_context(|| format!("failed to load configuration {config:?}")),
        [source, archive] => Ok(ConversionConfig::new(source, archive)),
        [source, archive, static_source] => {
            Ok(ConversionConfig::new(source, archive).with_static_source(static_source))
        }
        _ => bail!(USAGE),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = config_from_args(&args)?;
    let model_name = config.model_name.clone();
    let source = PathBuf::from(&config.source);

    let report = fem_archive::convert(config)
        .with_context(|| format!("failed to convert {source:?}"))?;
    for warning in &report.warnings {
        log::warn!("{warning}");
    }

    let mut reader = ArchiveReader::open(&report.archive, &model_name)?;
    println!("{}", reader.summary()?);
    for (entry, layout) in &report.stores {
        println!("{entry:>32}: {layout:?}");
    }
    println!("{}", report.merge);
    Ok(())
}

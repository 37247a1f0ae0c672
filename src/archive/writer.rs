use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{blob_path, metadata_entry, slice_path, table_entry, StoreLayout};
use crate::data::model::ModelMetadata;
use crate::data::table::FlatTable;
use crate::error::Result;
use crate::matrix::blob::write_blob;
use crate::matrix::MatrixStore;

/// Largest entry that fits without zip64 extensions.
const ZIP32_LIMIT: u64 = u32::MAX as u64;

#[derive(Debug)]
struct StagedEntry {
    /// Name inside the archive.
    name: String,
    /// Tables are compressed; matrix blobs are stored as is.
    compressed: bool,
}

/// Collects the archive entries in a staging directory, then seals them into one file.
///
/// The staging directory is removed when the assembler is sealed or dropped, whatever the
/// outcome.
#[derive(Debug)]
pub struct Assembler {
    staging: TempDir,
    model_name: String,
    staged: Vec<StagedEntry>,
}

impl Assembler {
    /// Creates the staging directory under `staging_root`, or the system temp directory.
    pub fn new(model_name: &str, staging_root: Option<&Path>) -> Result<Self> {
        let staging = match staging_root {
            Some(root) => tempfile::Builder::new().prefix("fem-archive").tempdir_in(root)?,
            None => tempfile::Builder::new().prefix("fem-archive").tempdir()?,
        };
        log::debug!("staging archive entries in {:?}", staging.path());
        Ok(Self {
            staging,
            model_name: model_name.to_string(),
            staged: Vec::new(),
        })
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    fn create(&self, name: &str) -> Result<File> {
        let path = self.staging.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(File::create(path)?)
    }

    fn stage_batch(&mut self, entry: String, batch: &RecordBatch) -> Result<()> {
        let name = blob_path(&entry);
        let file = self.create(&name)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(batch)?;
        writer.close()?;
        log::info!("staged {name} ({} rows)", batch.num_rows());
        self.staged.push(StagedEntry {
            name,
            compressed: true,
        });
        Ok(())
    }

    /// Stages `<name>_in` or `<name>_out`.
    pub fn stage_table(&mut self, table: &FlatTable) -> Result<()> {
        let entry = table_entry(&self.model_name, table.kind);
        self.stage_batch(entry, &table.to_record_batch()?)
    }

    /// Stages `<name>_mat`.
    pub fn stage_metadata(&mut self, metadata: &ModelMetadata) -> Result<()> {
        let entry = metadata_entry(&self.model_name);
        self.stage_batch(entry, &metadata.to_record_batch()?)
    }

    /// Stages a matrix as one blob or as its planned column slices.
    pub fn stage_matrix(&mut self, store: &MatrixStore) -> Result<StoreLayout> {
        let layout = StoreLayout::from(store.plan);
        let matrix = store.matrix.data();
        let slices = store.plan.slices(matrix.ncols());
        for slice in slices {
            let name = match layout {
                StoreLayout::Single => blob_path(&store.name),
                StoreLayout::Chunked(_) => slice_path(&store.name, slice.index),
            };
            let file = BufWriter::new(self.create(&name)?);
            let bytes = write_blob(file, matrix, slice.columns.clone())?;
            log::info!(
                "staged {name} [{}x{}] {bytes} bytes",
                matrix.nrows(),
                slice.columns.len()
            );
            self.staged.push(StagedEntry {
                name,
                compressed: false,
            });
        }
        Ok(layout)
    }

    /// Writes the staged entries, in staging order, into the archive at `destination`.
    ///
    /// The archive is written next to `destination` under a temporary name and renamed once
    /// complete, so a failed seal leaves nothing at `destination`.
    pub fn seal(self, destination: &Path) -> Result<PathBuf> {
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut sealed = NamedTempFile::new_in(parent)?;
        {
            let mut zip = ZipWriter::new(BufWriter::new(sealed.as_file_mut()));
            for entry in &self.staged {
                let path = self.staging.path().join(&entry.name);
                let size = fs::metadata(&path)?.len();
                let method = if entry.compressed {
                    CompressionMethod::Deflated
                } else {
                    CompressionMethod::Stored
                };
                let options = SimpleFileOptions::default()
                    .compression_method(method)
                    .large_file(size >= ZIP32_LIMIT);
                zip.start_file(entry.name.as_str(), options)?;
                io::copy(&mut File::open(&path)?, &mut zip)?;
            }
            let mut buffer = zip.finish()?;
            buffer.flush()?;
        }
        sealed.as_file().sync_all()?;
        sealed.persist(destination)?;
        log::info!("sealed {} entries into {destination:?}", self.staged.len());
        self.staging.close()?;
        Ok(destination.to_path_buf())
    }
}

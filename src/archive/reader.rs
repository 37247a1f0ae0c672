use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use nalgebra::DMatrix;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{blob_path, metadata_entry, slice_path, table_entry, StoreLayout, STATIC_GAIN};
use crate::data::model::ModelMetadata;
use crate::data::table::{FlatTable, GroupSummary, TableKind};
use crate::error::{Error, Result};
use crate::matrix::blob::read_blob;

/// Read access to a sealed archive.
///
/// Everything the archive holds can be rebuilt from it alone: the two flat tables, the model
/// scalars and every matrix in storage orientation.
pub struct ArchiveReader {
    path: PathBuf,
    model_name: String,
    zip: ZipArchive<BufReader<File>>,
}

impl ArchiveReader {
    /// Opens the archive and checks that the table and metadata entries are there.
    pub fn open(path: impl AsRef<Path>, model_name: &str) -> Result<Self> {
        let path = path.as_ref();
        log::info!("opening archive {path:?}");
        let zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
        let reader = Self {
            path: path.to_path_buf(),
            model_name: model_name.to_string(),
            zip,
        };
        for entry in [
            table_entry(model_name, TableKind::Inputs),
            table_entry(model_name, TableKind::Outputs),
            metadata_entry(model_name),
        ] {
            let name = blob_path(&entry);
            if !reader.contains(&name) {
                return Err(Error::MissingEntry(name));
            }
        }
        Ok(reader)
    }

    fn contains(&self, name: &str) -> bool {
        self.zip.index_for_name(name).is_some()
    }

    fn read_entry(&mut self, name: &str) -> Result<Bytes> {
        let mut file = match self.zip.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(Error::MissingEntry(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        let mut contents = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut contents)?;
        Ok(Bytes::from(contents))
    }

    fn read_batches(&mut self, entry: &str) -> Result<Vec<RecordBatch>> {
        let name = blob_path(entry);
        log::debug!("reading {name}");
        let contents = self.read_entry(&name)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(contents)?
            .with_batch_size(2048)
            .build()?;
        Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn table(&mut self, kind: TableKind) -> Result<FlatTable> {
        let entry = table_entry(&self.model_name, kind);
        let batches = self.read_batches(&entry)?;
        FlatTable::from_record_batches(kind, &batches)
    }

    pub fn inputs(&mut self) -> Result<FlatTable> {
        self.table(TableKind::Inputs)
    }

    pub fn outputs(&mut self) -> Result<FlatTable> {
        self.table(TableKind::Outputs)
    }

    pub fn metadata(&mut self) -> Result<ModelMetadata> {
        let entry = metadata_entry(&self.model_name);
        let batches = self.read_batches(&entry)?;
        ModelMetadata::from_record_batches(&batches)
    }

    /// Group names in table order.
    pub fn group_names(&mut self, kind: TableKind) -> Result<Vec<String>> {
        Ok(self.table(kind)?.group_names())
    }

    fn slice_count(&self, entry: &str) -> usize {
        (1..)
            .take_while(|&index| self.contains(&slice_path(entry, index)))
            .count()
    }

    /// Whether `entry` is stored as one blob or as column slices.
    pub fn store_layout(&self, entry: &str) -> Result<StoreLayout> {
        if self.contains(&blob_path(entry)) {
            return Ok(StoreLayout::Single);
        }
        match self.slice_count(entry) {
            0 => Err(Error::MissingEntry(entry.to_string())),
            count => Ok(StoreLayout::Chunked(count)),
        }
    }

    /// Reassembles the matrix stored under `entry`, in storage orientation.
    pub fn matrix(&mut self, entry: &str) -> Result<DMatrix<f64>> {
        match self.store_layout(entry)? {
            StoreLayout::Single => {
                let name = blob_path(entry);
                log::info!("loading {entry} from {name}");
                let contents = self.read_entry(&name)?;
                read_blob(entry, contents)
            }
            StoreLayout::Chunked(count) => {
                let mut rows = None;
                let mut cols = 0;
                let mut data: Vec<f64> = Vec::new();
                for index in 1..=count {
                    let name = slice_path(entry, index);
                    log::info!("loading {entry} slice #{index} from {name}");
                    let contents = self.read_entry(&name)?;
                    let block = read_blob(&name, contents)?;
                    let expected = *rows.get_or_insert(block.nrows());
                    if block.nrows() != expected {
                        return Err(Error::Shape {
                            name,
                            expected: (expected, block.ncols()),
                            found: block.shape(),
                        });
                    }
                    cols += block.ncols();
                    data.extend_from_slice(block.as_slice());
                }
                Ok(DMatrix::from_vec(rows.unwrap_or(0), cols, data))
            }
        }
    }

    /// The static gain in storage orientation, `[n_inputs, n_outputs]`, if the archive has one.
    pub fn static_gain(&mut self) -> Result<Option<DMatrix<f64>>> {
        match self.store_layout(STATIC_GAIN) {
            Ok(_) => self.matrix(STATIC_GAIN).map(Some),
            Err(Error::MissingEntry(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn summary(&mut self) -> Result<ModelSummary> {
        Ok(ModelSummary {
            archive: self.path.clone(),
            metadata: self.metadata()?,
            inputs: self.inputs()?.group_summaries(),
            outputs: self.outputs()?.group_summaries(),
            static_gain: self.store_layout(STATIC_GAIN).is_ok(),
        })
    }
}

/// Printable overview of an archived model.
#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub archive: PathBuf,
    pub metadata: ModelMetadata,
    pub inputs: Vec<GroupSummary>,
    pub outputs: Vec<GroupSummary>,
    pub static_gain: bool,
}

fn write_groups(f: &mut fmt::Formatter<'_>, groups: &[GroupSummary]) -> fmt::Result {
    for (k, group) in groups.iter().enumerate() {
        writeln!(f, " #{k:02} {group}")?;
    }
    writeln!(f, "{:>36}: [{:5}]", "Total", groups.iter().map(|g| g.size).sum::<usize>())
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FEM ({:?})", self.archive)?;
        let description = self.metadata.description_text();
        if !description.is_empty() {
            writeln!(f, "  - {description}")?;
        }
        let n_modes = self.metadata.n_modes();
        writeln!(f, "  - # of modes: {n_modes}")?;
        if n_modes > 0 {
            let frequencies = &self.metadata.eigen_frequencies;
            let n = n_modes.min(5);
            writeln!(f, "  - first {n} eigen frequencies: {:9.3?}", &frequencies[..n])?;
            writeln!(
                f,
                "  - last {n} eigen frequencies: {:9.3?}",
                &frequencies[n_modes - n..]
            )?;
            let damping = &self.metadata.proportional_damping;
            let min = damping.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = damping.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            writeln!(f, "  - damping coefficients [min;max]: [{min:.4};{max:.4}]")?;
        }
        if self.static_gain {
            writeln!(f, "  - with static gain")?;
        }
        writeln!(f, "INPUTS:")?;
        write_groups(f, &self.inputs)?;
        writeln!(f, "OUTPUTS:")?;
        write_groups(f, &self.outputs)
    }
}

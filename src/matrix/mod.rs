//! Dense matrices, their storage orientation and how they are cut into blobs.

pub mod blob;
pub mod chunk;

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use chunk::ChunkPlan;

/// Orientation of a matrix relative to how it is stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// As produced by the model source.
    AsProduced,
    /// Transposed for storage.
    Storage,
}

/// A float64 matrix tagged with its orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    orientation: Orientation,
    data: DMatrix<f64>,
}

impl DenseMatrix {
    pub fn as_produced(data: DMatrix<f64>) -> Self {
        Self {
            orientation: Orientation::AsProduced,
            data,
        }
    }

    /// Builds an as-produced matrix from row-major values.
    pub fn from_row_major(name: &str, rows: usize, cols: usize, values: &[f64]) -> Result<Self> {
        if rows.checked_mul(cols) != Some(values.len()) {
            return Err(Error::Shape {
                name: name.to_string(),
                expected: (rows, cols),
                found: (values.len(), 1),
            });
        }
        Ok(Self::as_produced(DMatrix::from_row_slice(rows, cols, values)))
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }
}

/// Fails with [`Error::Shape`] unless `found == expected`.
pub fn check_shape(name: &str, found: (usize, usize), expected: (usize, usize)) -> Result<()> {
    if found != expected {
        return Err(Error::Shape {
            name: name.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Transposes an as-produced matrix into the storage orientation.
///
/// The transform is applied once per export; a matrix already in storage orientation is rejected.
pub fn transpose_for_storage(name: &str, matrix: DenseMatrix) -> Result<DenseMatrix> {
    match matrix.orientation {
        Orientation::Storage => Err(Error::AlreadyTransposed(name.to_string())),
        Orientation::AsProduced => {
            let (rows, cols) = matrix.shape();
            log::info!("transposing {name} [{rows}x{cols}] for storage");
            Ok(DenseMatrix {
                orientation: Orientation::Storage,
                data: matrix.data.transpose(),
            })
        }
    }
}

/// A storage-oriented matrix together with its chunk plan, ready to be staged.
#[derive(Debug, Clone)]
pub struct MatrixStore {
    pub name: String,
    pub matrix: DenseMatrix,
    pub plan: ChunkPlan,
}

impl MatrixStore {
    /// Transposes `matrix` and plans its chunking against `byte_budget`.
    pub fn prepare(name: &str, matrix: DenseMatrix, byte_budget: u64) -> Result<Self> {
        let matrix = transpose_for_storage(name, matrix)?;
        let plan = chunk::plan(matrix.nrows(), matrix.ncols(), byte_budget)?;
        log::debug!("{name}: {plan:?}");
        Ok(Self {
            name: name.to_string(),
            matrix,
            plan,
        })
    }
}

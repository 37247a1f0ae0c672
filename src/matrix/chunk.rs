//! Column-wise chunking of matrices under a per-blob byte budget.

use std::ops::Range;

use crate::error::{Error, Result};

const F64_BYTES: u128 = std::mem::size_of::<f64>() as u128;

/// How a storage-oriented matrix is laid out in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPlan {
    /// The whole matrix fits in one blob.
    Single,
    /// `count` column slices, each `width` columns wide except the last ones.
    Sliced { count: usize, width: usize },
}

/// One column slice, `index` starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub index: usize,
    pub columns: Range<usize>,
}

fn payload_bytes(rows: usize, cols: usize) -> u128 {
    rows as u128 * cols as u128 * F64_BYTES
}

/// Decides whether a `rows x cols` float64 matrix must be split along its columns.
///
/// The slice count doubles from 1 until `rows * ceil(cols / count) * 8 <= budget`, so it is
/// always a power of two.
pub fn plan(rows: usize, cols: usize, budget: u64) -> Result<ChunkPlan> {
    let limit = budget as u128;
    if payload_bytes(rows, cols) <= limit {
        return Ok(ChunkPlan::Single);
    }
    let column_bytes = payload_bytes(rows, 1);
    if column_bytes > limit {
        return Err(Error::Budget {
            rows,
            bytes: column_bytes,
            budget,
        });
    }
    let mut count = 1usize;
    let mut width = cols;
    while payload_bytes(rows, width) > limit {
        count *= 2;
        width = cols.div_ceil(count);
    }
    log::info!(
        "[{rows}x{cols}] exceeds {budget} bytes: {count} slices of {width} columns"
    );
    Ok(ChunkPlan::Sliced { count, width })
}

impl ChunkPlan {
    /// Number of blobs.
    pub fn count(&self) -> usize {
        match self {
            ChunkPlan::Single => 1,
            ChunkPlan::Sliced { count, .. } => *count,
        }
    }

    /// The column ranges of a matrix with `cols` columns, in index order.
    ///
    /// Exactly [`ChunkPlan::count`] slices are returned; when the rounded-up width covers the
    /// columns early the trailing slices are empty.
    pub fn slices(&self, cols: usize) -> Vec<Slice> {
        match *self {
            ChunkPlan::Single => vec![Slice {
                index: 1,
                columns: 0..cols,
            }],
            ChunkPlan::Sliced { count, width } => (0..count)
                .map(|k| {
                    let start = (k * width).min(cols);
                    let end = (start + width).min(cols);
                    Slice {
                        index: k + 1,
                        columns: start..end,
                    }
                })
                .collect(),
        }
    }
}

//! Selection of the static gain matrix stored next to the modal matrices.

use std::fmt;

use crate::data::model::{GainSource, GainVariant, StaticReduction};
use crate::error::Result;
use crate::matrix::{check_shape, MatrixStore};

/// Entry name of the static gain matrix.
pub const STATIC_GAIN: &str = "static_gain";

/// Which gain, if any, went into the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    MountControlled,
    Plain,
    Skipped,
}

impl From<GainVariant> for MergeOutcome {
    fn from(variant: GainVariant) -> Self {
        match variant {
            GainVariant::MountControlled => MergeOutcome::MountControlled,
            GainVariant::Plain => MergeOutcome::Plain,
        }
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOutcome::MountControlled => write!(f, "mount controlled static gain"),
            MergeOutcome::Plain => write!(f, "plain static gain"),
            MergeOutcome::Skipped => write!(f, "no static gain"),
        }
    }
}

/// Picks the static gain and prepares it for storage.
///
/// The gain of the static reduction artifact replaces the one the primary source carries.
/// `io` is `(n_outputs, n_inputs)`, the row counts of the flat tables, and the gain must have
/// that shape before it is transposed.
pub fn merge_static_gain(
    primary: GainSource,
    secondary: Option<StaticReduction>,
    io: (usize, usize),
    byte_budget: u64,
) -> Result<(MergeOutcome, Option<MatrixStore>)> {
    let gain = match secondary {
        Some(reduction) => {
            log::info!(
                "merging {} gain from {:?}",
                reduction.gain.variant().map_or("no".into(), |v| v.to_string()),
                reduction.source
            );
            if !primary.is_absent() {
                log::info!("the static reduction gain replaces the source model gain");
            }
            reduction.gain
        }
        None => primary,
    };

    let Some((variant, matrix)) = gain.into_matrix() else {
        log::info!("no static gain to merge");
        return Ok((MergeOutcome::Skipped, None));
    };
    check_shape(STATIC_GAIN, matrix.shape(), io)?;
    let store = MatrixStore::prepare(STATIC_GAIN, matrix, byte_budget)?;
    Ok((variant.into(), Some(store)))
}

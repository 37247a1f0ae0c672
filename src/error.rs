use std::path::PathBuf;

/// Everything that can abort a conversion run or an archive read.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read or write file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet operation failed: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("failed to read or write zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to move the sealed archive into place: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("required descriptor table `{0}` is missing from the source model")]
    MissingTable(&'static str),
    #[error("group `{group}` appears more than once in the {table} table")]
    DuplicateGroup { table: &'static str, group: String },
    #[error("record #{position} of group `{group}` has no index")]
    MissingIndex { group: String, position: usize },
    #[error("source model has neither a dynamic matrix set nor a static gain matrix")]
    NoModel,
    #[error(
        "a single column of {rows} float64 values ({bytes} bytes) exceeds the {budget} bytes budget"
    )]
    Budget { rows: usize, bytes: u128, budget: u64 },
    #[error("matrix `{0}` is already in storage orientation")]
    AlreadyTransposed(String),
    #[error("matrix `{name}` has shape {found:?}, expected {expected:?}")]
    Shape {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("static reduction artifact {0:?} has no gain matrix")]
    StaticGain(PathBuf),
    #[error("failed to find {0} in archive")]
    MissingEntry(String),
    #[error("failed to read column `{0}`")]
    ReadColumn(String),
    #[error("unsupported source model file {0:?}")]
    UnsupportedSource(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_errors_show_their_cause() {
        let error = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(error.to_string(), "failed to read or write file: gone");
        let error = Error::from(serde_json::from_str::<u32>("x").unwrap_err());
        assert!(error.to_string().starts_with("failed to parse JSON document: expected value"));
    }
}

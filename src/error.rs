use thiserror::Error;

use std::path::PathBuf;

/// Fatal errors from loading, deriving, or writing the feature tables.
///
/// Unresolved joins, zero-quantity WMAPE denominators, preview cast
/// failures and an empty date window are not errors: they show up as
/// missing or non-finite values, or as reports with no rows.
#[derive(Error, Debug)]
pub enum Error {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("{}: expected column {column:?} is missing", .path.display())]
    SchemaMismatch { path: PathBuf, column: &'static str },

    #[error("{}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid date {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

impl Error {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

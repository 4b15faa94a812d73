//! Error types for loading, training and exporting.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid IDX magic {magic} in {}", path.display())]
    InvalidMagic { path: PathBuf, magic: i32 },

    #[error("truncated IDX data in {}: need {needed} bytes, have {available}", path.display())]
    Truncated {
        path: PathBuf,
        needed: usize,
        available: usize,
    },

    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("split cutoff {cutoff} exceeds sample count {samples}")]
    InvalidSplit { cutoff: usize, samples: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("line {line}: cannot parse {value:?} as a float")]
    Parse { line: usize, value: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

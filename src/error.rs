//! Errors surfaced to callers of the bulk matcher and the binaries.

use std::error::Error;
use std::fmt;

/// Hard failures that abort a request. Search and judge degradations are
/// never reported through this type.
#[derive(Debug)]
pub enum MatchError {
    /// A required credential was not present in the environment.
    MissingCredential {
        /// Environment variable that was looked up.
        var: &'static str,
    },
    /// An input table lacks a required column.
    MissingColumn {
        /// Logical table name (`supply` or `catalog`).
        table: &'static str,
        /// Column, or alternatives joined with `|`.
        column: String,
    },
    /// The catalog has no rows but there are supply rows to match.
    EmptyCatalog,
    /// The embedding service failed; the whole batch is aborted.
    Embedding(anyhow::Error),
    /// The embedding service or the cache returned the wrong number of vectors.
    EmbeddingCount {
        /// Number of descriptions that were sent.
        expected: usize,
        /// Number of vectors that came back.
        actual: usize,
    },
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::MissingCredential { var } => {
                write!(f, "missing credential: set {var}")
            }
            MatchError::MissingColumn { table, column } => {
                write!(f, "{table} table is missing required column {column}")
            }
            MatchError::EmptyCatalog => write!(f, "catalog table has no rows"),
            MatchError::Embedding(err) => write!(f, "embedding request failed: {err:#}"),
            MatchError::EmbeddingCount { expected, actual } => write!(
                f,
                "embedding count mismatch: expected {expected} vectors, got {actual}"
            ),
        }
    }
}

impl Error for MatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MatchError::Embedding(err) => Some(&**err),
            _ => None,
        }
    }
}

use std::path::PathBuf;

use opgraph_types::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {kind} document {}: {reason}", path.display())]
    Malformed {
        kind: EntityKind,
        path: PathBuf,
        reason: String,
    },

    #[error("{kind} document {} is not keyed by an entity id", path.display())]
    InvalidKey { kind: EntityKind, path: PathBuf },

    #[error("malformed replacement map {}: {reason}", path.display())]
    MalformedReplacements { path: PathBuf, reason: String },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

use std::path::PathBuf;

use opgraph_archive::ArchiveError;
use opgraph_model::ModelError;
use opgraph_store::StoreError;
use opgraph_types::{EntityId, EntityKind, ProjectId};
use thiserror::Error;

/// Errors raised while validating or importing an archive.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The referenced parent exists neither in the project nor in the batch.
    #[error("{kind} `{name}` ({id}): parent {parent} not found")]
    ParentNotFound {
        kind: EntityKind,
        id: EntityId,
        name: String,
        parent: EntityId,
    },

    /// Following parents from `id` leads back to `id`.
    #[error("{kind} {id}: ancestry through {parent} is cyclic")]
    CyclicReference {
        kind: EntityKind,
        id: EntityId,
        parent: EntityId,
    },

    /// A file document has no payload in the archive.
    #[error("file `{name}` ({id}): content missing at {}", path.display())]
    MissingContent {
        id: EntityId,
        name: String,
        path: PathBuf,
    },

    /// A wire document parsed but is missing required data.
    #[error("malformed {kind} document {}: {reason}", path.display())]
    Malformed {
        kind: EntityKind,
        path: PathBuf,
        reason: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pre-flight validation found problems; nothing was imported.
    #[error("validation found {count} issue(s); first: {first}")]
    ValidationFailed { count: usize, first: String },

    #[error("project lock poisoned for {0}")]
    LockPoisoned(ProjectId),
}

impl ImportError {
    /// Map a graph cycle onto the import taxonomy; other model errors pass
    /// through unchanged.
    pub(crate) fn from_move(err: ModelError) -> Self {
        match err {
            ModelError::Cycle { kind, id, parent } => Self::CyclicReference { kind, id, parent },
            other => Self::Model(other),
        }
    }
}

/// Errors from loading or validating an [`ImportConfig`](crate::ImportConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ImportResult<T> = Result<T, ImportError>;

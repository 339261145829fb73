//! Error types for graph mutations.

use opgraph_types::{EntityId, EntityKind};

/// Errors that can occur while mutating a project configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A referenced entity does not exist in the project.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    /// An entity with this id is already part of the project.
    #[error("duplicate {kind}: {id}")]
    Duplicate { kind: EntityKind, id: EntityId },

    /// Attaching `id` under `parent` would make it its own ancestor.
    #[error("moving {kind} {id} under {parent} would create a cycle")]
    Cycle {
        kind: EntityKind,
        id: EntityId,
        parent: EntityId,
    },

    /// The kind passed to a singleton accessor is not a singleton kind.
    #[error("{0} is not a singleton configuration kind")]
    NotSingleton(EntityKind),
}

/// Convenience alias for graph mutation results.
pub type ModelResult<T> = Result<T, ModelError>;

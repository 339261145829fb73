//! Foundation types for opgraph.
//!
//! This crate provides the identity and classification types shared by every
//! other opgraph crate. It has no knowledge of the configuration graph itself.
//!
//! # Key Types
//!
//! - [`EntityId`] — Project-scoped identifier of a configuration entity (UUID v7)
//! - [`ProjectId`] — Identifier of the owning project (tenant)
//! - [`EntityKind`] — The closed set of importable entity kinds, in merge order
//! - [`ObjectRef`] — Opaque reference to file content held by a blob store
//! - [`ImportToken`] — Per-import marker used to suffix conflicting names

pub mod error;
pub mod identity;
pub mod kind;
pub mod object;
pub mod token;

pub use error::TypeError;
pub use identity::{EntityId, ProjectId};
pub use kind::EntityKind;
pub use object::ObjectRef;
pub use token::{ImportToken, DEFAULT_TOKEN_FORMAT};

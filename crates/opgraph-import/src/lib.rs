//! Import reconciliation for opgraph project configurations.
//!
//! An archive holds one batch per entity kind. The [`Importer`] merges the
//! batches into a live [`ProjectConfiguration`](opgraph_model::ProjectConfiguration)
//! in dependency order: directories, files, sections, compounds, processes,
//! then the singleton configurations.
//!
//! Each kind's [`EntityMerger`] works in two phases. It first resolves every
//! reference in the batch (parents, memberships) against the live project
//! and the batch itself, through an [`IdentityResolver`] that understands
//! replacement maps. Only then does it merge, matching each entity to a live
//! one by id or source id. Unmatched entities are inserted.
//!
//! # Name collisions
//!
//! An inserted entity whose name is already used among its siblings causes
//! a conflict rename built by [`ConflictNamer`]:
//!
//! - directories and files rename the **existing** entity and move the
//!   blobs of every affected file;
//! - sections, compounds and processes rename the **incoming** entity.
//!
//! # Failure
//!
//! A kind either merges completely or not at all. Renames of existing
//! entities are journaled and survive a rollback of their kind. Blobs moved
//! by the failed kind are moved back to the paths of the restored project.

pub mod compound;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod file;
pub mod identity;
pub mod loader;
pub mod merger;
pub mod naming;
pub mod process;
pub mod report;
pub mod section;
pub mod session;
pub mod singleton;

#[cfg(test)]
mod testing;

pub use compound::CompoundMerger;
pub use config::{ImportConfig, DEFAULT_CONFLICT_MARKER};
pub use context::ImportContext;
pub use directory::DirectoryMerger;
pub use error::{ConfigError, ImportError, ImportResult};
pub use file::FileMerger;
pub use identity::{find_identity_match, reverse_map, IdentityResolver};
pub use loader::{EntityLoader, Loaded};
pub use merger::{EntityMerger, Validation};
pub use naming::ConflictNamer;
pub use process::ProcessMerger;
pub use report::{ImportReport, KindCounters, RenameRecord, RenameSide};
pub use section::SectionMerger;
pub use session::{ImportRequest, Importer, ProjectLocks, ValidationReport};
pub use singleton::SingletonMerger;

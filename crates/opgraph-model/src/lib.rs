//! Project configuration graph for opgraph.
//!
//! A [`ProjectConfiguration`] is the aggregate root for one project. It owns
//! five entity collections that reference each other:
//!
//! - directories form a tree and contain files,
//! - sections form a tree and list compounds and processes,
//! - compounds hold an ordered list of processes,
//! - processes record which sections and compounds they belong to,
//!
//! plus at most one common, header, and proof-of-testing header
//! configuration.
//!
//! Every relationship is stored on both sides. The mutators on
//! [`ProjectConfiguration`] update both sides together; callers never edit a
//! membership list directly. [`ProjectConfiguration::check_invariants`]
//! reports any drift.

pub mod entity;
pub mod error;
pub mod invariants;
pub mod project;

pub use entity::{
    CompoundConfiguration, FileContent, Identified, ProcessConfiguration, ProjectDirectory,
    ProjectFile, SectionConfiguration, SingletonConfiguration,
};
pub use error::{ModelError, ModelResult};
pub use invariants::InvariantViolation;
pub use project::ProjectConfiguration;

//! Export archive format for opgraph.
//!
//! An archive is a directory tree with one sub-directory per entity kind and
//! one JSON document per entity, named by the entity's origin id. File
//! payloads sit next to the file documents, keyed by the same origin id.
//! This crate only reads archives; producing them is someone else's job.

pub mod error;
pub mod reader;
pub mod wire;

pub use error::{ArchiveError, ArchiveResult};
pub use reader::{read_replacements_file, ArchiveEntry, ArchiveReader, CONTENT_DIR, REPLACEMENTS_FILE};
pub use wire::{
    CompoundWire, DirectoryWire, FileWire, ProcessWire, SectionWire, SingletonWire, WireEntity,
};

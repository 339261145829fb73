//! File content storage for opgraph.
//!
//! Project files keep their bytes outside the configuration graph. The graph
//! only holds an [`ObjectRef`](opgraph_types::ObjectRef) handed out by a
//! [`BlobStore`]. A blob is addressed by the owning project and a
//! slash-separated key, so renaming a file on import renames its blob too.
//!
//! # Storage Backends
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsBlobStore`] -- one file per blob under a root directory
//!
//! # Design Rules
//!
//! 1. The store never interprets blob contents.
//! 2. A blob reference is valid until the blob is renamed.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod blob;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use blob::{BlobContent, BlobMetadata};
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::BlobStore;

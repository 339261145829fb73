use std::path::Path;

use opgraph_types::ObjectRef;

use crate::blob::{BlobContent, BlobMetadata};
use crate::error::StoreResult;

/// Storage for project file content.
///
/// Implementations must satisfy these invariants:
/// - `upload` followed by `get` on the returned reference yields the
///   uploaded bytes.
/// - After `rename`, the old reference no longer resolves and the returned
///   reference yields the same bytes.
/// - Concurrent reads are always safe.
pub trait BlobStore: Send + Sync {
    /// Copy the file at `source` into the store under `metadata.key`.
    ///
    /// Uploading to a key that already holds a blob replaces it.
    fn upload(&self, metadata: &BlobMetadata, source: &Path) -> StoreResult<ObjectRef>;

    /// Read a blob. Returns `Ok(None)` if it does not exist.
    fn get(&self, object: &ObjectRef) -> StoreResult<Option<BlobContent>>;

    /// Move a blob to the key in `metadata` and return its new reference.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) when
    /// `object` does not exist.
    fn rename(&self, object: &ObjectRef, metadata: &BlobMetadata) -> StoreResult<ObjectRef>;

    /// Check whether a blob exists.
    fn exists(&self, object: &ObjectRef) -> StoreResult<bool> {
        Ok(self.get(object)?.is_some())
    }
}

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use opgraph_types::ObjectRef;
use tracing::debug;

use crate::blob::{BlobContent, BlobMetadata};
use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

#[derive(Clone, Debug)]
struct StoredBlob {
    metadata: BlobMetadata,
    data: Vec<u8>,
    digest: [u8; 32],
}

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Each blob keeps the BLAKE3 digest taken
/// at upload, and reads verify it.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<ObjectRef, StoredBlob>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of every reference in the store.
    pub fn all_refs(&self) -> StoreResult<Vec<ObjectRef>> {
        let map = self.blobs.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut refs: Vec<ObjectRef> = map.keys().cloned().collect();
        refs.sort();
        Ok(refs)
    }

    /// Metadata recorded for a blob at upload or last rename.
    pub fn metadata(&self, object: &ObjectRef) -> StoreResult<Option<BlobMetadata>> {
        let map = self.blobs.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(object).map(|b| b.metadata.clone()))
    }

    /// Store bytes directly, bypassing the filesystem.
    pub fn put(&self, metadata: &BlobMetadata, data: Vec<u8>) -> StoreResult<ObjectRef> {
        let object = metadata.object_ref()?;
        let digest = *blake3::hash(&data).as_bytes();
        let mut map = self.blobs.write().map_err(|_| StoreError::LockPoisoned)?;
        map.insert(
            object.clone(),
            StoredBlob {
                metadata: metadata.clone(),
                data,
                digest,
            },
        );
        Ok(object)
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn upload(&self, metadata: &BlobMetadata, source: &Path) -> StoreResult<ObjectRef> {
        let data = std::fs::read(source)?;
        let object = self.put(metadata, data)?;
        debug!(object = %object, file = %metadata.file_id, "uploaded blob");
        Ok(object)
    }

    fn get(&self, object: &ObjectRef) -> StoreResult<Option<BlobContent>> {
        let map = self.blobs.read().map_err(|_| StoreError::LockPoisoned)?;
        let Some(blob) = map.get(object) else {
            return Ok(None);
        };
        let content = BlobContent::new(blob.data.clone());
        if content.digest != blob.digest {
            return Err(StoreError::DigestMismatch {
                object: object.clone(),
                expected: hex::encode(blob.digest),
                computed: content.digest_hex(),
            });
        }
        Ok(Some(content))
    }

    fn rename(&self, object: &ObjectRef, metadata: &BlobMetadata) -> StoreResult<ObjectRef> {
        let target = metadata.object_ref()?;
        let mut map = self.blobs.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut blob = map
            .remove(object)
            .ok_or_else(|| StoreError::NotFound(object.clone()))?;
        blob.metadata = metadata.clone();
        map.insert(target.clone(), blob);
        debug!(from = %object, to = %target, "renamed blob");
        Ok(target)
    }

    fn exists(&self, object: &ObjectRef) -> StoreResult<bool> {
        let map = self.blobs.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.contains_key(object))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

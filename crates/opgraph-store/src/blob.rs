use opgraph_types::{EntityId, ObjectRef, ProjectId};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Describes where a blob lives and what it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub project: ProjectId,
    /// The project file this blob backs.
    pub file_id: EntityId,
    /// Slash-separated storage key, usually the file's path in the project.
    pub key: String,
    pub content_length: u64,
}

impl BlobMetadata {
    pub fn new(project: ProjectId, file_id: EntityId, key: impl Into<String>, content_length: u64) -> Self {
        Self {
            project,
            file_id,
            key: key.into(),
            content_length,
        }
    }

    /// Reference a blob stored under this metadata would get.
    pub fn object_ref(&self) -> StoreResult<ObjectRef> {
        validate_key(&self.key)?;
        Ok(ObjectRef::new(format!("{}/{}", self.project, self.key)))
    }
}

/// Bytes read back from a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobContent {
    pub data: Vec<u8>,
    pub digest: [u8; 32],
}

impl BlobContent {
    pub fn new(data: Vec<u8>) -> Self {
        let digest = *blake3::hash(&data).as_bytes();
        Self { data, digest }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Reject keys that are empty or could escape the project namespace.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.contains('\\') {
        return Err(invalid("backslash in key"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            _ => {}
        }
    }
    Ok(())
}

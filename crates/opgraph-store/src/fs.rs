use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use opgraph_types::ObjectRef;
use tracing::debug;

use crate::blob::{validate_key, BlobContent, BlobMetadata};
use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// Filesystem blob store.
///
/// Blobs live at `<root>/<project>/<key>`. The object reference is the path
/// relative to the root.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, object: &ObjectRef) -> StoreResult<PathBuf> {
        validate_key(object.as_str())?;
        Ok(self.root.join(object.as_str()))
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, metadata: &BlobMetadata, source: &Path) -> StoreResult<ObjectRef> {
        let object = metadata.object_ref()?;
        let target = self.path_of(&object)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let copied = fs::copy(source, &target)?;
        debug!(object = %object, bytes = copied, "uploaded blob");
        Ok(object)
    }

    fn get(&self, object: &ObjectRef) -> StoreResult<Option<BlobContent>> {
        let path = self.path_of(object)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(BlobContent::new(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn rename(&self, object: &ObjectRef, metadata: &BlobMetadata) -> StoreResult<ObjectRef> {
        let from = self.path_of(object)?;
        if !from.is_file() {
            return Err(StoreError::NotFound(object.clone()));
        }
        let target = metadata.object_ref()?;
        let to = self.path_of(&target)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&from, &to)?;
        debug!(from = %object, to = %target, "renamed blob");
        Ok(target)
    }

    fn exists(&self, object: &ObjectRef) -> StoreResult<bool> {
        Ok(self.path_of(object)?.is_file())
    }
}

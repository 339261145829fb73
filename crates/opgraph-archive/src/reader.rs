use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use opgraph_types::{EntityId, EntityKind};
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};
use crate::wire::{SingletonWire, WireEntity};

/// File name of the optional replacement map at the archive root.
pub const REPLACEMENTS_FILE: &str = "replacements.json";

/// Sub-path of the file kind directory that holds file payloads.
pub const CONTENT_DIR: &str = "content";

/// One wire document in an archive, keyed by the entity's origin id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub key: EntityId,
    pub path: PathBuf,
}

/// Reads an unpacked export archive.
///
/// Layout:
///
/// ```text
/// <root>/<kind dir>/<origin id>.json
/// <root>/files/content/<origin id>/<file name>
/// <root>/<singleton dir>/<any>.json
/// <root>/replacements.json
/// ```
#[derive(Clone, Debug)]
pub struct ArchiveReader {
    root: PathBuf,
}

impl ArchiveReader {
    /// Open an archive rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> ArchiveResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ArchiveError::NotFound(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: EntityKind) -> PathBuf {
        self.root.join(kind.archive_dir())
    }

    /// Wire documents of one kind, sorted by file name.
    ///
    /// A missing kind directory is an empty batch.
    pub fn entries(&self, kind: EntityKind) -> ArchiveResult<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        for path in self.json_files(kind)? {
            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<EntityId>().ok())
                .ok_or_else(|| ArchiveError::InvalidKey {
                    kind,
                    path: path.clone(),
                })?;
            entries.push(ArchiveEntry { key, path });
        }
        debug!(%kind, count = entries.len(), "listed archive entries");
        Ok(entries)
    }

    /// Parse one wire document.
    pub fn read_entry<W: WireEntity>(&self, entry: &ArchiveEntry) -> ArchiveResult<W> {
        read_json(W::KIND, &entry.path)
    }

    /// Path of a file payload stored under `key`.
    pub fn content_path(&self, key: EntityId, name: &str) -> PathBuf {
        self.kind_dir(EntityKind::File)
            .join(CONTENT_DIR)
            .join(key.to_string())
            .join(name)
    }

    /// Read the single document of a singleton kind, if present.
    pub fn read_singleton(&self, kind: EntityKind) -> ArchiveResult<Option<SingletonWire>> {
        let mut files = self.json_files(kind)?;
        match files.len() {
            0 => Ok(None),
            1 => {
                let path = files.remove(0);
                read_json(kind, &path).map(Some)
            }
            n => Err(ArchiveError::Malformed {
                kind,
                path: self.kind_dir(kind),
                reason: format!("expected one document, found {n}"),
            }),
        }
    }

    /// Read the replacement map shipped with the archive, if any.
    pub fn read_replacements(&self) -> ArchiveResult<BTreeMap<EntityId, EntityId>> {
        let path = self.root.join(REPLACEMENTS_FILE);
        if !path.is_file() {
            return Ok(BTreeMap::new());
        }
        read_replacements_file(&path)
    }

    fn json_files(&self, kind: EntityKind) -> ArchiveResult<Vec<PathBuf>> {
        let dir = self.kind_dir(kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| ArchiveError::io(&dir, e))? {
            let path = entry.map_err(|e| ArchiveError::io(&dir, e))?.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Read a replacement map (`{"<origin id>": "<new id>"}`) from any path.
pub fn read_replacements_file(path: &Path) -> ArchiveResult<BTreeMap<EntityId, EntityId>> {
    let data = std::fs::read(path).map_err(|e| ArchiveError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|e| ArchiveError::MalformedReplacements {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_json<T: serde::de::DeserializeOwned>(kind: EntityKind, path: &Path) -> ArchiveResult<T> {
    let data = std::fs::read(path).map_err(|e| ArchiveError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|e| ArchiveError::Malformed {
        kind,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{DirectoryWire, SectionWire};
    use std::fs;

    fn id(n: u128) -> EntityId {
        EntityId::from_u128(n)
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn open_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveReader::open(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound(_)));
    }

    #[test]
    fn entries_are_sorted_and_keyed() {
        let dir = tempfile::tempdir().unwrap();
        let doc = |n: u128| serde_json::to_string(&DirectoryWire {
            id: id(n),
            name: format!("d{n}"),
            parent_directory: None,
        })
        .unwrap();
        write(dir.path(), &format!("directories/{}.json", id(2)), &doc(2));
        write(dir.path(), &format!("directories/{}.json", id(1)), &doc(1));
        write(dir.path(), "directories/notes.txt", "ignored");

        let reader = ArchiveReader::open(dir.path()).unwrap();
        let entries = reader.entries(EntityKind::Directory).unwrap();
        assert_eq!(entries.iter().map(|e| e.key).collect::<Vec<_>>(), vec![id(1), id(2)]);

        let wire: DirectoryWire = reader.read_entry(&entries[1]).unwrap();
        assert_eq!(wire.name, "d2");
    }

    #[test]
    fn missing_kind_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ArchiveReader::open(dir.path()).unwrap();
        assert!(reader.entries(EntityKind::Process).unwrap().is_empty());
        assert!(reader.read_singleton(EntityKind::HeaderConfiguration).unwrap().is_none());
        assert!(reader.read_replacements().unwrap().is_empty());
    }

    #[test]
    fn non_uuid_file_name_is_invalid_key() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sections/setup.json", "{}");
        let reader = ArchiveReader::open(dir.path()).unwrap();
        assert!(matches!(
            reader.entries(EntityKind::Section),
            Err(ArchiveError::InvalidKey { kind: EntityKind::Section, .. })
        ));
    }

    #[test]
    fn malformed_document_names_kind_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let rel = format!("sections/{}.json", id(1));
        write(dir.path(), &rel, r#"{"id": "not-a-uuid"}"#);
        let reader = ArchiveReader::open(dir.path()).unwrap();
        let entry = &reader.entries(EntityKind::Section).unwrap()[0];
        match reader.read_entry::<SectionWire>(entry) {
            Err(ArchiveError::Malformed { kind, path, .. }) => {
                assert_eq!(kind, EntityKind::Section);
                assert_eq!(path, dir.path().join(rel));
            }
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn singleton_and_replacements() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "header/header.json", r#"{"settings": {"title": "T"}}"#);
        write(
            dir.path(),
            REPLACEMENTS_FILE,
            &format!(r#"{{"{}": "{}"}}"#, id(1), id(2)),
        );
        let reader = ArchiveReader::open(dir.path()).unwrap();

        let header = reader
            .read_singleton(EntityKind::HeaderConfiguration)
            .unwrap()
            .unwrap();
        assert_eq!(header.settings["title"], "T");
        assert_eq!(reader.read_replacements().unwrap().get(&id(1)), Some(&id(2)));
    }

    #[test]
    fn two_singleton_documents_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "common/a.json", "{}");
        write(dir.path(), "common/b.json", "{}");
        let reader = ArchiveReader::open(dir.path()).unwrap();
        assert!(matches!(
            reader.read_singleton(EntityKind::CommonConfiguration),
            Err(ArchiveError::Malformed { .. })
        ));
    }

    #[test]
    fn content_path_is_keyed_by_origin_id() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ArchiveReader::open(dir.path()).unwrap();
        assert_eq!(
            reader.content_path(id(3), "run.log"),
            dir.path().join("files/content").join(id(3).to_string()).join("run.log")
        );
    }
}

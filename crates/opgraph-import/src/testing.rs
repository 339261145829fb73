//! Archive fixtures for unit tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use opgraph_archive::{
    ArchiveReader, CompoundWire, DirectoryWire, FileWire, ProcessWire, SectionWire, SingletonWire,
    WireEntity, REPLACEMENTS_FILE,
};
use opgraph_model::ProjectConfiguration;
use opgraph_store::BlobStore;
use opgraph_types::{EntityId, EntityKind, ImportToken, ProjectId};
use serde_json::Value;
use tempfile::TempDir;

use crate::context::ImportContext;
use crate::identity::IdentityResolver;
use crate::naming::ConflictNamer;

pub(crate) const PROJECT: ProjectId = ProjectId::from_u128(0xabc);

pub(crate) fn id(n: u128) -> EntityId {
    EntityId::from_u128(n)
}

pub(crate) fn project() -> ProjectConfiguration {
    ProjectConfiguration::new(PROJECT)
}

pub(crate) fn token() -> ImportToken {
    ImportToken::new("T").unwrap()
}

pub(crate) fn context<'a>(reader: &'a ArchiveReader, blobs: &'a dyn BlobStore) -> ImportContext<'a> {
    context_with(reader, blobs, BTreeMap::new())
}

pub(crate) fn context_with<'a>(
    reader: &'a ArchiveReader,
    blobs: &'a dyn BlobStore,
    replacements: BTreeMap<EntityId, EntityId>,
) -> ImportContext<'a> {
    ImportContext::new(
        reader,
        blobs,
        IdentityResolver::new(replacements),
        ConflictNamer::new("_ImportConflict_", token()),
    )
}

/// An archive on disk, built document by document.
pub(crate) struct ArchiveFixture {
    dir: TempDir,
}

impl ArchiveFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn reader(&self) -> ArchiveReader {
        ArchiveReader::open(self.path()).unwrap()
    }

    pub fn raw(&self, rel: &str, body: &str) {
        let path = self.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    pub fn write<W: WireEntity>(&self, key: EntityId, wire: &W) {
        let rel = format!("{}/{key}.json", W::KIND.archive_dir());
        self.raw(&rel, &serde_json::to_string_pretty(wire).unwrap());
    }

    pub fn directory(&self, key: EntityId, name: &str, parent: Option<EntityId>) {
        self.write(
            key,
            &DirectoryWire {
                id: key,
                name: name.into(),
                parent_directory: parent,
            },
        );
    }

    pub fn file(&self, key: EntityId, name: &str, directory: Option<EntityId>, content: &[u8]) {
        self.file_without_content(key, name, directory);
        let path = self.reader().content_path(key, name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn file_without_content(&self, key: EntityId, name: &str, directory: Option<EntityId>) {
        self.write(
            key,
            &FileWire {
                id: key,
                name: name.into(),
                directory,
                last_update: None,
                last_update_by: Some("exporter".into()),
            },
        );
    }

    pub fn section(&self, key: EntityId, name: &str, parent: Option<EntityId>, place: u32) {
        self.write(
            key,
            &SectionWire {
                id: key,
                name: name.into(),
                parent_section: parent,
                place,
            },
        );
    }

    pub fn compound(&self, key: EntityId, name: &str, sections: &[EntityId], processes: &[EntityId]) {
        self.write(
            key,
            &CompoundWire {
                id: key,
                name: name.into(),
                refer_to_input: None,
                sections: sections.to_vec(),
                processes: processes.to_vec(),
            },
        );
    }

    pub fn process(&self, key: EntityId, name: &str, sections: &[EntityId]) {
        self.write(
            key,
            &ProcessWire {
                id: key,
                name: name.into(),
                process_settings: serde_json::json!({ "commands": [name] }),
                sections: sections.to_vec(),
            },
        );
    }

    pub fn singleton(&self, kind: EntityKind, settings: Value) {
        let rel = format!("{}/{}.json", kind.archive_dir(), kind.archive_dir());
        let wire = SingletonWire { id: None, settings };
        self.raw(&rel, &serde_json::to_string(&wire).unwrap());
    }

    pub fn replacements(&self, map: &BTreeMap<EntityId, EntityId>) {
        self.raw(REPLACEMENTS_FILE, &serde_json::to_string(map).unwrap());
    }
}

use std::collections::BTreeSet;
use std::path::PathBuf;

use opgraph_archive::{ArchiveReader, WireEntity};
use opgraph_types::EntityId;
use tracing::debug;

use crate::error::{ImportError, ImportResult};
use crate::identity::IdentityResolver;

/// A wire document together with the identity it takes on import.
#[derive(Clone, Debug, PartialEq)]
pub struct Loaded<W> {
    /// Id in the target project (the archived id, translated through the
    /// replacement map).
    pub id: EntityId,
    /// Origin id, taken from the archive key.
    pub source_id: EntityId,
    pub wire: W,
    pub path: PathBuf,
}

impl<W: WireEntity> Loaded<W> {
    pub fn name(&self) -> &str {
        self.wire.name()
    }

    /// Whether an archived reference points at this entity.
    pub fn answers_to(&self, candidates: &[EntityId]) -> bool {
        candidates.contains(&self.id)
            || candidates.contains(&self.source_id)
            || candidates.contains(&self.wire.id())
    }
}

/// Reads one kind's batch from an archive.
pub struct EntityLoader<'a> {
    archive: &'a ArchiveReader,
    resolver: &'a IdentityResolver,
}

impl<'a> EntityLoader<'a> {
    pub fn new(archive: &'a ArchiveReader, resolver: &'a IdentityResolver) -> Self {
        Self { archive, resolver }
    }

    /// Load every document of `W`'s kind.
    ///
    /// Entities are de-duplicated by id; the first occurrence wins. A blank
    /// name makes the document malformed.
    pub fn load<W: WireEntity>(&self) -> ImportResult<Vec<Loaded<W>>> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for entry in self.archive.entries(W::KIND)? {
            let wire: W = self.archive.read_entry(&entry)?;
            if wire.name().trim().is_empty() {
                return Err(ImportError::Malformed {
                    kind: W::KIND,
                    path: entry.path,
                    reason: "name is blank".into(),
                });
            }
            let id = self.resolver.translate(wire.id());
            if !seen.insert(id) {
                debug!(kind = %W::KIND, %id, path = %entry.path.display(), "dropping duplicate entity in batch");
                continue;
            }
            out.push(Loaded {
                id,
                source_id: entry.key,
                wire,
                path: entry.path,
            });
        }
        debug!(kind = %W::KIND, count = out.len(), "loaded batch");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{id, ArchiveFixture};
    use opgraph_archive::DirectoryWire;
    use std::collections::BTreeMap;

    #[test]
    fn stamps_source_id_from_archive_key() {
        let fx = ArchiveFixture::new();
        fx.directory(id(1), "root", None);
        let reader = fx.reader();
        let resolver = IdentityResolver::default();

        let loaded = EntityLoader::new(&reader, &resolver).load::<DirectoryWire>().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, id(1));
        assert_eq!(loaded[0].source_id, id(1));
        assert_eq!(loaded[0].name(), "root");
    }

    #[test]
    fn applies_replacement_map_to_ids() {
        let fx = ArchiveFixture::new();
        fx.directory(id(1), "root", None);
        let reader = fx.reader();
        let resolver = IdentityResolver::new(BTreeMap::from([(id(1), id(50))]));

        let loaded = EntityLoader::new(&reader, &resolver).load::<DirectoryWire>().unwrap();
        assert_eq!(loaded[0].id, id(50));
        assert_eq!(loaded[0].source_id, id(1));
        assert!(loaded[0].answers_to(&[id(1)]));
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let fx = ArchiveFixture::new();
        // Two documents under different keys carrying the same id.
        fx.write(
            id(1),
            &DirectoryWire {
                id: id(7),
                name: "first".into(),
                parent_directory: None,
            },
        );
        fx.write(
            id(2),
            &DirectoryWire {
                id: id(7),
                name: "second".into(),
                parent_directory: None,
            },
        );
        let reader = fx.reader();
        let resolver = IdentityResolver::default();

        let loaded = EntityLoader::new(&reader, &resolver).load::<DirectoryWire>().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name(), "first");
    }

    #[test]
    fn blank_name_is_malformed() {
        let fx = ArchiveFixture::new();
        fx.directory(id(1), "  ", None);
        let reader = fx.reader();
        let resolver = IdentityResolver::default();

        let err = EntityLoader::new(&reader, &resolver)
            .load::<DirectoryWire>()
            .unwrap_err();
        assert!(matches!(err, ImportError::Malformed { .. }));
    }

    #[test]
    fn unparseable_document_names_kind() {
        let fx = ArchiveFixture::new();
        fx.raw(&format!("directories/{}.json", id(1)), "{ not json");
        let reader = fx.reader();
        let resolver = IdentityResolver::default();

        let err = EntityLoader::new(&reader, &resolver)
            .load::<DirectoryWire>()
            .unwrap_err();
        assert!(err.to_string().contains("directory"), "{err}");
    }
}

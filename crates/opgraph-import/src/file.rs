//! File merging and blob placement.
//!
//! A file's blob lives under its path in the project (`dir/sub/name`), so
//! any rename of the file or of a directory above it moves the blob too.

use std::fs;
use std::io;
use std::path::PathBuf;

use opgraph_archive::{DirectoryWire, FileWire};
use opgraph_model::{FileContent, ProjectConfiguration, ProjectFile};
use opgraph_store::{BlobMetadata, StoreError};
use opgraph_types::{EntityId, EntityKind};
use tracing::{debug, warn};

use crate::context::ImportContext;
use crate::error::{ImportError, ImportResult};
use crate::identity::{find_identity_match, IdentityResolver};
use crate::loader::Loaded;
use crate::merger::{commit_atomically, EntityMerger, Validation};
use crate::report::{RenameRecord, RenameSide};

const KIND: EntityKind = EntityKind::File;

/// Archive payload of one file.
struct Payload {
    path: PathBuf,
    size: u64,
}

#[derive(Debug, Default)]
pub struct FileMerger;

impl FileMerger {
    fn resolve_directory(
        config: &ProjectConfiguration,
        resolver: &IdentityResolver,
        file: &Loaded<FileWire>,
    ) -> ImportResult<Option<EntityId>> {
        let Some(reference) = file.wire.directory else {
            return Ok(None);
        };
        resolver
            .resolve(reference, config.directories())
            .map(|d| Some(d.id))
            .ok_or_else(|| ImportError::ParentNotFound {
                kind: KIND,
                id: file.id,
                name: file.name().to_string(),
                parent: reference,
            })
    }

    fn locate_payload(ctx: &ImportContext<'_>, file: &Loaded<FileWire>) -> ImportResult<Payload> {
        let path = ctx.archive.content_path(file.source_id, file.name());
        let missing = || ImportError::MissingContent {
            id: file.id,
            name: file.name().to_string(),
            path: path.clone(),
        };
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Payload {
                size: meta.len(),
                path,
            }),
            Ok(_) => Err(missing()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(missing()),
            Err(source) => Err(ImportError::Io { path, source }),
        }
    }

    fn merge(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        let batch = ctx.loader().load::<FileWire>()?;
        let mut planned = Vec::with_capacity(batch.len());
        for file in &batch {
            let directory = Self::resolve_directory(config, &ctx.resolver, file)?;
            let payload = Self::locate_payload(ctx, file)?;
            planned.push((directory, payload));
        }
        for (file, (directory, payload)) in batch.iter().zip(planned) {
            Self::merge_one(config, ctx, file, directory, &payload)?;
        }
        Ok(())
    }

    fn merge_one(
        config: &mut ProjectConfiguration,
        ctx: &mut ImportContext<'_>,
        file: &Loaded<FileWire>,
        directory: Option<EntityId>,
        payload: &Payload,
    ) -> ImportResult<()> {
        let update = (file.wire.last_update, file.wire.last_update_by.clone());

        if let Some(live) = find_identity_match(config.files(), file.id, Some(file.source_id)).map(|f| f.id) {
            config.move_file(live, directory)?;
            let clash = config
                .files_in(directory)
                .into_iter()
                .find(|f| f.id != live && f.name == file.name())
                .map(|f| f.id);
            if let Some(clash) = clash {
                rename_existing(config, ctx, clash)?;
            }
            config.rename_file(live, file.name())?;
            config.set_source_id(KIND, live, Some(file.source_id))?;
            // Move the old blob first so the upload replaces it in place.
            relocate_blob(config, ctx, live)?;
            store_payload(config, ctx, live, payload)?;
            config.set_file_update(live, update.0, update.1)?;
            ctx.report.updated(KIND);
            debug!(id = %live, name = file.name(), "updated file");
            return Ok(());
        }

        let sibling = config
            .files_in(directory)
            .into_iter()
            .find(|f| f.name == file.name())
            .map(|f| f.id);
        if let Some(sibling) = sibling {
            rename_existing(config, ctx, sibling)?;
        }

        let mut fresh = ProjectFile::new(config.project(), file.id, file.name()).with_source(file.source_id);
        fresh.directory = directory;
        fresh.last_update = update.0;
        fresh.last_update_by = update.1;
        config.insert_file(fresh)?;
        store_payload(config, ctx, file.id, payload)?;
        ctx.report.inserted(KIND);
        debug!(id = %file.id, name = file.name(), "inserted file");
        Ok(())
    }
}

/// Upload a payload to the file's current path and record it.
fn store_payload(
    config: &mut ProjectConfiguration,
    ctx: &ImportContext<'_>,
    id: EntityId,
    payload: &Payload,
) -> ImportResult<()> {
    let metadata = BlobMetadata::new(config.project(), id, config.file_path(id)?, payload.size);
    let object_ref = ctx.blobs.upload(&metadata, &payload.path)?;
    config.set_file_content(
        id,
        Some(FileContent {
            object_ref,
            size: payload.size,
        }),
    )?;
    Ok(())
}

fn rename_existing(
    config: &mut ProjectConfiguration,
    ctx: &mut ImportContext<'_>,
    id: EntityId,
) -> ImportResult<()> {
    let Some(existing) = config.file(id) else {
        return Ok(());
    };
    let from = existing.name.clone();
    let taken: Vec<String> = config
        .files_in(existing.directory)
        .iter()
        .map(|f| f.name.clone())
        .collect();
    let to = ctx.namer.file_conflict_name(&from, |n| taken.iter().any(|t| t == n));

    config.rename_file(id, to.clone())?;
    ctx.journal_rename(RenameRecord {
        kind: KIND,
        id,
        from,
        to,
        side: RenameSide::Existing,
    });
    relocate_blob(config, ctx, id)
}

/// Move a live file's blob to the file's current path.
///
/// A blob the store no longer has is reported as a warning and left alone.
pub(crate) fn relocate_blob(
    config: &mut ProjectConfiguration,
    ctx: &mut ImportContext<'_>,
    id: EntityId,
) -> ImportResult<()> {
    let Some(content) = config.file(id).and_then(|f| f.content.clone()) else {
        return Ok(());
    };
    let metadata = BlobMetadata::new(config.project(), id, config.file_path(id)?, content.size);
    if metadata.object_ref()? == content.object_ref {
        return Ok(());
    }
    let object_ref = match ctx.blobs.rename(&content.object_ref, &metadata) {
        Ok(object_ref) => object_ref,
        Err(StoreError::NotFound(missing)) => {
            ctx.report.warn(format!("file {id}: blob {missing} is missing, not relocated"));
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    config.set_file_content(
        id,
        Some(FileContent {
            object_ref,
            size: content.size,
        }),
    )?;
    Ok(())
}

/// Bring blobs back in line with a project restored after a failed merge.
///
/// `failed` is the project as the merge left it, so its file contents say
/// where each blob is now. Every file whose restored reference differs is
/// pointed at that location and relocated to its restored path.
pub(crate) fn restore_blob_paths(
    config: &mut ProjectConfiguration,
    failed: &ProjectConfiguration,
    ctx: &mut ImportContext<'_>,
) {
    let moved: Vec<(EntityId, FileContent)> = config
        .files()
        .values()
        .filter_map(|f| {
            let restored = f.content.as_ref()?;
            let actual = failed.file(f.id)?.content.clone()?;
            (actual.object_ref != restored.object_ref).then_some((f.id, actual))
        })
        .collect();
    for (id, actual) in moved {
        let result = config
            .set_file_content(id, Some(actual))
            .map_err(ImportError::from)
            .and_then(|()| relocate_blob(config, ctx, id));
        if let Err(err) = result {
            warn!(file = %id, error = %err, "blob not restored");
            ctx.report.warn(format!("file {id}: blob not restored after rollback: {err}"));
        }
    }
}

impl EntityMerger for FileMerger {
    fn kind(&self) -> EntityKind {
        KIND
    }

    /// Directories that only exist in the archive's directory batch are
    /// accepted here, since they are imported before files.
    fn validate(&self, config: &ProjectConfiguration, ctx: &ImportContext<'_>) -> ImportResult<Validation> {
        let batch = ctx.loader().load::<FileWire>()?;
        let directories = ctx.loader().load::<DirectoryWire>()?;
        let mut validation = Validation::new(KIND);

        for file in &batch {
            if let Err(err) = Self::resolve_directory(config, &ctx.resolver, file) {
                let pending = file.wire.directory.is_some_and(|reference| {
                    let candidates = ctx.resolver.candidates(reference);
                    directories.iter().any(|d| d.answers_to(&candidates))
                });
                if !pending {
                    validation.issues.push(err);
                }
            }
            if let Err(err) = Self::locate_payload(ctx, file) {
                validation.issues.push(err);
            }
            validation.affected.push(
                find_identity_match(config.files(), file.id, Some(file.source_id))
                    .map(|f| f.id)
                    .unwrap_or(file.id),
            );
        }
        Ok(validation)
    }

    fn import(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        commit_atomically(KIND, config, ctx, |config, ctx| self.merge(config, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryMerger;
    use crate::testing::{context, id, project, ArchiveFixture};
    use opgraph_model::ProjectDirectory;
    use opgraph_store::{BlobStore, InMemoryBlobStore};

    fn expected_ref(key: &str, file: EntityId, size: u64) -> opgraph_types::ObjectRef {
        BlobMetadata::new(crate::testing::PROJECT, file, key, size)
            .object_ref()
            .unwrap()
    }

    #[test]
    fn inserts_file_and_uploads_payload() {
        let fx = ArchiveFixture::new();
        fx.directory(id(1), "docs", None);
        fx.file(id(2), "a.txt", Some(id(1)), b"hello");
        let blobs = InMemoryBlobStore::new();
        let mut config = project();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);

        DirectoryMerger.import(&mut config, &mut ctx).unwrap();
        FileMerger.import(&mut config, &mut ctx).unwrap();

        let file = config.file(id(2)).unwrap();
        assert_eq!(file.directory, Some(id(1)));
        assert_eq!(file.source_id, Some(id(2)));
        assert_eq!(file.last_update_by.as_deref(), Some("exporter"));
        let content = file.content.clone().unwrap();
        assert_eq!(content.size, 5);
        assert_eq!(content.object_ref, expected_ref("docs/a.txt", id(2), 5));
        assert_eq!(blobs.get(&content.object_ref).unwrap().unwrap().data, b"hello");
        assert_eq!(config.directory(id(1)).unwrap().files, vec![id(2)]);
    }

    #[test]
    fn reimport_updates_in_place() {
        let fx = ArchiveFixture::new();
        fx.file(id(2), "a.txt", None, b"v1");
        let blobs = InMemoryBlobStore::new();
        let mut config = project();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        FileMerger.import(&mut config, &mut ctx).unwrap();

        fx.file(id(2), "a.txt", None, b"v2-longer");
        let mut ctx = context(&reader, &blobs);
        FileMerger.import(&mut config, &mut ctx).unwrap();

        assert_eq!(config.count(KIND), 1);
        assert_eq!(ctx.report.counters(KIND).updated, 1);
        assert_eq!(ctx.report.counters(KIND).inserted, 0);
        let content = config.file(id(2)).unwrap().content.clone().unwrap();
        assert_eq!(content.size, 9);
        assert_eq!(blobs.get(&content.object_ref).unwrap().unwrap().data, b"v2-longer");
        assert_eq!(blobs.len(), 1);
    }

    #[test]
    fn matched_file_moves_to_new_directory() {
        let mut config = project();
        let p = config.project();
        config.insert_directory(ProjectDirectory::new(p, id(1), "A")).unwrap();
        config.insert_directory(ProjectDirectory::new(p, id(3), "B")).unwrap();
        config
            .insert_file(ProjectFile::new(p, id(2), "a.txt").in_directory(id(1)))
            .unwrap();

        let fx = ArchiveFixture::new();
        fx.file(id(2), "a.txt", Some(id(3)), b"x");
        let blobs = InMemoryBlobStore::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        FileMerger.import(&mut config, &mut ctx).unwrap();

        assert_eq!(config.file(id(2)).unwrap().directory, Some(id(3)));
        assert!(config.directory(id(1)).unwrap().files.is_empty());
        assert_eq!(config.directory(id(3)).unwrap().files, vec![id(2)]);
    }

    #[test]
    fn collision_renames_existing_before_extension() {
        let mut config = project();
        let p = config.project();
        let blobs = InMemoryBlobStore::new();
        let object_ref = blobs
            .put(&BlobMetadata::new(p, id(9), "run.log", 3), b"old".to_vec())
            .unwrap();
        config
            .insert_file(ProjectFile::new(p, id(9), "run.log").with_content(FileContent { object_ref, size: 3 }))
            .unwrap();

        let fx = ArchiveFixture::new();
        fx.file(id(2), "run.log", None, b"new");
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        FileMerger.import(&mut config, &mut ctx).unwrap();

        let old = config.file(id(9)).unwrap();
        assert_eq!(old.name, "run_ImportConflict_T.log");
        let old_content = old.content.clone().unwrap();
        assert_eq!(old_content.object_ref, expected_ref("run_ImportConflict_T.log", id(9), 3));
        assert_eq!(blobs.get(&old_content.object_ref).unwrap().unwrap().data, b"old");

        let new = config.file(id(2)).unwrap();
        assert_eq!(new.name, "run.log");
        let new_content = new.content.clone().unwrap();
        assert_eq!(blobs.get(&new_content.object_ref).unwrap().unwrap().data, b"new");
        assert_eq!(ctx.report.renames[0].side, RenameSide::Existing);
    }

    fn live_file(config: &mut ProjectConfiguration, blobs: &InMemoryBlobStore, file: EntityId, name: &str, data: &[u8]) {
        let p = config.project();
        let size = data.len() as u64;
        let object_ref = blobs.put(&BlobMetadata::new(p, file, name, size), data.to_vec()).unwrap();
        config
            .insert_file(ProjectFile::new(p, file, name).with_content(FileContent { object_ref, size }))
            .unwrap();
    }

    #[test]
    fn matched_rename_onto_live_sibling_renames_the_sibling() {
        let mut config = project();
        let blobs = InMemoryBlobStore::new();
        live_file(&mut config, &blobs, id(1), "a.txt", b"KEEP");
        live_file(&mut config, &blobs, id(2), "b.txt", b"OLD");

        let fx = ArchiveFixture::new();
        fx.file(id(2), "a.txt", None, b"OTHER");
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        FileMerger.import(&mut config, &mut ctx).unwrap();

        let sibling = config.file(id(1)).unwrap();
        assert_eq!(sibling.name, "a_ImportConflict_T.txt");
        let sibling_ref = sibling.content.clone().unwrap().object_ref;
        assert_eq!(sibling_ref, expected_ref("a_ImportConflict_T.txt", id(1), 4));
        assert_eq!(blobs.get(&sibling_ref).unwrap().unwrap().data, b"KEEP");

        let matched = config.file(id(2)).unwrap();
        assert_eq!(matched.name, "a.txt");
        let matched_ref = matched.content.clone().unwrap().object_ref;
        assert_eq!(blobs.get(&matched_ref).unwrap().unwrap().data, b"OTHER");

        assert_eq!(blobs.all_refs().unwrap().len(), 2);
        assert_eq!(ctx.report.renames.len(), 1);
        assert_eq!(ctx.report.renames[0].id, id(1));
        assert!(config.check_invariants().is_empty());
    }

    #[test]
    fn matched_rename_leaves_no_blob_behind() {
        let mut config = project();
        let blobs = InMemoryBlobStore::new();
        live_file(&mut config, &blobs, id(2), "b.txt", b"OLD");

        let fx = ArchiveFixture::new();
        fx.file(id(2), "c.txt", None, b"NEW");
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        FileMerger.import(&mut config, &mut ctx).unwrap();

        let renamed = expected_ref("c.txt", id(2), 3);
        assert_eq!(blobs.all_refs().unwrap(), vec![renamed.clone()]);
        assert_eq!(config.file(id(2)).unwrap().content.clone().unwrap().object_ref, renamed);
        assert_eq!(blobs.get(&renamed).unwrap().unwrap().data, b"NEW");
    }

    #[test]
    fn missing_payload_aborts_kind() {
        let fx = ArchiveFixture::new();
        fx.file(id(1), "ok.txt", None, b"ok");
        fx.file_without_content(id(2), "gone.txt", None);
        let blobs = InMemoryBlobStore::new();
        let mut config = project();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);

        let err = FileMerger.import(&mut config, &mut ctx).unwrap_err();
        assert!(matches!(err, ImportError::MissingContent { id: missing, .. } if missing == id(2)));
        assert_eq!(config.count(KIND), 0);
        assert_eq!(ctx.report.counters(KIND).inserted, 0);
    }

    #[test]
    fn validate_accepts_directories_from_the_batch() {
        let fx = ArchiveFixture::new();
        fx.directory(id(1), "docs", None);
        fx.file(id(2), "a.txt", Some(id(1)), b"a");
        fx.file(id(3), "b.txt", Some(id(99)), b"b");
        let blobs = InMemoryBlobStore::new();
        let config = project();
        let reader = fx.reader();
        let ctx = context(&reader, &blobs);

        let validation = FileMerger.validate(&config, &ctx).unwrap();
        assert_eq!(validation.affected, vec![id(2), id(3)]);
        assert!(matches!(
            validation.issues.as_slice(),
            [ImportError::ParentNotFound { id: bad, .. }] if *bad == id(3)
        ));
        assert!(blobs.is_empty());
    }

    #[test]
    fn relocation_of_missing_blob_warns() {
        let mut config = project();
        let p = config.project();
        let blobs = InMemoryBlobStore::new();
        let dangling = BlobMetadata::new(p, id(9), "x.txt", 1).object_ref().unwrap();
        config
            .insert_file(ProjectFile::new(p, id(9), "x.txt").with_content(FileContent {
                object_ref: dangling.clone(),
                size: 1,
            }))
            .unwrap();

        let fx = ArchiveFixture::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        relocate_blob(&mut config, &mut ctx, id(9)).unwrap();

        assert_eq!(ctx.report.warnings.len(), 1);
        assert_eq!(config.file(id(9)).unwrap().content.as_ref().unwrap().object_ref, dangling);
    }
}

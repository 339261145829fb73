//! Directory merging.
//!
//! Parents resolve against the live tree first and the batch second. On a
//! name collision, the live directory is renamed and every file below it
//! has its blob moved to the new path. A matched directory that is renamed
//! or moved takes the blobs of its files along the same way.

use opgraph_archive::DirectoryWire;
use opgraph_model::{ProjectConfiguration, ProjectDirectory};
use opgraph_types::{EntityId, EntityKind};
use tracing::debug;

use crate::context::ImportContext;
use crate::error::{ImportError, ImportResult};
use crate::file::relocate_blob;
use crate::identity::{find_identity_match, IdentityResolver};
use crate::loader::Loaded;
use crate::merger::{commit_atomically, EntityMerger, Validation};
use crate::report::{RenameRecord, RenameSide};

const KIND: EntityKind = EntityKind::Directory;

/// Where a batch entry's parent comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParentRef {
    Root,
    Live(EntityId),
    Batch(usize),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Visiting,
    Done,
}

#[derive(Debug, Default)]
pub struct DirectoryMerger;

impl DirectoryMerger {
    fn resolve_parent(
        config: &ProjectConfiguration,
        resolver: &IdentityResolver,
        batch: &[Loaded<DirectoryWire>],
        index: usize,
    ) -> ImportResult<ParentRef> {
        let dir = &batch[index];
        let Some(reference) = dir.wire.parent_directory else {
            return Ok(ParentRef::Root);
        };
        if let Some(live) = resolver.resolve(reference, config.directories()) {
            return Ok(ParentRef::Live(live.id));
        }
        let candidates = resolver.candidates(reference);
        if let Some(j) = batch.iter().position(|d| d.answers_to(&candidates)) {
            return Ok(ParentRef::Batch(j));
        }
        Err(ImportError::ParentNotFound {
            kind: KIND,
            id: dir.id,
            name: dir.name().to_string(),
            parent: reference,
        })
    }

    /// Parents-first order over in-batch parent links.
    fn merge_order(batch: &[Loaded<DirectoryWire>], parents: &[ParentRef]) -> ImportResult<Vec<usize>> {
        fn visit(
            i: usize,
            batch: &[Loaded<DirectoryWire>],
            parents: &[ParentRef],
            marks: &mut [Mark],
            order: &mut Vec<usize>,
        ) -> ImportResult<()> {
            match marks[i] {
                Mark::Done => return Ok(()),
                Mark::Visiting => {
                    return Err(ImportError::CyclicReference {
                        kind: KIND,
                        id: batch[i].id,
                        parent: batch[i].wire.parent_directory.unwrap_or(batch[i].id),
                    })
                }
                Mark::New => {}
            }
            marks[i] = Mark::Visiting;
            if let ParentRef::Batch(j) = parents[i] {
                visit(j, batch, parents, marks, order)?;
            }
            marks[i] = Mark::Done;
            order.push(i);
            Ok(())
        }

        let mut marks = vec![Mark::New; batch.len()];
        let mut order = Vec::with_capacity(batch.len());
        for i in 0..batch.len() {
            visit(i, batch, parents, &mut marks, &mut order)?;
        }
        Ok(order)
    }

    fn merge(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        let batch = ctx.loader().load::<DirectoryWire>()?;
        let parents = (0..batch.len())
            .map(|i| Self::resolve_parent(config, &ctx.resolver, &batch, i))
            .collect::<ImportResult<Vec<_>>>()?;
        let order = Self::merge_order(&batch, &parents)?;

        let mut merged: Vec<Option<EntityId>> = vec![None; batch.len()];
        for i in order {
            let parent = match parents[i] {
                ParentRef::Root => None,
                ParentRef::Live(id) => Some(id),
                ParentRef::Batch(j) => Some(merged[j].ok_or_else(|| ImportError::ParentNotFound {
                    kind: KIND,
                    id: batch[i].id,
                    name: batch[i].name().to_string(),
                    parent: batch[j].id,
                })?),
            };
            merged[i] = Some(Self::merge_one(config, ctx, &batch[i], parent)?);
        }
        Ok(())
    }

    fn merge_one(
        config: &mut ProjectConfiguration,
        ctx: &mut ImportContext<'_>,
        dir: &Loaded<DirectoryWire>,
        parent: Option<EntityId>,
    ) -> ImportResult<EntityId> {
        if let Some(live) = find_identity_match(config.directories(), dir.id, Some(dir.source_id)).map(|d| d.id) {
            let before = config.directory_path(live)?;
            config
                .move_directory(live, parent)
                .map_err(ImportError::from_move)?;
            let clash = config
                .child_directories(parent)
                .into_iter()
                .find(|d| d.id != live && d.name == dir.name())
                .map(|d| d.id);
            if let Some(clash) = clash {
                rename_existing(config, ctx, clash)?;
            }
            config.rename_directory(live, dir.name())?;
            config.set_source_id(KIND, live, Some(dir.source_id))?;
            if config.directory_path(live)? != before {
                for file in config.files_in_subtree(live) {
                    relocate_blob(config, ctx, file)?;
                }
            }
            ctx.report.updated(KIND);
            debug!(id = %live, name = dir.name(), "updated directory");
            return Ok(live);
        }

        let sibling = config
            .child_directories(parent)
            .into_iter()
            .find(|d| d.name == dir.name())
            .map(|d| d.id);
        if let Some(sibling) = sibling {
            rename_existing(config, ctx, sibling)?;
        }

        let mut fresh = ProjectDirectory::new(config.project(), dir.id, dir.name())
            .with_source(dir.source_id);
        fresh.parent = parent;
        config.insert_directory(fresh)?;
        ctx.report.inserted(KIND);
        debug!(id = %dir.id, name = dir.name(), "inserted directory");
        Ok(dir.id)
    }
}

/// Rename a live directory out of the way and move the blobs of every file
/// in its subtree to the new paths.
fn rename_existing(
    config: &mut ProjectConfiguration,
    ctx: &mut ImportContext<'_>,
    id: EntityId,
) -> ImportResult<()> {
    let Some(existing) = config.directory(id) else {
        return Ok(());
    };
    let from = existing.name.clone();
    let taken: Vec<String> = config
        .child_directories(existing.parent)
        .iter()
        .map(|d| d.name.clone())
        .collect();
    let to = ctx.namer.conflict_name(&from, |n| taken.iter().any(|t| t == n));

    config.rename_directory(id, to.clone())?;
    ctx.journal_rename(RenameRecord {
        kind: KIND,
        id,
        from,
        to,
        side: RenameSide::Existing,
    });
    for file in config.files_in_subtree(id) {
        relocate_blob(config, ctx, file)?;
    }
    Ok(())
}

impl EntityMerger for DirectoryMerger {
    fn kind(&self) -> EntityKind {
        KIND
    }

    fn validate(&self, config: &ProjectConfiguration, ctx: &ImportContext<'_>) -> ImportResult<Validation> {
        let batch = ctx.loader().load::<DirectoryWire>()?;
        let mut validation = Validation::new(KIND);
        let mut parents = Vec::with_capacity(batch.len());
        for i in 0..batch.len() {
            match Self::resolve_parent(config, &ctx.resolver, &batch, i) {
                Ok(parent) => parents.push(parent),
                Err(err) => {
                    validation.issues.push(err);
                    parents.push(ParentRef::Root);
                }
            }
        }
        if let Err(err) = Self::merge_order(&batch, &parents) {
            validation.issues.push(err);
        }
        validation.affected = batch
            .iter()
            .map(|d| {
                find_identity_match(config.directories(), d.id, Some(d.source_id))
                    .map(|m| m.id)
                    .unwrap_or(d.id)
            })
            .collect();
        Ok(validation)
    }

    fn import(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        commit_atomically(KIND, config, ctx, |config, ctx| self.merge(config, ctx))
    }
}

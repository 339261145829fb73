use opgraph_model::ProjectConfiguration;
use opgraph_types::{EntityId, EntityKind};
use tracing::warn;

use crate::context::ImportContext;
use crate::error::{ImportError, ImportResult};
use crate::file::restore_blob_paths;
use crate::report::{RenameRecord, RenameSide};

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Result of a dry run for one kind.
#[derive(Debug)]
pub struct Validation {
    pub kind: EntityKind,
    /// Live ids that would be updated plus ids that would be inserted.
    pub affected: Vec<EntityId>,
    /// One entry per entity that would fail to import.
    pub issues: Vec<ImportError>,
}

impl Validation {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            affected: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// A validation that could not run at all.
    pub fn failed(kind: EntityKind, error: ImportError) -> Self {
        Self {
            kind,
            affected: Vec::new(),
            issues: vec![error],
        }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EntityMerger trait
// ---------------------------------------------------------------------------

/// Merges one entity kind from an archive into a project.
///
/// Every implementation resolves the whole batch before it touches the
/// project. `validate` runs the resolution only and collects issues;
/// `import` stops at the first failure and leaves the project as it was,
/// except for conflict renames of live entities, which are kept.
///
/// The trait is object-safe so mergers can be stored in a
/// `Vec<Box<dyn EntityMerger>>`.
pub trait EntityMerger: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn validate(
        &self,
        config: &ProjectConfiguration,
        ctx: &ImportContext<'_>,
    ) -> ImportResult<Validation>;

    fn import(
        &self,
        config: &mut ProjectConfiguration,
        ctx: &mut ImportContext<'_>,
    ) -> ImportResult<()>;
}

/// Run `merge` so that a failure restores the project to its state before
/// the call. Conflict renames journaled during the call are re-applied on
/// top of the restored state, and blobs moved by the call follow the
/// restored paths.
pub(crate) fn commit_atomically<F>(
    kind: EntityKind,
    config: &mut ProjectConfiguration,
    ctx: &mut ImportContext<'_>,
    merge: F,
) -> ImportResult<()>
where
    F: FnOnce(&mut ProjectConfiguration, &mut ImportContext<'_>) -> ImportResult<()>,
{
    let snapshot = config.clone();
    let report = ctx.report.clone();
    let pending = ctx.pending_compounds.clone();
    let mark = ctx.journal.len();

    match merge(config, ctx) {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!(%kind, error = %err, "merge failed, restoring project");
            let failed = std::mem::replace(config, snapshot);
            ctx.report = report;
            ctx.pending_compounds = pending;
            ctx.replay_journal(config, mark);
            restore_blob_paths(config, &failed, ctx);
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Shared merge steps
// ---------------------------------------------------------------------------

/// Name an inserted entity takes when `taken` reports a collision.
///
/// Sections, compounds and processes rename the incoming side; the rename
/// is reported but not journaled, since the entity only exists if the kind
/// commits.
pub(crate) fn incoming_name(
    ctx: &mut ImportContext<'_>,
    kind: EntityKind,
    id: EntityId,
    name: &str,
    taken: impl Fn(&str) -> bool,
) -> String {
    if !taken(name) {
        return name.to_string();
    }
    let to = ctx.namer.conflict_name(name, &taken);
    ctx.report.renamed(RenameRecord {
        kind,
        id,
        from: name.to_string(),
        to: to.clone(),
        side: RenameSide::Incoming,
    });
    to
}

/// Resolve archived section references against the live project.
///
/// Unknown sections are skipped with a report warning.
pub(crate) fn resolve_sections(
    config: &ProjectConfiguration,
    ctx: &mut ImportContext<'_>,
    owner: (EntityKind, EntityId),
    references: &[EntityId],
) -> Vec<EntityId> {
    let mut resolved = Vec::with_capacity(references.len());
    for &reference in references {
        match ctx.resolver.resolve(reference, config.sections()) {
            Some(section) if !resolved.contains(&section.id) => resolved.push(section.id),
            Some(_) => {}
            None => ctx.report.warn(format!(
                "{} {}: section {reference} not found, membership skipped",
                owner.0, owner.1
            )),
        }
    }
    resolved
}

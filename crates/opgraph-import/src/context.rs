use std::collections::BTreeMap;

use opgraph_archive::ArchiveReader;
use opgraph_model::ProjectConfiguration;
use opgraph_store::BlobStore;
use opgraph_types::EntityId;
use tracing::warn;

use crate::identity::IdentityResolver;
use crate::loader::EntityLoader;
use crate::naming::ConflictNamer;
use crate::report::{ImportReport, RenameRecord};

/// Everything a merger needs besides the project itself.
pub struct ImportContext<'a> {
    pub archive: &'a ArchiveReader,
    pub blobs: &'a dyn BlobStore,
    pub resolver: IdentityResolver,
    pub namer: ConflictNamer,
    pub report: ImportReport,
    /// Compound id → archived process references not yet applied.
    pub(crate) pending_compounds: BTreeMap<EntityId, Vec<EntityId>>,
    /// Conflict renames of live entities, which survive a rollback.
    pub(crate) journal: Vec<RenameRecord>,
}

impl<'a> ImportContext<'a> {
    pub fn new(
        archive: &'a ArchiveReader,
        blobs: &'a dyn BlobStore,
        resolver: IdentityResolver,
        namer: ConflictNamer,
    ) -> Self {
        let report = ImportReport::new(namer.token().as_str());
        Self {
            archive,
            blobs,
            resolver,
            namer,
            report,
            pending_compounds: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    pub fn loader(&self) -> EntityLoader<'_> {
        EntityLoader::new(self.archive, &self.resolver)
    }

    /// Compounds whose process lists wait for the process batch.
    pub fn pending_compounds(&self) -> &BTreeMap<EntityId, Vec<EntityId>> {
        &self.pending_compounds
    }

    pub fn into_report(self) -> ImportReport {
        self.report
    }

    /// Record a rename in the report and the journal.
    pub(crate) fn journal_rename(&mut self, record: RenameRecord) {
        self.journal.push(record.clone());
        self.report.renamed(record);
    }

    /// Re-apply journaled renames from `from` onwards to a restored project.
    ///
    /// Renames of entities the restore removed are skipped.
    pub(crate) fn replay_journal(&mut self, config: &mut ProjectConfiguration, from: usize) {
        for record in &self.journal[from..] {
            if !config.contains(record.kind, record.id) {
                continue;
            }
            match config.rename(record.kind, record.id, record.to.clone()) {
                Ok(()) => self.report.renamed(record.clone()),
                Err(err) => warn!(kind = %record.kind, id = %record.id, error = %err, "rename not replayed"),
            }
        }
    }
}

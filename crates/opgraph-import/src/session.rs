use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use opgraph_archive::ArchiveReader;
use opgraph_model::ProjectConfiguration;
use opgraph_store::BlobStore;
use opgraph_types::{EntityId, EntityKind, ImportToken, ProjectId};
use tracing::{debug, error, info};

use crate::compound::CompoundMerger;
use crate::config::ImportConfig;
use crate::context::ImportContext;
use crate::directory::DirectoryMerger;
use crate::error::{ImportError, ImportResult};
use crate::file::{restore_blob_paths, FileMerger};
use crate::identity::IdentityResolver;
use crate::merger::{EntityMerger, Validation};
use crate::naming::ConflictNamer;
use crate::process::ProcessMerger;
use crate::report::ImportReport;
use crate::section::SectionMerger;
use crate::singleton::SingletonMerger;

// ---------------------------------------------------------------------------
// ImportRequest
// ---------------------------------------------------------------------------

/// What to import.
#[derive(Clone, Debug)]
pub struct ImportRequest {
    /// Root of an unpacked archive.
    pub archive: PathBuf,
    /// Replacement map. `None` reads the map shipped with the archive.
    pub replacements: Option<BTreeMap<EntityId, EntityId>>,
    /// Fixed conflict token. `None` mints one from the config.
    pub token: Option<ImportToken>,
}

impl ImportRequest {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            replacements: None,
            token: None,
        }
    }

    pub fn with_replacements(mut self, replacements: BTreeMap<EntityId, EntityId>) -> Self {
        self.replacements = Some(replacements);
        self
    }

    pub fn with_token(mut self, token: ImportToken) -> Self {
        self.token = Some(token);
        self
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// Dry-run results for every kind, in merge order.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub validations: Vec<Validation>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.validations.iter().all(Validation::is_clean)
    }

    pub fn issue_count(&self) -> usize {
        self.validations.iter().map(|v| v.issues.len()).sum()
    }

    pub fn issues(&self) -> impl Iterator<Item = (EntityKind, &ImportError)> {
        self.validations
            .iter()
            .flat_map(|v| v.issues.iter().map(move |issue| (v.kind, issue)))
    }

    pub fn affected(&self, kind: EntityKind) -> &[EntityId] {
        self.validations
            .iter()
            .find(|v| v.kind == kind)
            .map(|v| v.affected.as_slice())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Runs a pipeline of mergers over one archive.
///
/// Mergers run in the order they were added; [`Self::with_default_mergers`]
/// uses [`EntityKind::MERGE_ORDER`].
pub struct Importer {
    mergers: Vec<Box<dyn EntityMerger>>,
    config: ImportConfig,
}

impl Importer {
    /// An importer with an empty pipeline.
    pub fn new(config: ImportConfig) -> Self {
        Self {
            mergers: Vec::new(),
            config,
        }
    }

    /// Directories, files, sections, compounds, processes, then the three
    /// singleton kinds.
    pub fn with_default_mergers(config: ImportConfig) -> Self {
        let mut importer = Self::new(config);
        for kind in EntityKind::MERGE_ORDER {
            let merger: Box<dyn EntityMerger> = match kind {
                EntityKind::Directory => Box::new(DirectoryMerger),
                EntityKind::File => Box::new(FileMerger),
                EntityKind::Section => Box::new(SectionMerger),
                EntityKind::Compound => Box::new(CompoundMerger),
                EntityKind::Process => Box::new(ProcessMerger),
                singleton => match SingletonMerger::new(singleton) {
                    Some(merger) => Box::new(merger),
                    None => continue,
                },
            };
            importer.add_merger(merger);
        }
        importer
    }

    pub fn add_merger(&mut self, merger: Box<dyn EntityMerger>) {
        self.mergers.push(merger);
    }

    pub fn merger_count(&self) -> usize {
        self.mergers.len()
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    fn open(&self, request: &ImportRequest) -> ImportResult<(ArchiveReader, IdentityResolver, ConflictNamer)> {
        let archive = ArchiveReader::open(&request.archive)?;
        let replacements = match &request.replacements {
            Some(map) => map.clone(),
            None => archive.read_replacements()?,
        };
        let token = match &request.token {
            Some(token) => token.clone(),
            None => self.config.mint_token()?,
        };
        let namer = ConflictNamer::new(self.config.conflict_marker.clone(), token);
        Ok((archive, IdentityResolver::new(replacements), namer))
    }

    fn validate_all(&self, config: &ProjectConfiguration, ctx: &ImportContext<'_>) -> ValidationReport {
        let validations = self
            .mergers
            .iter()
            .map(|merger| {
                merger
                    .validate(config, ctx)
                    .unwrap_or_else(|err| Validation::failed(merger.kind(), err))
            })
            .collect();
        ValidationReport { validations }
    }

    /// Resolve every kind against `config` without changing anything.
    ///
    /// Each kind validates against the project as it is now; references to
    /// entities that an earlier kind of the same archive would create are
    /// only tolerated where the merger allows it (files in new directories).
    pub fn validate(
        &self,
        config: &ProjectConfiguration,
        request: &ImportRequest,
        blobs: &dyn BlobStore,
    ) -> ImportResult<ValidationReport> {
        let (archive, resolver, namer) = self.open(request)?;
        let ctx = ImportContext::new(&archive, blobs, resolver, namer);
        let report = self.validate_all(config, &ctx);
        debug!(issues = report.issue_count(), "validation finished");
        Ok(report)
    }

    /// Import every kind into `config`.
    ///
    /// A failing kind leaves itself unapplied. Kinds merged before it stay
    /// applied unless `atomic_session` is set, in which case the whole
    /// project is restored. Conflict renames of live directories and files
    /// survive either way.
    pub fn import(
        &self,
        config: &mut ProjectConfiguration,
        request: &ImportRequest,
        blobs: &dyn BlobStore,
    ) -> ImportResult<ImportReport> {
        let (archive, resolver, namer) = self.open(request)?;
        let mut ctx = ImportContext::new(&archive, blobs, resolver, namer);
        info!(
            project = %config.project(),
            archive = %request.archive.display(),
            token = %ctx.namer.token(),
            "import started"
        );

        if self.config.validate_before_import {
            let report = self.validate_all(config, &ctx);
            let first = report.issues().next().map(|(kind, issue)| format!("{kind}: {issue}"));
            if let Some(first) = first {
                let err = ImportError::ValidationFailed {
                    count: report.issue_count(),
                    first,
                };
                error!(error = %err, "import refused");
                return Err(err);
            }
        }

        let snapshot = self.config.atomic_session.then(|| config.clone());
        for merger in &self.mergers {
            if let Err(err) = merger.import(config, &mut ctx) {
                error!(kind = %merger.kind(), error = %err, "import failed");
                if let Some(snapshot) = snapshot {
                    let failed = std::mem::replace(config, snapshot);
                    ctx.replay_journal(config, 0);
                    restore_blob_paths(config, &failed, &mut ctx);
                }
                return Err(err);
            }
        }

        let report = ctx.into_report();
        info!(
            inserted = report.total_inserted(),
            updated = report.total_updated(),
            renamed = report.renames.len(),
            warnings = report.warnings.len(),
            "import finished"
        );
        Ok(report)
    }

    /// [`Self::import`] while holding the project's lock in `locks`.
    pub fn import_locked(
        &self,
        locks: &ProjectLocks,
        config: &mut ProjectConfiguration,
        request: &ImportRequest,
        blobs: &dyn BlobStore,
    ) -> ImportResult<ImportReport> {
        let project = config.project();
        locks.with_project(project, || self.import(config, request, blobs))?
    }
}

// ---------------------------------------------------------------------------
// ProjectLocks
// ---------------------------------------------------------------------------

/// One named lock per project. Everything that mutates a project's
/// configuration should run inside [`ProjectLocks::with_project`].
#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<ProjectId, Arc<Mutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, project: ProjectId) -> ImportResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| ImportError::LockPoisoned(project))?;
        Ok(Arc::clone(locks.entry(project).or_default()))
    }

    /// Run `f` while holding `project`'s lock.
    pub fn with_project<T>(&self, project: ProjectId, f: impl FnOnce() -> T) -> ImportResult<T> {
        let lock = self.lock_for(project)?;
        let _guard = lock.lock().map_err(|_| ImportError::LockPoisoned(project))?;
        debug!(%project, "project lock held");
        Ok(f())
    }
}

//! The project configuration aggregate.
//!
//! # Invariants
//!
//! 1. Every entity's `project` field equals the owning project id.
//! 2. A child's `parent` (or a file's `directory`) is listed in the parent's
//!    child list, and every id in a child list points back.
//! 3. Directory and section trees are acyclic.
//! 4. Compound/process and section/compound/process memberships are
//!    recorded on both sides.
//!
//! All mutators preserve these. A failed mutation leaves the graph untouched.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use opgraph_types::{EntityId, EntityKind, ProjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::entity::{
    CompoundConfiguration, FileContent, ProcessConfiguration, ProjectDirectory, ProjectFile,
    SectionConfiguration, SingletonConfiguration,
};
use crate::error::{ModelError, ModelResult};

/// All configuration entities of one project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfiguration {
    project: ProjectId,
    #[serde(default)]
    directories: BTreeMap<EntityId, ProjectDirectory>,
    #[serde(default)]
    files: BTreeMap<EntityId, ProjectFile>,
    #[serde(default)]
    sections: BTreeMap<EntityId, SectionConfiguration>,
    #[serde(default)]
    compounds: BTreeMap<EntityId, CompoundConfiguration>,
    #[serde(default)]
    processes: BTreeMap<EntityId, ProcessConfiguration>,
    #[serde(default)]
    common: Option<SingletonConfiguration>,
    #[serde(default)]
    header: Option<SingletonConfiguration>,
    #[serde(default)]
    pot_header: Option<SingletonConfiguration>,
}

impl ProjectConfiguration {
    /// Create an empty configuration for `project`.
    pub fn new(project: ProjectId) -> Self {
        Self {
            project,
            directories: BTreeMap::new(),
            files: BTreeMap::new(),
            sections: BTreeMap::new(),
            compounds: BTreeMap::new(),
            processes: BTreeMap::new(),
            common: None,
            header: None,
            pot_header: None,
        }
    }

    pub fn project(&self) -> ProjectId {
        self.project
    }

    pub fn directories(&self) -> &BTreeMap<EntityId, ProjectDirectory> {
        &self.directories
    }

    pub fn files(&self) -> &BTreeMap<EntityId, ProjectFile> {
        &self.files
    }

    pub fn sections(&self) -> &BTreeMap<EntityId, SectionConfiguration> {
        &self.sections
    }

    pub fn compounds(&self) -> &BTreeMap<EntityId, CompoundConfiguration> {
        &self.compounds
    }

    pub fn processes(&self) -> &BTreeMap<EntityId, ProcessConfiguration> {
        &self.processes
    }

    pub fn directory(&self, id: EntityId) -> Option<&ProjectDirectory> {
        self.directories.get(&id)
    }

    pub fn file(&self, id: EntityId) -> Option<&ProjectFile> {
        self.files.get(&id)
    }

    pub fn section(&self, id: EntityId) -> Option<&SectionConfiguration> {
        self.sections.get(&id)
    }

    pub fn compound(&self, id: EntityId) -> Option<&CompoundConfiguration> {
        self.compounds.get(&id)
    }

    pub fn process(&self, id: EntityId) -> Option<&ProcessConfiguration> {
        self.processes.get(&id)
    }

    /// Whether an entity of `kind` with `id` exists.
    ///
    /// Singleton kinds match on the singleton's own id, if it has one.
    pub fn contains(&self, kind: EntityKind, id: EntityId) -> bool {
        match kind {
            EntityKind::Directory => self.directories.contains_key(&id),
            EntityKind::File => self.files.contains_key(&id),
            EntityKind::Section => self.sections.contains_key(&id),
            EntityKind::Compound => self.compounds.contains_key(&id),
            EntityKind::Process => self.processes.contains_key(&id),
            _ => self
                .singleton(kind)
                .ok()
                .flatten()
                .is_some_and(|s| s.id == Some(id)),
        }
    }

    /// Current name of a non-singleton entity.
    pub fn name_of(&self, kind: EntityKind, id: EntityId) -> Option<&str> {
        match kind {
            EntityKind::Directory => self.directories.get(&id).map(|e| e.name.as_str()),
            EntityKind::File => self.files.get(&id).map(|e| e.name.as_str()),
            EntityKind::Section => self.sections.get(&id).map(|e| e.name.as_str()),
            EntityKind::Compound => self.compounds.get(&id).map(|e| e.name.as_str()),
            EntityKind::Process => self.processes.get(&id).map(|e| e.name.as_str()),
            _ => None,
        }
    }

    /// Number of entities of `kind` (0 or 1 for singletons).
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Directory => self.directories.len(),
            EntityKind::File => self.files.len(),
            EntityKind::Section => self.sections.len(),
            EntityKind::Compound => self.compounds.len(),
            EntityKind::Process => self.processes.len(),
            _ => usize::from(self.singleton(kind).ok().flatten().is_some()),
        }
    }

    /// Total number of entities across all kinds.
    pub fn entity_count(&self) -> usize {
        EntityKind::MERGE_ORDER.iter().map(|k| self.count(*k)).sum()
    }

    // -----------------------------------------------------------------------
    // Shared mutators
    // -----------------------------------------------------------------------

    /// Rename a non-singleton entity.
    pub fn rename(&mut self, kind: EntityKind, id: EntityId, name: impl Into<String>) -> ModelResult<()> {
        let name = name.into();
        let slot = match kind {
            EntityKind::Directory => self.directories.get_mut(&id).map(|e| &mut e.name),
            EntityKind::File => self.files.get_mut(&id).map(|e| &mut e.name),
            EntityKind::Section => self.sections.get_mut(&id).map(|e| &mut e.name),
            EntityKind::Compound => self.compounds.get_mut(&id).map(|e| &mut e.name),
            EntityKind::Process => self.processes.get_mut(&id).map(|e| &mut e.name),
            _ => None,
        };
        let slot = slot.ok_or(ModelError::NotFound { kind, id })?;
        if *slot != name {
            debug!(%kind, %id, from = %slot, to = %name, "renamed entity");
            *slot = name;
        }
        Ok(())
    }

    pub fn rename_directory(&mut self, id: EntityId, name: impl Into<String>) -> ModelResult<()> {
        self.rename(EntityKind::Directory, id, name)
    }

    pub fn rename_file(&mut self, id: EntityId, name: impl Into<String>) -> ModelResult<()> {
        self.rename(EntityKind::File, id, name)
    }

    pub fn rename_section(&mut self, id: EntityId, name: impl Into<String>) -> ModelResult<()> {
        self.rename(EntityKind::Section, id, name)
    }

    /// Record (or clear) the origin id of a non-singleton entity.
    pub fn set_source_id(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        source_id: Option<EntityId>,
    ) -> ModelResult<()> {
        let slot = match kind {
            EntityKind::Directory => self.directories.get_mut(&id).map(|e| &mut e.source_id),
            EntityKind::File => self.files.get_mut(&id).map(|e| &mut e.source_id),
            EntityKind::Section => self.sections.get_mut(&id).map(|e| &mut e.source_id),
            EntityKind::Compound => self.compounds.get_mut(&id).map(|e| &mut e.source_id),
            EntityKind::Process => self.processes.get_mut(&id).map(|e| &mut e.source_id),
            _ => None,
        };
        *slot.ok_or(ModelError::NotFound { kind, id })? = source_id;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Directories
    // -----------------------------------------------------------------------

    /// Insert a directory under its `parent` (or as a root).
    ///
    /// The child lists of `directory` are ignored; children attach
    /// themselves when they are inserted.
    pub fn insert_directory(&mut self, mut directory: ProjectDirectory) -> ModelResult<()> {
        let id = directory.id;
        if self.directories.contains_key(&id) {
            return Err(ModelError::Duplicate {
                kind: EntityKind::Directory,
                id,
            });
        }
        if let Some(parent) = directory.parent {
            let parent_dir = self.directories.get_mut(&parent).ok_or(ModelError::NotFound {
                kind: EntityKind::Directory,
                id: parent,
            })?;
            attach(&mut parent_dir.directories, id);
        }
        directory.project = self.project;
        directory.directories.clear();
        directory.files.clear();
        debug!(%id, name = %directory.name, parent = ?directory.parent, "inserted directory");
        self.directories.insert(id, directory);
        Ok(())
    }

    /// Re-parent a directory. `None` makes it a root.
    pub fn move_directory(&mut self, id: EntityId, new_parent: Option<EntityId>) -> ModelResult<()> {
        let old_parent = self
            .directories
            .get(&id)
            .ok_or(ModelError::NotFound {
                kind: EntityKind::Directory,
                id,
            })?
            .parent;
        if old_parent == new_parent {
            return Ok(());
        }
        if let Some(parent) = new_parent {
            if !self.directories.contains_key(&parent) {
                return Err(ModelError::NotFound {
                    kind: EntityKind::Directory,
                    id: parent,
                });
            }
            let limit = self.directories.len();
            if creates_cycle(id, parent, limit, |d| self.directories.get(&d).and_then(|x| x.parent)) {
                return Err(ModelError::Cycle {
                    kind: EntityKind::Directory,
                    id,
                    parent,
                });
            }
        }

        if let Some(old) = old_parent.and_then(|p| self.directories.get_mut(&p)) {
            detach(&mut old.directories, id);
        }
        if let Some(new) = new_parent.and_then(|p| self.directories.get_mut(&p)) {
            attach(&mut new.directories, id);
        }
        if let Some(dir) = self.directories.get_mut(&id) {
            dir.parent = new_parent;
        }
        debug!(%id, from = ?old_parent, to = ?new_parent, "moved directory");
        Ok(())
    }

    /// Directories directly under `parent` (`None` for roots).
    pub fn child_directories(&self, parent: Option<EntityId>) -> Vec<&ProjectDirectory> {
        match parent {
            Some(p) => self
                .directories
                .get(&p)
                .map(|d| d.directories.iter().filter_map(|c| self.directories.get(c)).collect())
                .unwrap_or_default(),
            None => self.directories.values().filter(|d| d.parent.is_none()).collect(),
        }
    }

    /// Files directly in `directory` (`None` for files outside any directory).
    pub fn files_in(&self, directory: Option<EntityId>) -> Vec<&ProjectFile> {
        match directory {
            Some(d) => self
                .directories
                .get(&d)
                .map(|dir| dir.files.iter().filter_map(|f| self.files.get(f)).collect())
                .unwrap_or_default(),
            None => self.files.values().filter(|f| f.directory.is_none()).collect(),
        }
    }

    /// Slash-joined path of a directory from its root, e.g. `Docs/Setup`.
    pub fn directory_path(&self, id: EntityId) -> ModelResult<String> {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        let mut steps = 0;
        while let Some(current) = cursor {
            let dir = self.directories.get(&current).ok_or(ModelError::NotFound {
                kind: EntityKind::Directory,
                id: current,
            })?;
            segments.push(dir.name.as_str());
            steps += 1;
            if steps > self.directories.len() {
                return Err(ModelError::Cycle {
                    kind: EntityKind::Directory,
                    id,
                    parent: current,
                });
            }
            cursor = dir.parent;
        }
        segments.reverse();
        Ok(segments.join("/"))
    }

    /// Storage path of a file: its directory path followed by its name.
    pub fn file_path(&self, id: EntityId) -> ModelResult<String> {
        let file = self.files.get(&id).ok_or(ModelError::NotFound {
            kind: EntityKind::File,
            id,
        })?;
        match file.directory {
            Some(dir) => Ok(format!("{}/{}", self.directory_path(dir)?, file.name)),
            None => Ok(file.name.clone()),
        }
    }

    /// `id` and every directory below it, breadth first.
    pub fn subtree_directories(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let Some(dir) = self.directories.get(&current) else {
                continue;
            };
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            queue.extend(dir.directories.iter().copied());
        }
        out
    }

    /// Every file stored in `id` or any directory below it.
    pub fn files_in_subtree(&self, id: EntityId) -> Vec<EntityId> {
        self.subtree_directories(id)
            .into_iter()
            .filter_map(|d| self.directories.get(&d))
            .flat_map(|d| d.files.iter().copied())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Insert a file into its `directory`.
    pub fn insert_file(&mut self, mut file: ProjectFile) -> ModelResult<()> {
        let id = file.id;
        if self.files.contains_key(&id) {
            return Err(ModelError::Duplicate {
                kind: EntityKind::File,
                id,
            });
        }
        if let Some(directory) = file.directory {
            let dir = self.directories.get_mut(&directory).ok_or(ModelError::NotFound {
                kind: EntityKind::Directory,
                id: directory,
            })?;
            attach(&mut dir.files, id);
        }
        file.project = self.project;
        debug!(%id, name = %file.name, directory = ?file.directory, "inserted file");
        self.files.insert(id, file);
        Ok(())
    }

    /// Move a file to another directory.
    pub fn move_file(&mut self, id: EntityId, directory: Option<EntityId>) -> ModelResult<()> {
        let old = self
            .files
            .get(&id)
            .ok_or(ModelError::NotFound {
                kind: EntityKind::File,
                id,
            })?
            .directory;
        if old == directory {
            return Ok(());
        }
        if let Some(target) = directory {
            if !self.directories.contains_key(&target) {
                return Err(ModelError::NotFound {
                    kind: EntityKind::Directory,
                    id: target,
                });
            }
        }
        if let Some(dir) = old.and_then(|d| self.directories.get_mut(&d)) {
            detach(&mut dir.files, id);
        }
        if let Some(dir) = directory.and_then(|d| self.directories.get_mut(&d)) {
            attach(&mut dir.files, id);
        }
        if let Some(file) = self.files.get_mut(&id) {
            file.directory = directory;
        }
        debug!(%id, from = ?old, to = ?directory, "moved file");
        Ok(())
    }

    pub fn set_file_content(&mut self, id: EntityId, content: Option<FileContent>) -> ModelResult<()> {
        self.file_mut(id)?.content = content;
        Ok(())
    }

    pub fn set_file_update(
        &mut self,
        id: EntityId,
        at: Option<DateTime<Utc>>,
        by: Option<String>,
    ) -> ModelResult<()> {
        let file = self.file_mut(id)?;
        file.last_update = at;
        file.last_update_by = by;
        Ok(())
    }

    fn file_mut(&mut self, id: EntityId) -> ModelResult<&mut ProjectFile> {
        self.files.get_mut(&id).ok_or(ModelError::NotFound {
            kind: EntityKind::File,
            id,
        })
    }

    // -----------------------------------------------------------------------
    // Sections
    // -----------------------------------------------------------------------

    /// Insert a section under its `parent` (or as a root).
    ///
    /// Child and membership lists are ignored; use the link helpers.
    pub fn insert_section(&mut self, mut section: SectionConfiguration) -> ModelResult<()> {
        let id = section.id;
        if self.sections.contains_key(&id) {
            return Err(ModelError::Duplicate {
                kind: EntityKind::Section,
                id,
            });
        }
        if let Some(parent) = section.parent {
            let parent_section = self.sections.get_mut(&parent).ok_or(ModelError::NotFound {
                kind: EntityKind::Section,
                id: parent,
            })?;
            attach(&mut parent_section.sections, id);
        }
        section.project = self.project;
        section.sections.clear();
        section.compounds.clear();
        section.processes.clear();
        debug!(%id, name = %section.name, parent = ?section.parent, "inserted section");
        self.sections.insert(id, section);
        Ok(())
    }

    /// Re-parent a section. `None` makes it a root.
    pub fn move_section(&mut self, id: EntityId, new_parent: Option<EntityId>) -> ModelResult<()> {
        let old_parent = self
            .sections
            .get(&id)
            .ok_or(ModelError::NotFound {
                kind: EntityKind::Section,
                id,
            })?
            .parent;
        if old_parent == new_parent {
            return Ok(());
        }
        if let Some(parent) = new_parent {
            if !self.sections.contains_key(&parent) {
                return Err(ModelError::NotFound {
                    kind: EntityKind::Section,
                    id: parent,
                });
            }
            let limit = self.sections.len();
            if creates_cycle(id, parent, limit, |s| self.sections.get(&s).and_then(|x| x.parent)) {
                return Err(ModelError::Cycle {
                    kind: EntityKind::Section,
                    id,
                    parent,
                });
            }
        }

        if let Some(old) = old_parent.and_then(|p| self.sections.get_mut(&p)) {
            detach(&mut old.sections, id);
        }
        if let Some(new) = new_parent.and_then(|p| self.sections.get_mut(&p)) {
            attach(&mut new.sections, id);
        }
        if let Some(section) = self.sections.get_mut(&id) {
            section.parent = new_parent;
        }
        debug!(%id, from = ?old_parent, to = ?new_parent, "moved section");
        Ok(())
    }

    pub fn set_section_place(&mut self, id: EntityId, place: u32) -> ModelResult<()> {
        self.sections
            .get_mut(&id)
            .ok_or(ModelError::NotFound {
                kind: EntityKind::Section,
                id,
            })?
            .place = place;
        Ok(())
    }

    /// Sections directly under `parent`, ordered by place then name.
    pub fn child_sections(&self, parent: Option<EntityId>) -> Vec<&SectionConfiguration> {
        let mut children: Vec<&SectionConfiguration> = match parent {
            Some(p) => self
                .sections
                .get(&p)
                .map(|s| s.sections.iter().filter_map(|c| self.sections.get(c)).collect())
                .unwrap_or_default(),
            None => self.sections.values().filter(|s| s.parent.is_none()).collect(),
        };
        children.sort_by(|a, b| a.place.cmp(&b.place).then_with(|| a.name.cmp(&b.name)));
        children
    }

    /// Record that `compound` belongs to `section`. Returns `false` if it
    /// already did.
    pub fn link_section_compound(&mut self, section: EntityId, compound: EntityId) -> ModelResult<bool> {
        if !self.compounds.contains_key(&compound) {
            return Err(ModelError::NotFound {
                kind: EntityKind::Compound,
                id: compound,
            });
        }
        let sec = self.sections.get_mut(&section).ok_or(ModelError::NotFound {
            kind: EntityKind::Section,
            id: section,
        })?;
        let added = attach(&mut sec.compounds, compound);
        if let Some(c) = self.compounds.get_mut(&compound) {
            attach(&mut c.sections, section);
        }
        Ok(added)
    }

    /// Record that `process` belongs to `section`. Returns `false` if it
    /// already did.
    pub fn link_section_process(&mut self, section: EntityId, process: EntityId) -> ModelResult<bool> {
        if !self.processes.contains_key(&process) {
            return Err(ModelError::NotFound {
                kind: EntityKind::Process,
                id: process,
            });
        }
        let sec = self.sections.get_mut(&section).ok_or(ModelError::NotFound {
            kind: EntityKind::Section,
            id: section,
        })?;
        let added = attach(&mut sec.processes, process);
        if let Some(p) = self.processes.get_mut(&process) {
            attach(&mut p.sections, section);
        }
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // Compounds and processes
    // -----------------------------------------------------------------------

    /// Insert a compound. Membership lists are ignored.
    pub fn insert_compound(&mut self, mut compound: CompoundConfiguration) -> ModelResult<()> {
        let id = compound.id;
        if self.compounds.contains_key(&id) {
            return Err(ModelError::Duplicate {
                kind: EntityKind::Compound,
                id,
            });
        }
        compound.project = self.project;
        compound.processes.clear();
        compound.sections.clear();
        debug!(%id, name = %compound.name, "inserted compound");
        self.compounds.insert(id, compound);
        Ok(())
    }

    pub fn set_compound_refer_to_input(&mut self, id: EntityId, value: Option<Value>) -> ModelResult<()> {
        self.compounds
            .get_mut(&id)
            .ok_or(ModelError::NotFound {
                kind: EntityKind::Compound,
                id,
            })?
            .refer_to_input = value;
        Ok(())
    }

    /// Replace the ordered process list of a compound.
    ///
    /// Processes gaining the compound record it; processes dropped from the
    /// list forget it. Duplicate entries in `processes` are kept, since a
    /// compound may run the same process twice.
    pub fn set_compound_processes(&mut self, compound: EntityId, processes: Vec<EntityId>) -> ModelResult<()> {
        if !self.compounds.contains_key(&compound) {
            return Err(ModelError::NotFound {
                kind: EntityKind::Compound,
                id: compound,
            });
        }
        if let Some(missing) = processes.iter().find(|p| !self.processes.contains_key(p)) {
            return Err(ModelError::NotFound {
                kind: EntityKind::Process,
                id: *missing,
            });
        }

        let old = match self.compounds.get_mut(&compound) {
            Some(c) => std::mem::replace(&mut c.processes, processes.clone()),
            None => Vec::new(),
        };
        for dropped in old.iter().filter(|p| !processes.contains(p)) {
            if let Some(p) = self.processes.get_mut(dropped) {
                detach(&mut p.compounds, compound);
            }
        }
        for kept in &processes {
            if let Some(p) = self.processes.get_mut(kept) {
                attach(&mut p.compounds, compound);
            }
        }
        debug!(%compound, count = processes.len(), "set compound processes");
        Ok(())
    }

    /// Insert a process. Membership lists are ignored.
    pub fn insert_process(&mut self, mut process: ProcessConfiguration) -> ModelResult<()> {
        let id = process.id;
        if self.processes.contains_key(&id) {
            return Err(ModelError::Duplicate {
                kind: EntityKind::Process,
                id,
            });
        }
        process.project = self.project;
        process.sections.clear();
        process.compounds.clear();
        debug!(%id, name = %process.name, "inserted process");
        self.processes.insert(id, process);
        Ok(())
    }

    pub fn set_process_settings(&mut self, id: EntityId, settings: Value) -> ModelResult<()> {
        self.processes
            .get_mut(&id)
            .ok_or(ModelError::NotFound {
                kind: EntityKind::Process,
                id,
            })?
            .settings = settings;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Singletons
    // -----------------------------------------------------------------------

    pub fn singleton(&self, kind: EntityKind) -> ModelResult<Option<&SingletonConfiguration>> {
        Ok(match kind {
            EntityKind::CommonConfiguration => self.common.as_ref(),
            EntityKind::HeaderConfiguration => self.header.as_ref(),
            EntityKind::PotHeaderConfiguration => self.pot_header.as_ref(),
            other => return Err(ModelError::NotSingleton(other)),
        })
    }

    /// Replace a singleton wholesale, returning the previous value.
    pub fn replace_singleton(
        &mut self,
        kind: EntityKind,
        value: Option<SingletonConfiguration>,
    ) -> ModelResult<Option<SingletonConfiguration>> {
        let project = self.project;
        let slot = match kind {
            EntityKind::CommonConfiguration => &mut self.common,
            EntityKind::HeaderConfiguration => &mut self.header,
            EntityKind::PotHeaderConfiguration => &mut self.pot_header,
            other => return Err(ModelError::NotSingleton(other)),
        };
        let value = value.map(|mut v| {
            v.project = project;
            v
        });
        debug!(%kind, present = value.is_some(), "replaced singleton");
        Ok(std::mem::replace(slot, value))
    }
}

/// Append `id` unless present. Returns whether it was added.
fn attach(list: &mut Vec<EntityId>, id: EntityId) -> bool {
    if list.contains(&id) {
        false
    } else {
        list.push(id);
        true
    }
}

fn detach(list: &mut Vec<EntityId>, id: EntityId) {
    list.retain(|x| *x != id);
}

/// Whether `id` is `candidate` or one of its ancestors.
///
/// A chain longer than `limit` is already cyclic and counts as one.
fn creates_cycle(
    id: EntityId,
    candidate: EntityId,
    limit: usize,
    parent_of: impl Fn(EntityId) -> Option<EntityId>,
) -> bool {
    let mut cursor = Some(candidate);
    let mut steps = 0;
    while let Some(current) = cursor {
        if current == id || steps > limit {
            return true;
        }
        steps += 1;
        cursor = parent_of(current);
    }
    false
}

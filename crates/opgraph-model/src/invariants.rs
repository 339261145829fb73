//! Structural consistency checks over a project configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use opgraph_types::{EntityId, EntityKind, ProjectId};
use serde::{Deserialize, Serialize};

use crate::project::ProjectConfiguration;

/// One broken relationship found by [`ProjectConfiguration::check_invariants`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// The entity's owner differs from the project holding it.
    ForeignOwner {
        kind: EntityKind,
        id: EntityId,
        owner: ProjectId,
    },
    /// A reference field names an entity that does not exist.
    Dangling {
        kind: EntityKind,
        id: EntityId,
        field: String,
        target: EntityId,
    },
    /// One side of a two-sided relationship is missing.
    Unmirrored {
        kind: EntityKind,
        id: EntityId,
        field: String,
        target: EntityId,
    },
    /// The entity is its own ancestor.
    Cycle { kind: EntityKind, id: EntityId },
    /// Two siblings under the same parent share a name.
    DuplicateSiblingName {
        kind: EntityKind,
        parent: Option<EntityId>,
        name: String,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignOwner { kind, id, owner } => {
                write!(f, "{kind} {id} is owned by project {owner}")
            }
            Self::Dangling {
                kind,
                id,
                field,
                target,
            } => write!(f, "{kind} {id}: `{field}` references missing {target}"),
            Self::Unmirrored {
                kind,
                id,
                field,
                target,
            } => write!(f, "{kind} {id}: `{field}` entry {target} is not mirrored"),
            Self::Cycle { kind, id } => write!(f, "{kind} {id} is its own ancestor"),
            Self::DuplicateSiblingName { kind, parent, name } => match parent {
                Some(parent) => write!(f, "{kind} name `{name}` repeats under {parent}"),
                None => write!(f, "{kind} name `{name}` repeats among roots"),
            },
        }
    }
}

impl ProjectConfiguration {
    /// Walk every relationship and report the ones that are broken.
    ///
    /// An empty result means the graph is consistent.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();
        self.check_owners(&mut out);
        self.check_directories(&mut out);
        self.check_files(&mut out);
        self.check_sections(&mut out);
        self.check_compounds(&mut out);
        self.check_processes(&mut out);
        out
    }

    fn check_owners(&self, out: &mut Vec<InvariantViolation>) {
        let project = self.project();
        let owners = self
            .directories()
            .values()
            .map(|e| (EntityKind::Directory, e.id, e.project))
            .chain(self.files().values().map(|e| (EntityKind::File, e.id, e.project)))
            .chain(self.sections().values().map(|e| (EntityKind::Section, e.id, e.project)))
            .chain(self.compounds().values().map(|e| (EntityKind::Compound, e.id, e.project)))
            .chain(self.processes().values().map(|e| (EntityKind::Process, e.id, e.project)));
        for (kind, id, owner) in owners {
            if owner != project {
                out.push(InvariantViolation::ForeignOwner { kind, id, owner });
            }
        }
    }

    fn check_directories(&self, out: &mut Vec<InvariantViolation>) {
        const KIND: EntityKind = EntityKind::Directory;
        for dir in self.directories().values() {
            if let Some(parent) = dir.parent {
                match self.directory(parent) {
                    None => out.push(dangling(KIND, dir.id, "parent", parent)),
                    Some(p) if !p.directories.contains(&dir.id) => {
                        out.push(unmirrored(KIND, dir.id, "parent", parent))
                    }
                    Some(_) => {}
                }
            }
            for child in &dir.directories {
                match self.directory(*child) {
                    None => out.push(dangling(KIND, dir.id, "directories", *child)),
                    Some(c) if c.parent != Some(dir.id) => {
                        out.push(unmirrored(KIND, dir.id, "directories", *child))
                    }
                    Some(_) => {}
                }
            }
            for file in &dir.files {
                match self.file(*file) {
                    None => out.push(dangling(KIND, dir.id, "files", *file)),
                    Some(f) if f.directory != Some(dir.id) => {
                        out.push(unmirrored(KIND, dir.id, "files", *file))
                    }
                    Some(_) => {}
                }
            }
            if self.has_cycle(dir.id, |id| self.directory(id).and_then(|d| d.parent)) {
                out.push(InvariantViolation::Cycle { kind: KIND, id: dir.id });
            }
        }
        duplicate_names(
            KIND,
            self.directories().values().map(|d| (d.parent, d.name.as_str())),
            out,
        );
    }

    fn check_files(&self, out: &mut Vec<InvariantViolation>) {
        for file in self.files().values() {
            if let Some(dir) = file.directory {
                match self.directory(dir) {
                    None => out.push(dangling(EntityKind::File, file.id, "directory", dir)),
                    Some(d) if !d.files.contains(&file.id) => {
                        out.push(unmirrored(EntityKind::File, file.id, "directory", dir))
                    }
                    Some(_) => {}
                }
            }
        }
        // Two files with one path would share a blob.
        duplicate_names(
            EntityKind::File,
            self.files().values().map(|f| (f.directory, f.name.as_str())),
            out,
        );
    }

    fn check_sections(&self, out: &mut Vec<InvariantViolation>) {
        const KIND: EntityKind = EntityKind::Section;
        for section in self.sections().values() {
            if let Some(parent) = section.parent {
                match self.section(parent) {
                    None => out.push(dangling(KIND, section.id, "parent", parent)),
                    Some(p) if !p.sections.contains(&section.id) => {
                        out.push(unmirrored(KIND, section.id, "parent", parent))
                    }
                    Some(_) => {}
                }
            }
            for child in &section.sections {
                match self.section(*child) {
                    None => out.push(dangling(KIND, section.id, "sections", *child)),
                    Some(c) if c.parent != Some(section.id) => {
                        out.push(unmirrored(KIND, section.id, "sections", *child))
                    }
                    Some(_) => {}
                }
            }
            for compound in &section.compounds {
                match self.compound(*compound) {
                    None => out.push(dangling(KIND, section.id, "compounds", *compound)),
                    Some(c) if !c.sections.contains(&section.id) => {
                        out.push(unmirrored(KIND, section.id, "compounds", *compound))
                    }
                    Some(_) => {}
                }
            }
            for process in &section.processes {
                match self.process(*process) {
                    None => out.push(dangling(KIND, section.id, "processes", *process)),
                    Some(p) if !p.sections.contains(&section.id) => {
                        out.push(unmirrored(KIND, section.id, "processes", *process))
                    }
                    Some(_) => {}
                }
            }
            if self.has_cycle(section.id, |id| self.section(id).and_then(|s| s.parent)) {
                out.push(InvariantViolation::Cycle { kind: KIND, id: section.id });
            }
        }

        duplicate_names(
            KIND,
            self.sections().values().map(|s| (s.parent, s.name.as_str())),
            out,
        );
    }

    fn check_compounds(&self, out: &mut Vec<InvariantViolation>) {
        const KIND: EntityKind = EntityKind::Compound;
        for compound in self.compounds().values() {
            let distinct: BTreeSet<EntityId> = compound.processes.iter().copied().collect();
            for process in distinct {
                match self.process(process) {
                    None => out.push(dangling(KIND, compound.id, "processes", process)),
                    Some(p) if !p.compounds.contains(&compound.id) => {
                        out.push(unmirrored(KIND, compound.id, "processes", process))
                    }
                    Some(_) => {}
                }
            }
            for section in &compound.sections {
                match self.section(*section) {
                    None => out.push(dangling(KIND, compound.id, "sections", *section)),
                    Some(s) if !s.compounds.contains(&compound.id) => {
                        out.push(unmirrored(KIND, compound.id, "sections", *section))
                    }
                    Some(_) => {}
                }
            }
        }
    }

    fn check_processes(&self, out: &mut Vec<InvariantViolation>) {
        const KIND: EntityKind = EntityKind::Process;
        for process in self.processes().values() {
            for compound in &process.compounds {
                match self.compound(*compound) {
                    None => out.push(dangling(KIND, process.id, "compounds", *compound)),
                    Some(c) if !c.processes.contains(&process.id) => {
                        out.push(unmirrored(KIND, process.id, "compounds", *compound))
                    }
                    Some(_) => {}
                }
            }
            for section in &process.sections {
                match self.section(*section) {
                    None => out.push(dangling(KIND, process.id, "sections", *section)),
                    Some(s) if !s.processes.contains(&process.id) => {
                        out.push(unmirrored(KIND, process.id, "sections", *section))
                    }
                    Some(_) => {}
                }
            }
        }
    }

    fn has_cycle(&self, start: EntityId, parent_of: impl Fn(EntityId) -> Option<EntityId>) -> bool {
        let mut seen = BTreeSet::from([start]);
        let mut cursor = parent_of(start);
        while let Some(current) = cursor {
            if !seen.insert(current) {
                return true;
            }
            cursor = parent_of(current);
        }
        false
    }
}

fn duplicate_names<'a>(
    kind: EntityKind,
    siblings: impl Iterator<Item = (Option<EntityId>, &'a str)>,
    out: &mut Vec<InvariantViolation>,
) {
    let mut names: BTreeMap<(Option<EntityId>, &str), usize> = BTreeMap::new();
    for key in siblings {
        *names.entry(key).or_default() += 1;
    }
    for ((parent, name), count) in names {
        if count > 1 {
            out.push(InvariantViolation::DuplicateSiblingName {
                kind,
                parent,
                name: name.to_string(),
            });
        }
    }
}

fn dangling(kind: EntityKind, id: EntityId, field: &str, target: EntityId) -> InvariantViolation {
    InvariantViolation::Dangling {
        kind,
        id,
        field: field.to_string(),
        target,
    }
}

fn unmirrored(kind: EntityKind, id: EntityId, field: &str, target: EntityId) -> InvariantViolation {
    InvariantViolation::Unmirrored {
        kind,
        id,
        field: field.to_string(),
        target,
    }
}

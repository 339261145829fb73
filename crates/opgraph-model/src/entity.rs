//! Entity types stored in a project configuration.
//!
//! Every entity carries two identifiers: `id`, which is its identity inside
//! this project, and `source_id`, which records the identifier it had in the
//! project it was imported from. Locally created entities have no source id.

use chrono::{DateTime, Utc};
use opgraph_types::{EntityId, EntityKind, ObjectRef, ProjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Common accessors over every non-singleton entity.
pub trait Identified {
    /// The kind this entity type represents.
    const KIND: EntityKind;

    fn id(&self) -> EntityId;
    fn source_id(&self) -> Option<EntityId>;
    fn name(&self) -> &str;
}

macro_rules! impl_identified {
    ($ty:ty, $kind:expr) => {
        impl Identified for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> EntityId {
                self.id
            }

            fn source_id(&self) -> Option<EntityId> {
                self.source_id
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Directories and files
// ---------------------------------------------------------------------------

/// A node in the project's directory tree.
///
/// `parent == None` marks a root directory. `directories` and `files` mirror
/// the `parent` and `directory` fields of the children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectDirectory {
    pub id: EntityId,
    pub source_id: Option<EntityId>,
    pub name: String,
    pub project: ProjectId,
    pub parent: Option<EntityId>,
    #[serde(default)]
    pub directories: Vec<EntityId>,
    #[serde(default)]
    pub files: Vec<EntityId>,
}

impl ProjectDirectory {
    pub fn new(project: ProjectId, id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            source_id: None,
            name: name.into(),
            project,
            parent: None,
            directories: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_source(mut self, source_id: EntityId) -> Self {
        self.source_id = Some(source_id);
        self
    }
}

/// Stored content of a project file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub object_ref: ObjectRef,
    pub size: u64,
}

/// A file stored in one directory of the project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub id: EntityId,
    pub source_id: Option<EntityId>,
    pub name: String,
    pub project: ProjectId,
    pub directory: Option<EntityId>,
    pub content: Option<FileContent>,
    pub last_update: Option<DateTime<Utc>>,
    pub last_update_by: Option<String>,
}

impl ProjectFile {
    pub fn new(project: ProjectId, id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            source_id: None,
            name: name.into(),
            project,
            directory: None,
            content: None,
            last_update: None,
            last_update_by: None,
        }
    }

    pub fn in_directory(mut self, directory: EntityId) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_source(mut self, source_id: EntityId) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn with_content(mut self, content: FileContent) -> Self {
        self.content = Some(content);
        self
    }
}

// ---------------------------------------------------------------------------
// Sections, compounds, processes
// ---------------------------------------------------------------------------

/// A node in the section tree. Sections group compounds and processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionConfiguration {
    pub id: EntityId,
    pub source_id: Option<EntityId>,
    pub name: String,
    pub project: ProjectId,
    pub parent: Option<EntityId>,
    #[serde(default)]
    pub sections: Vec<EntityId>,
    /// Ordering position among siblings.
    #[serde(default)]
    pub place: u32,
    #[serde(default)]
    pub compounds: Vec<EntityId>,
    #[serde(default)]
    pub processes: Vec<EntityId>,
}

impl SectionConfiguration {
    pub fn new(project: ProjectId, id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            source_id: None,
            name: name.into(),
            project,
            parent: None,
            sections: Vec::new(),
            place: 0,
            compounds: Vec::new(),
            processes: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_source(mut self, source_id: EntityId) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn at_place(mut self, place: u32) -> Self {
        self.place = place;
        self
    }
}

/// A compound: an ordered sequence of processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompoundConfiguration {
    pub id: EntityId,
    pub source_id: Option<EntityId>,
    pub name: String,
    pub project: ProjectId,
    pub refer_to_input: Option<Value>,
    /// Ordered; the position of a process is meaningful.
    #[serde(default)]
    pub processes: Vec<EntityId>,
    #[serde(default)]
    pub sections: Vec<EntityId>,
}

impl CompoundConfiguration {
    pub fn new(project: ProjectId, id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            source_id: None,
            name: name.into(),
            project,
            refer_to_input: None,
            processes: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn with_source(mut self, source_id: EntityId) -> Self {
        self.source_id = Some(source_id);
        self
    }
}

/// A process step with free-form settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfiguration {
    pub id: EntityId,
    pub source_id: Option<EntityId>,
    pub name: String,
    pub project: ProjectId,
    #[serde(default)]
    pub settings: Value,
    #[serde(default)]
    pub sections: Vec<EntityId>,
    #[serde(default)]
    pub compounds: Vec<EntityId>,
}

impl ProcessConfiguration {
    pub fn new(project: ProjectId, id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            source_id: None,
            name: name.into(),
            project,
            settings: Value::Null,
            sections: Vec::new(),
            compounds: Vec::new(),
        }
    }

    pub fn with_source(mut self, source_id: EntityId) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }
}

/// Common, header, or proof-of-testing header configuration.
///
/// A project holds at most one of each; they are replaced wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SingletonConfiguration {
    pub id: Option<EntityId>,
    pub project: ProjectId,
    #[serde(default)]
    pub settings: Value,
}

impl SingletonConfiguration {
    pub fn new(project: ProjectId, settings: Value) -> Self {
        Self {
            id: None,
            project,
            settings,
        }
    }
}

impl_identified!(ProjectDirectory, EntityKind::Directory);
impl_identified!(ProjectFile, EntityKind::File);
impl_identified!(SectionConfiguration, EntityKind::Section);
impl_identified!(CompoundConfiguration, EntityKind::Compound);
impl_identified!(ProcessConfiguration, EntityKind::Process);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identified_exposes_both_id_spaces() {
        let project = ProjectId::new();
        let origin = EntityId::from_u128(7);
        let dir = ProjectDirectory::new(project, EntityId::from_u128(1), "Docs").with_source(origin);

        assert_eq!(dir.id(), EntityId::from_u128(1));
        assert_eq!(dir.source_id(), Some(origin));
        assert_eq!(dir.name(), "Docs");
        assert_eq!(<ProjectDirectory as Identified>::KIND, EntityKind::Directory);
    }

    #[test]
    fn builders_set_relationships() {
        let project = ProjectId::new();
        let parent = EntityId::from_u128(1);
        let section = SectionConfiguration::new(project, EntityId::from_u128(2), "S")
            .with_parent(parent)
            .at_place(3);
        assert_eq!(section.parent, Some(parent));
        assert_eq!(section.place, 3);

        let file = ProjectFile::new(project, EntityId::from_u128(3), "a.txt").in_directory(parent);
        assert_eq!(file.directory, Some(parent));
        assert!(file.content.is_none());
    }

    #[test]
    fn membership_lists_default_when_absent() {
        let json = serde_json::json!({
            "id": EntityId::from_u128(1),
            "source_id": null,
            "name": "P",
            "project": ProjectId::from_u128(9),
        });
        let process: ProcessConfiguration = serde_json::from_value(json).unwrap();
        assert!(process.sections.is_empty());
        assert!(process.compounds.is_empty());
        assert_eq!(process.settings, Value::Null);
    }
}

//! Wire documents as they appear in an export archive.
//!
//! Field names are camelCase. Reference fields carry ids as they were at
//! export time; translating them is the importer's job.

use chrono::{DateTime, Utc};
use opgraph_types::{EntityId, EntityKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A per-entity wire document.
pub trait WireEntity: DeserializeOwned + Serialize {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;
    fn name(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryWire {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_directory: Option<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWire {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionWire {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_section: Option<EntityId>,
    #[serde(default)]
    pub place: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundWire {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refer_to_input: Option<Value>,
    #[serde(default)]
    pub sections: Vec<EntityId>,
    /// Ordered.
    #[serde(default)]
    pub processes: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessWire {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub process_settings: Value,
    #[serde(default)]
    pub sections: Vec<EntityId>,
}

/// Common, header, or proof-of-testing header configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingletonWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub settings: Value,
}

macro_rules! impl_wire_entity {
    ($ty:ty, $kind:expr) => {
        impl WireEntity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> EntityId {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

impl_wire_entity!(DirectoryWire, EntityKind::Directory);
impl_wire_entity!(FileWire, EntityKind::File);
impl_wire_entity!(SectionWire, EntityKind::Section);
impl_wire_entity!(CompoundWire, EntityKind::Compound);
impl_wire_entity!(ProcessWire, EntityKind::Process);

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The closed set of entity kinds that make up a project configuration.
///
/// The variant order matches the dependency order in which an import merges
/// them: containers before their contents, sections before the compounds and
/// processes that hang off them, singletons last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Directory,
    File,
    Section,
    Compound,
    Process,
    CommonConfiguration,
    HeaderConfiguration,
    PotHeaderConfiguration,
}

impl EntityKind {
    /// Every kind, in the order an import must merge them.
    pub const MERGE_ORDER: [EntityKind; 8] = [
        Self::Directory,
        Self::File,
        Self::Section,
        Self::Compound,
        Self::Process,
        Self::CommonConfiguration,
        Self::HeaderConfiguration,
        Self::PotHeaderConfiguration,
    ];

    /// Name of the archive folder holding entries of this kind.
    pub fn archive_dir(&self) -> &'static str {
        match self {
            Self::Directory => "directories",
            Self::File => "files",
            Self::Section => "sections",
            Self::Compound => "compounds",
            Self::Process => "processes",
            Self::CommonConfiguration => "common",
            Self::HeaderConfiguration => "header",
            Self::PotHeaderConfiguration => "pot_header",
        }
    }

    /// Singleton kinds exist at most once per project and are never
    /// identity-resolved.
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            Self::CommonConfiguration | Self::HeaderConfiguration | Self::PotHeaderConfiguration
        )
    }

    /// Stable snake_case name, as used in serialized reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
            Self::Section => "section",
            Self::Compound => "compound",
            Self::Process => "process",
            Self::CommonConfiguration => "common_configuration",
            Self::HeaderConfiguration => "header_configuration",
            Self::PotHeaderConfiguration => "pot_header_configuration",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::MERGE_ORDER
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.archive_dir() == s)
            .ok_or_else(|| TypeError::UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_order_puts_containers_first() {
        let order = EntityKind::MERGE_ORDER;
        let pos = |k: EntityKind| order.iter().position(|o| *o == k).unwrap();
        assert!(pos(EntityKind::Directory) < pos(EntityKind::File));
        assert!(pos(EntityKind::Section) < pos(EntityKind::Compound));
        assert!(pos(EntityKind::Compound) < pos(EntityKind::Process));
    }

    #[test]
    fn merge_order_matches_variant_order() {
        let mut sorted = EntityKind::MERGE_ORDER;
        sorted.sort();
        assert_eq!(sorted, EntityKind::MERGE_ORDER);
    }

    #[test]
    fn archive_dirs_are_distinct() {
        let mut dirs: Vec<_> = EntityKind::MERGE_ORDER
            .iter()
            .map(|k| k.archive_dir())
            .collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), EntityKind::MERGE_ORDER.len());
    }

    #[test]
    fn only_configs_are_singletons() {
        let singletons: Vec<_> = EntityKind::MERGE_ORDER
            .into_iter()
            .filter(|k| k.is_singleton())
            .collect();
        assert_eq!(singletons.len(), 3);
        assert!(!EntityKind::Section.is_singleton());
    }

    #[test]
    fn parse_accepts_name_and_archive_dir() {
        assert_eq!("section".parse::<EntityKind>().unwrap(), EntityKind::Section);
        assert_eq!("processes".parse::<EntityKind>().unwrap(), EntityKind::Process);
        assert!("widgets".parse::<EntityKind>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&EntityKind::PotHeaderConfiguration).unwrap();
        assert_eq!(json, "\"pot_header_configuration\"");
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new time-ordered identifier (UUID v7).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create from an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Create from a 128-bit value. Handy for deterministic fixtures.
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Short representation (first 8 characters of the UUID).
            pub fn short_id(&self) -> String {
                self.0.simple().to_string()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.short_id())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| TypeError::InvalidId {
                        value: s.to_string(),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a configuration entity (directory, file, section,
    /// compound, process, or singleton configuration).
    ///
    /// Entity ids are unique within one project. The same logical entity
    /// carries a different `EntityId` in every project it has been cloned
    /// into; the id it had in its origin project is tracked separately as
    /// its source id.
    EntityId,
    "EntityId"
);

uuid_identifier!(
    /// Identifier of a project, the tenant that owns one configuration graph.
    ProjectId,
    "ProjectId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(EntityId::new(), EntityId::new());
        assert_ne!(ProjectId::new(), ProjectId::new());
    }

    #[test]
    fn new_ids_are_time_ordered() {
        let first = EntityId::new();
        let second = EntityId::new();
        assert!(first < second);
    }

    #[test]
    fn parse_roundtrip() {
        let id = EntityId::new();
        let parsed: EntityId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        let id = EntityId::from_u128(7);
        let parsed: EntityId = format!("  {id}\n").parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<EntityId>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidId { .. }));
    }

    #[test]
    fn short_id_is_eight_chars() {
        let id = ProjectId::from_u128(0xabcdef);
        assert_eq!(id.short_id().len(), 8);
        assert_eq!(format!("{id:?}"), format!("ProjectId({})", id.short_id()));
    }

    #[test]
    fn serde_is_a_plain_string() {
        let id = EntityId::from_u128(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ordering_is_consistent() {
        assert!(EntityId::from_u128(1) < EntityId::from_u128(2));
    }
}

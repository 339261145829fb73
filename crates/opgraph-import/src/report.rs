use std::collections::BTreeMap;
use std::fmt;

use opgraph_types::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which side of a name collision was renamed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameSide {
    /// A live entity was renamed to free its name for the import.
    Existing,
    /// The imported entity was renamed to avoid a live one.
    Incoming,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRecord {
    pub kind: EntityKind,
    pub id: EntityId,
    pub from: String,
    pub to: String,
    pub side: RenameSide,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounters {
    pub inserted: usize,
    pub updated: usize,
    pub renamed: usize,
}

/// Summary of one import session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub token: String,
    pub counters: BTreeMap<EntityKind, KindCounters>,
    pub renames: Vec<RenameRecord>,
    pub warnings: Vec<String>,
}

impl ImportReport {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            counters: BTreeMap::new(),
            renames: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn counters(&self, kind: EntityKind) -> KindCounters {
        self.counters.get(&kind).copied().unwrap_or_default()
    }

    pub(crate) fn inserted(&mut self, kind: EntityKind) {
        self.counters.entry(kind).or_default().inserted += 1;
    }

    pub(crate) fn updated(&mut self, kind: EntityKind) {
        self.counters.entry(kind).or_default().updated += 1;
    }

    pub(crate) fn renamed(&mut self, record: RenameRecord) {
        self.counters.entry(record.kind).or_default().renamed += 1;
        self.renames.push(record);
    }

    /// Record a non-fatal problem and log it.
    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    pub fn total_inserted(&self) -> usize {
        self.counters.values().map(|c| c.inserted).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.counters.values().map(|c| c.updated).sum()
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "import {}", self.token)?;
        for (kind, c) in &self.counters {
            writeln!(
                f,
                "  {kind}: {} inserted, {} updated, {} renamed",
                c.inserted, c.updated, c.renamed
            )?;
        }
        for r in &self.renames {
            let side = match r.side {
                RenameSide::Existing => "existing",
                RenameSide::Incoming => "incoming",
            };
            writeln!(f, "  renamed {side} {} `{}` -> `{}`", r.kind, r.from, r.to)?;
        }
        for w in &self.warnings {
            writeln!(f, "  warning: {w}")?;
        }
        Ok(())
    }
}

//! Common, header and proof-of-testing header configuration.
//!
//! There is one of each per project, so nothing is identity-resolved: an
//! archived document replaces the live value and an absent one is a no-op.

use opgraph_model::{ProjectConfiguration, SingletonConfiguration};
use opgraph_types::EntityKind;
use tracing::debug;

use crate::context::ImportContext;
use crate::error::ImportResult;
use crate::merger::{EntityMerger, Validation};

#[derive(Debug)]
pub struct SingletonMerger {
    kind: EntityKind,
}

impl SingletonMerger {
    /// `None` when `kind` is not a singleton kind.
    pub fn new(kind: EntityKind) -> Option<Self> {
        kind.is_singleton().then_some(Self { kind })
    }
}

impl EntityMerger for SingletonMerger {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn validate(&self, _config: &ProjectConfiguration, _ctx: &ImportContext<'_>) -> ImportResult<Validation> {
        Ok(Validation::new(self.kind))
    }

    fn import(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        let Some(wire) = ctx.archive.read_singleton(self.kind)? else {
            debug!(kind = %self.kind, "no document, keeping live value");
            return Ok(());
        };
        let value = SingletonConfiguration {
            id: wire.id,
            project: config.project(),
            settings: wire.settings,
        };
        let previous = config.replace_singleton(self.kind, Some(value))?;
        if previous.is_some() {
            ctx.report.updated(self.kind);
        } else {
            ctx.report.inserted(self.kind);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, project, ArchiveFixture};
    use opgraph_store::InMemoryBlobStore;
    use serde_json::json;

    #[test]
    fn only_singleton_kinds_get_a_merger() {
        assert!(SingletonMerger::new(EntityKind::HeaderConfiguration).is_some());
        assert!(SingletonMerger::new(EntityKind::Section).is_none());
    }

    #[test]
    fn document_replaces_live_value() {
        let mut config = project();
        let p = config.project();
        config
            .replace_singleton(
                EntityKind::CommonConfiguration,
                Some(SingletonConfiguration::new(p, json!({ "old": 1 }))),
            )
            .unwrap();

        let fx = ArchiveFixture::new();
        fx.singleton(EntityKind::CommonConfiguration, json!({ "new": 2 }));
        let blobs = InMemoryBlobStore::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        let merger = SingletonMerger::new(EntityKind::CommonConfiguration).unwrap();
        merger.import(&mut config, &mut ctx).unwrap();

        let common = config.singleton(EntityKind::CommonConfiguration).unwrap().unwrap();
        assert_eq!(common.settings, json!({ "new": 2 }));
        assert_eq!(ctx.report.counters(EntityKind::CommonConfiguration).updated, 1);
    }

    #[test]
    fn absent_document_keeps_live_value() {
        let mut config = project();
        let p = config.project();
        config
            .replace_singleton(
                EntityKind::HeaderConfiguration,
                Some(SingletonConfiguration::new(p, json!("kept"))),
            )
            .unwrap();
        let before = config.clone();

        let fx = ArchiveFixture::new();
        let blobs = InMemoryBlobStore::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        let merger = SingletonMerger::new(EntityKind::HeaderConfiguration).unwrap();
        merger.import(&mut config, &mut ctx).unwrap();
        assert_eq!(config, before);

        let validation = merger.validate(&config, &ctx).unwrap();
        assert!(validation.is_clean());
        assert!(validation.affected.is_empty());
    }
}

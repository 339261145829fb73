//! Compound merging.
//!
//! Compounds merge before processes, so the process list a compound carries
//! may name processes that only arrive with the process batch. Such lists
//! are parked in the context and applied by the process merger.

use opgraph_archive::{CompoundWire, ProcessWire};
use opgraph_model::{CompoundConfiguration, ProjectConfiguration};
use opgraph_types::{EntityId, EntityKind};
use tracing::debug;

use crate::context::ImportContext;
use crate::error::ImportResult;
use crate::identity::find_identity_match;
use crate::loader::Loaded;
use crate::merger::{commit_atomically, incoming_name, resolve_sections, EntityMerger, Validation};

const KIND: EntityKind = EntityKind::Compound;

#[derive(Debug, Default)]
pub struct CompoundMerger;

impl CompoundMerger {
    fn merge(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        let batch = ctx.loader().load::<CompoundWire>()?;
        for compound in &batch {
            Self::merge_one(config, ctx, compound)?;
        }
        Ok(())
    }

    fn merge_one(
        config: &mut ProjectConfiguration,
        ctx: &mut ImportContext<'_>,
        compound: &Loaded<CompoundWire>,
    ) -> ImportResult<()> {
        let wire = &compound.wire;
        let sections = resolve_sections(config, ctx, (KIND, compound.id), &wire.sections);
        let processes: Vec<EntityId> = wire
            .processes
            .iter()
            .filter_map(|&r| ctx.resolver.resolve(r, config.processes()).map(|p| p.id))
            .collect();
        let complete = processes.len() == wire.processes.len();

        let id = match find_identity_match(config.compounds(), compound.id, Some(compound.source_id)).map(|c| c.id) {
            Some(live) => {
                config.rename(KIND, live, compound.name())?;
                config.set_compound_refer_to_input(live, wire.refer_to_input.clone())?;
                config.set_source_id(KIND, live, Some(compound.source_id))?;
                ctx.report.updated(KIND);
                debug!(id = %live, name = compound.name(), "updated compound");
                live
            }
            None => {
                let name = incoming_name(ctx, KIND, compound.id, compound.name(), |n| {
                    config.compounds().values().any(|c| c.name == n)
                });
                let mut fresh = CompoundConfiguration::new(config.project(), compound.id, name)
                    .with_source(compound.source_id);
                fresh.refer_to_input = wire.refer_to_input.clone();
                config.insert_compound(fresh)?;
                ctx.report.inserted(KIND);
                debug!(id = %compound.id, "inserted compound");
                compound.id
            }
        };

        for section in sections {
            config.link_section_compound(section, id)?;
        }
        config.set_compound_processes(id, processes)?;
        if !complete {
            debug!(%id, "parking process list until processes are merged");
            ctx.pending_compounds.insert(id, wire.processes.clone());
        }
        Ok(())
    }
}

impl EntityMerger for CompoundMerger {
    fn kind(&self) -> EntityKind {
        KIND
    }

    /// Compounds have no hard references: unknown sections and processes
    /// become warnings at import time.
    fn validate(&self, config: &ProjectConfiguration, ctx: &ImportContext<'_>) -> ImportResult<Validation> {
        let batch = ctx.loader().load::<CompoundWire>()?;
        // Parse the process batch too, so a broken one fails validation here
        // rather than after compounds committed.
        ctx.loader().load::<ProcessWire>()?;
        let mut validation = Validation::new(KIND);
        validation.affected = batch
            .iter()
            .map(|c| {
                find_identity_match(config.compounds(), c.id, Some(c.source_id))
                    .map(|m| m.id)
                    .unwrap_or(c.id)
            })
            .collect();
        Ok(validation)
    }

    fn import(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        commit_atomically(KIND, config, ctx, |config, ctx| self.merge(config, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RenameSide;
    use crate::testing::{context, id, project, ArchiveFixture};
    use opgraph_model::{ProcessConfiguration, SectionConfiguration};
    use opgraph_store::InMemoryBlobStore;

    fn live_project() -> ProjectConfiguration {
        let mut config = project();
        let p = config.project();
        config.insert_section(SectionConfiguration::new(p, id(1), "S1")).unwrap();
        config.insert_section(SectionConfiguration::new(p, id(2), "S2")).unwrap();
        config.insert_process(ProcessConfiguration::new(p, id(10), "P1")).unwrap();
        config.insert_process(ProcessConfiguration::new(p, id(11), "P2")).unwrap();
        config
    }

    #[test]
    fn inserts_with_mirrored_memberships() {
        let mut config = live_project();
        let fx = ArchiveFixture::new();
        fx.compound(id(20), "C", &[id(1)], &[id(11), id(10)]);
        let blobs = InMemoryBlobStore::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        CompoundMerger.import(&mut config, &mut ctx).unwrap();

        let compound = config.compound(id(20)).unwrap();
        assert_eq!(compound.processes, vec![id(11), id(10)]);
        assert_eq!(compound.sections, vec![id(1)]);
        assert_eq!(config.section(id(1)).unwrap().compounds, vec![id(20)]);
        assert_eq!(config.process(id(10)).unwrap().compounds, vec![id(20)]);
        assert!(ctx.pending_compounds().is_empty());
        assert!(config.check_invariants().is_empty());
    }

    #[test]
    fn match_unions_sections_and_replaces_processes() {
        let mut config = live_project();
        let p = config.project();
        config.insert_compound(CompoundConfiguration::new(p, id(20), "C")).unwrap();
        config.link_section_compound(id(1), id(20)).unwrap();
        config.set_compound_processes(id(20), vec![id(10)]).unwrap();

        let fx = ArchiveFixture::new();
        fx.compound(id(20), "C renamed", &[id(2)], &[id(11)]);
        let blobs = InMemoryBlobStore::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        CompoundMerger.import(&mut config, &mut ctx).unwrap();

        let compound = config.compound(id(20)).unwrap();
        assert_eq!(compound.name, "C renamed");
        assert_eq!(compound.sections, vec![id(1), id(2)]);
        assert_eq!(compound.processes, vec![id(11)]);
        assert!(config.process(id(10)).unwrap().compounds.is_empty());
        assert_eq!(ctx.report.counters(KIND).updated, 1);
        assert!(config.check_invariants().is_empty());
    }

    #[test]
    fn colliding_name_renames_incoming() {
        let mut config = live_project();
        let p = config.project();
        config.insert_compound(CompoundConfiguration::new(p, id(20), "C")).unwrap();

        let fx = ArchiveFixture::new();
        fx.compound(id(21), "C", &[], &[]);
        let blobs = InMemoryBlobStore::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        CompoundMerger.import(&mut config, &mut ctx).unwrap();

        assert_eq!(config.compound(id(20)).unwrap().name, "C");
        assert_eq!(config.compound(id(21)).unwrap().name, "C_ImportConflict_T");
        assert_eq!(ctx.report.renames[0].side, RenameSide::Incoming);
    }

    #[test]
    fn unknown_processes_are_parked() {
        let mut config = live_project();
        let fx = ArchiveFixture::new();
        fx.compound(id(20), "C", &[], &[id(10), id(99)]);
        let blobs = InMemoryBlobStore::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        CompoundMerger.import(&mut config, &mut ctx).unwrap();

        assert_eq!(config.compound(id(20)).unwrap().processes, vec![id(10)]);
        assert_eq!(ctx.pending_compounds().get(&id(20)), Some(&vec![id(10), id(99)]));
    }

    #[test]
    fn unknown_section_is_a_warning() {
        let mut config = live_project();
        let fx = ArchiveFixture::new();
        fx.compound(id(20), "C", &[id(1), id(55)], &[]);
        let blobs = InMemoryBlobStore::new();
        let reader = fx.reader();
        let mut ctx = context(&reader, &blobs);
        CompoundMerger.import(&mut config, &mut ctx).unwrap();

        assert_eq!(config.compound(id(20)).unwrap().sections, vec![id(1)]);
        assert_eq!(ctx.report.warnings.len(), 1);
        assert!(ctx.report.warnings[0].contains(&id(55).to_string()));
    }
}

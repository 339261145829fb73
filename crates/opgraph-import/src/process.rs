//! Process merging, followed by the compound process lists parked while
//! compounds were merged.

use opgraph_archive::ProcessWire;
use opgraph_model::{ProcessConfiguration, ProjectConfiguration};
use opgraph_types::{EntityId, EntityKind};
use tracing::debug;

use crate::context::ImportContext;
use crate::error::ImportResult;
use crate::identity::find_identity_match;
use crate::loader::Loaded;
use crate::merger::{commit_atomically, incoming_name, resolve_sections, EntityMerger, Validation};

const KIND: EntityKind = EntityKind::Process;

#[derive(Debug, Default)]
pub struct ProcessMerger;

impl ProcessMerger {
    fn merge(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        let batch = ctx.loader().load::<ProcessWire>()?;
        for process in &batch {
            Self::merge_one(config, ctx, process)?;
        }
        apply_pending_compounds(config, ctx)
    }

    fn merge_one(
        config: &mut ProjectConfiguration,
        ctx: &mut ImportContext<'_>,
        process: &Loaded<ProcessWire>,
    ) -> ImportResult<()> {
        let wire = &process.wire;
        let sections = resolve_sections(config, ctx, (KIND, process.id), &wire.sections);

        let id = match find_identity_match(config.processes(), process.id, Some(process.source_id)).map(|p| p.id) {
            Some(live) => {
                config.rename(KIND, live, process.name())?;
                config.set_process_settings(live, wire.process_settings.clone())?;
                config.set_source_id(KIND, live, Some(process.source_id))?;
                ctx.report.updated(KIND);
                debug!(id = %live, name = process.name(), "updated process");
                live
            }
            None => {
                let name = incoming_name(ctx, KIND, process.id, process.name(), |n| {
                    config.processes().values().any(|p| p.name == n)
                });
                let fresh = ProcessConfiguration::new(config.project(), process.id, name)
                    .with_source(process.source_id)
                    .with_settings(wire.process_settings.clone());
                config.insert_process(fresh)?;
                ctx.report.inserted(KIND);
                debug!(id = %process.id, "inserted process");
                process.id
            }
        };

        for section in sections {
            config.link_section_process(section, id)?;
        }
        Ok(())
    }
}

/// Apply every parked compound process list now that processes exist.
///
/// References that still do not resolve are dropped with a warning.
fn apply_pending_compounds(config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
    let pending = std::mem::take(&mut ctx.pending_compounds);
    for (compound, references) in pending {
        if !config.contains(EntityKind::Compound, compound) {
            continue;
        }
        let mut resolved: Vec<EntityId> = Vec::with_capacity(references.len());
        for reference in references {
            match ctx.resolver.resolve(reference, config.processes()) {
                Some(process) => resolved.push(process.id),
                None => ctx.report.warn(format!(
                    "compound {compound}: process {reference} not found, dropped from process list"
                )),
            }
        }
        debug!(%compound, count = resolved.len(), "applied parked process list");
        config.set_compound_processes(compound, resolved)?;
    }
    Ok(())
}

impl EntityMerger for ProcessMerger {
    fn kind(&self) -> EntityKind {
        KIND
    }

    fn validate(&self, config: &ProjectConfiguration, ctx: &ImportContext<'_>) -> ImportResult<Validation> {
        let batch = ctx.loader().load::<ProcessWire>()?;
        let mut validation = Validation::new(KIND);
        validation.affected = batch
            .iter()
            .map(|p| {
                find_identity_match(config.processes(), p.id, Some(p.source_id))
                    .map(|m| m.id)
                    .unwrap_or(p.id)
            })
            .collect();
        Ok(validation)
    }

    fn import(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        commit_atomically(KIND, config, ctx, |config, ctx| self.merge(config, ctx))
    }
}

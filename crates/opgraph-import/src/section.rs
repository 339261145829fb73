//! Section merging.
//!
//! The archive does not order sections parents-first. A parent reference is
//! looked up in the batch first (resolving that entry recursively), then in
//! the live tree. Only when every entry has a resolved ancestry does the
//! merge touch the project.

use std::collections::{BTreeMap, BTreeSet};

use opgraph_archive::SectionWire;
use opgraph_model::{ProjectConfiguration, SectionConfiguration};
use opgraph_types::{EntityId, EntityKind};
use tracing::debug;

use crate::context::ImportContext;
use crate::error::{ImportError, ImportResult};
use crate::identity::{find_identity_match, IdentityResolver};
use crate::loader::Loaded;
use crate::merger::{commit_atomically, incoming_name, EntityMerger, Validation};

const KIND: EntityKind = EntityKind::Section;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Parent {
    Live(EntityId),
    Batch(usize),
}

/// Ancestry resolution over one batch.
struct Plan<'b> {
    batch: &'b [Loaded<SectionWire>],
    parents: BTreeMap<usize, Option<Parent>>,
    visiting: BTreeSet<usize>,
    failed: BTreeSet<usize>,
    /// Parents before children.
    order: Vec<usize>,
}

impl<'b> Plan<'b> {
    fn new(batch: &'b [Loaded<SectionWire>]) -> Self {
        Self {
            batch,
            parents: BTreeMap::new(),
            visiting: BTreeSet::new(),
            failed: BTreeSet::new(),
            order: Vec::with_capacity(batch.len()),
        }
    }

    fn resolve(&mut self, i: usize, config: &ProjectConfiguration, resolver: &IdentityResolver) -> ImportResult<()> {
        if self.parents.contains_key(&i) {
            return Ok(());
        }
        let batch = self.batch;
        let section = &batch[i];
        if !self.visiting.insert(i) {
            return Err(ImportError::CyclicReference {
                kind: KIND,
                id: section.id,
                parent: section.wire.parent_section.unwrap_or(section.id),
            });
        }

        let result = self.resolve_parent(i, config, resolver);
        self.visiting.remove(&i);
        match result {
            Ok(parent) => {
                self.parents.insert(i, parent);
                self.order.push(i);
                Ok(())
            }
            Err(err) => {
                self.failed.insert(i);
                Err(err)
            }
        }
    }

    fn resolve_parent(
        &mut self,
        i: usize,
        config: &ProjectConfiguration,
        resolver: &IdentityResolver,
    ) -> ImportResult<Option<Parent>> {
        let batch = self.batch;
        let section = &batch[i];
        let Some(reference) = section.wire.parent_section else {
            return Ok(None);
        };

        let candidates = resolver.candidates(reference);
        if let Some(j) = batch.iter().position(|s| s.answers_to(&candidates)) {
            if self.failed.contains(&j) {
                return Err(ImportError::ParentNotFound {
                    kind: KIND,
                    id: section.id,
                    name: section.name().to_string(),
                    parent: reference,
                });
            }
            self.resolve(j, config, resolver)?;
            return Ok(Some(Parent::Batch(j)));
        }
        if let Some(live) = resolver.resolve(reference, config.sections()) {
            return Ok(Some(Parent::Live(live.id)));
        }
        Err(ImportError::ParentNotFound {
            kind: KIND,
            id: section.id,
            name: section.name().to_string(),
            parent: reference,
        })
    }
}

#[derive(Debug, Default)]
pub struct SectionMerger;

impl SectionMerger {
    fn merge(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        let batch = ctx.loader().load::<SectionWire>()?;
        let mut plan = Plan::new(&batch);
        for i in 0..batch.len() {
            plan.resolve(i, config, &ctx.resolver)?;
        }

        let mut merged: Vec<Option<EntityId>> = vec![None; batch.len()];
        for &i in &plan.order {
            let parent = match plan.parents.get(&i).copied().flatten() {
                None => None,
                Some(Parent::Live(id)) => Some(id),
                Some(Parent::Batch(j)) => Some(merged[j].ok_or_else(|| ImportError::ParentNotFound {
                    kind: KIND,
                    id: batch[i].id,
                    name: batch[i].name().to_string(),
                    parent: batch[j].id,
                })?),
            };
            merged[i] = Some(Self::merge_one(config, ctx, &batch[i], parent)?);
        }
        Ok(())
    }

    fn merge_one(
        config: &mut ProjectConfiguration,
        ctx: &mut ImportContext<'_>,
        section: &Loaded<SectionWire>,
        parent: Option<EntityId>,
    ) -> ImportResult<EntityId> {
        let place = section.wire.place;

        if let Some(live) = find_identity_match(config.sections(), section.id, Some(section.source_id)).map(|s| s.id) {
            config.rename_section(live, section.name())?;
            config.set_section_place(live, place)?;
            config.set_source_id(KIND, live, Some(section.source_id))?;
            config.move_section(live, parent).map_err(ImportError::from_move)?;
            ctx.report.updated(KIND);
            debug!(id = %live, name = section.name(), "updated section");
            return Ok(live);
        }

        let siblings: Vec<String> = config.child_sections(parent).iter().map(|s| s.name.clone()).collect();
        let name = incoming_name(ctx, KIND, section.id, section.name(), |n| {
            siblings.iter().any(|s| s == n)
        });

        let mut fresh = SectionConfiguration::new(config.project(), section.id, name)
            .with_source(section.source_id)
            .at_place(place);
        fresh.parent = parent;
        config.insert_section(fresh)?;
        ctx.report.inserted(KIND);
        debug!(id = %section.id, "inserted section");
        Ok(section.id)
    }
}

impl EntityMerger for SectionMerger {
    fn kind(&self) -> EntityKind {
        KIND
    }

    fn validate(&self, config: &ProjectConfiguration, ctx: &ImportContext<'_>) -> ImportResult<Validation> {
        let batch = ctx.loader().load::<SectionWire>()?;
        let mut plan = Plan::new(&batch);
        let mut validation = Validation::new(KIND);
        for i in 0..batch.len() {
            if plan.failed.contains(&i) {
                continue;
            }
            if let Err(err) = plan.resolve(i, config, &ctx.resolver) {
                validation.issues.push(err);
            }
        }
        validation.affected = batch
            .iter()
            .map(|s| {
                find_identity_match(config.sections(), s.id, Some(s.source_id))
                    .map(|m| m.id)
                    .unwrap_or(s.id)
            })
            .collect();
        Ok(validation)
    }

    fn import(&self, config: &mut ProjectConfiguration, ctx: &mut ImportContext<'_>) -> ImportResult<()> {
        commit_atomically(KIND, config, ctx, |config, ctx| self.merge(config, ctx))
    }
}

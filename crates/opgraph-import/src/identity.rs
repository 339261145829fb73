//! Identity resolution across the two id spaces.
//!
//! Every imported entity has an `id` (its identity in the target project)
//! and a `source_id` (its id in the project it was exported from). For a
//! cross-project import, a replacement map translates origin ids to new
//! ids. Reference fields inside the archive still carry origin ids, so
//! every reference is looked up through [`IdentityResolver`].

use std::collections::BTreeMap;

use opgraph_model::Identified;
use opgraph_types::EntityId;

/// Invert an id map.
///
/// Values are expected to be unique. If two keys share a value, the larger
/// key wins.
pub fn reverse_map(map: &BTreeMap<EntityId, EntityId>) -> BTreeMap<EntityId, EntityId> {
    map.iter().map(|(from, to)| (*to, *from)).collect()
}

/// Resolves archived references against live entities.
#[derive(Clone, Debug, Default)]
pub struct IdentityResolver {
    forward: BTreeMap<EntityId, EntityId>,
    reverse: BTreeMap<EntityId, EntityId>,
}

impl IdentityResolver {
    /// Build a resolver for the given replacement map (origin id → new id).
    pub fn new(replacements: BTreeMap<EntityId, EntityId>) -> Self {
        let reverse = reverse_map(&replacements);
        Self {
            forward: replacements,
            reverse,
        }
    }

    /// The id an archived entity takes in the target project.
    pub fn translate(&self, id: EntityId) -> EntityId {
        self.forward.get(&id).copied().unwrap_or(id)
    }

    /// Every id `reference` may stand for: itself, then its reverse and
    /// forward translations.
    pub fn candidates(&self, reference: EntityId) -> Vec<EntityId> {
        let mut out = vec![reference];
        for mapped in [self.reverse.get(&reference), self.forward.get(&reference)]
            .into_iter()
            .flatten()
        {
            if !out.contains(mapped) {
                out.push(*mapped);
            }
        }
        out
    }

    /// Find the live entity an archived reference points at.
    ///
    /// Tries the reference itself, its reverse-map translation, its
    /// forward-map translation, and finally a live entity whose source id
    /// equals the reference.
    pub fn resolve<'a, T: Identified>(
        &self,
        reference: EntityId,
        existing: &'a BTreeMap<EntityId, T>,
    ) -> Option<&'a T> {
        self.candidates(reference)
            .into_iter()
            .find_map(|id| existing.get(&id))
            .or_else(|| existing.values().find(|e| e.source_id() == Some(reference)))
    }
}

/// Find the live entity an incoming one should update, if any.
///
/// Match order: equal ids, equal source ids, live id equal to the incoming
/// source id, live source id equal to the incoming id.
pub fn find_identity_match<T: Identified>(
    existing: &BTreeMap<EntityId, T>,
    id: EntityId,
    source_id: Option<EntityId>,
) -> Option<&T> {
    if let Some(found) = existing.get(&id) {
        return Some(found);
    }
    if let Some(source) = source_id {
        if let Some(found) = existing.values().find(|e| e.source_id() == Some(source)) {
            return Some(found);
        }
        if let Some(found) = existing.get(&source) {
            return Some(found);
        }
    }
    existing.values().find(|e| e.source_id() == Some(id))
}

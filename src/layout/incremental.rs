use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::config::LayoutConfig;
use crate::ir::{FamilySnapshot, Person, Position, PositionMap};

use super::family::FamilyIndex;
use super::types::{Layout, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    fn of(position: Position) -> Self {
        Self {
            min_x: position.x,
            min_y: position.y,
            max_x: position.x,
            max_y: position.y,
        }
    }

    fn include(&mut self, position: Position) {
        self.min_x = self.min_x.min(position.x);
        self.min_y = self.min_y.min(position.y);
        self.max_x = self.max_x.max(position.x);
        self.max_y = self.max_y.max(position.y);
    }
}

/// Caller-owned record of an existing layout: positions, their bounds and
/// how many placed children each person has. Kept current by
/// [`LayoutCache::insert_new_person`].
#[derive(Debug, Clone, Default)]
pub struct LayoutCache {
    positions: PositionMap,
    bounds: Option<Bounds>,
    child_counts: BTreeMap<String, usize>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache over persisted positions. Child counts come from `snapshot`
    /// when given.
    pub fn from_positions(positions: PositionMap, snapshot: Option<&FamilySnapshot>) -> Self {
        let mut bounds: Option<Bounds> = None;
        for position in positions.values() {
            match bounds.as_mut() {
                Some(bounds) => bounds.include(*position),
                None => bounds = Some(Bounds::of(*position)),
            }
        }
        let mut child_counts: BTreeMap<String, usize> = BTreeMap::new();
        if let Some(snapshot) = snapshot {
            let index = FamilyIndex::build(snapshot);
            for child in index.order.iter().filter(|id| positions.contains_key(**id)) {
                for parent in index.parents(child) {
                    *child_counts.entry(parent.to_string()).or_default() += 1;
                }
            }
        }
        Self {
            positions,
            bounds,
            child_counts,
        }
    }

    pub fn from_layout(layout: &Layout, snapshot: &FamilySnapshot) -> Self {
        Self::from_positions(layout.positions.clone(), Some(snapshot))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn child_count(&self, id: &str) -> usize {
        self.child_counts.get(id).copied().unwrap_or(0)
    }

    /// Places `person` and records the result. Existing entries are never
    /// touched.
    pub fn insert_new_person(
        &mut self,
        person: &Person,
        viewport: Option<Viewport>,
        config: &LayoutConfig,
    ) -> Placement {
        let placement = place_new_person(person, self, viewport, config);
        if placement.strategy == PlacementStrategy::Existing {
            return placement;
        }
        self.positions.insert(person.id.clone(), placement.position);
        match self.bounds.as_mut() {
            Some(bounds) => bounds.include(placement.position),
            None => self.bounds = Some(Bounds::of(placement.position)),
        }
        for parent in person.parent_ids.iter().take(2) {
            *self.child_counts.entry(parent.clone()).or_default() += 1;
        }
        placement
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementStrategy {
    Existing,
    BelowParent,
    BesideSpouse,
    Viewport,
    BottomLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub position: Position,
    pub strategy: PlacementStrategy,
    /// Cache lookups performed; independent of the cache size.
    pub lookups: usize,
}

/// Chooses a position for one new person without re-running the layout:
/// below a placed parent, beside a placed spouse, inside the viewport, or
/// under the current bounding box.
pub fn place_new_person(
    person: &Person,
    cache: &LayoutCache,
    viewport: Option<Viewport>,
    config: &LayoutConfig,
) -> Placement {
    let mut lookups = 1;
    if let Some(position) = cache.get(&person.id) {
        return Placement {
            position,
            strategy: PlacementStrategy::Existing,
            lookups,
        };
    }

    let mut anchors: Vec<Position> = Vec::with_capacity(2);
    let mut siblings = 0;
    for parent in person.parent_ids.iter().take(2) {
        lookups += 1;
        if let Some(position) = cache.get(parent) {
            anchors.push(position);
            lookups += 1;
            siblings = siblings.max(cache.child_count(parent));
        }
    }
    if !anchors.is_empty() {
        let count = anchors.len() as f32;
        let anchor_x = anchors.iter().map(|p| p.x).sum::<f32>() / count;
        let anchor_y = anchors.iter().map(|p| p.y).sum::<f32>() / count;
        let spread = config.incremental.jitter * siblings as f32;
        let offset = if spread > 0.0 {
            StdRng::seed_from_u64(seed_for(&person.id)).gen_range(-spread..=spread)
        } else {
            0.0
        };
        debug!(id = %person.id, siblings, offset, "placed below parent");
        return Placement {
            position: Position::new(anchor_x + offset, anchor_y + config.generation_spacing),
            strategy: PlacementStrategy::BelowParent,
            lookups,
        };
    }

    for spouse in &person.spouse_ids {
        lookups += 1;
        if let Some(position) = cache.get(spouse) {
            return Placement {
                position: Position::new(
                    position.x + config.node_width + config.spouse_gap,
                    position.y,
                ),
                strategy: PlacementStrategy::BesideSpouse,
                lookups,
            };
        }
    }

    if let Some(viewport) = viewport {
        return Placement {
            position: Position::new(viewport.x + config.margin, viewport.y + config.margin),
            strategy: PlacementStrategy::Viewport,
            lookups,
        };
    }

    let position = match cache.bounds() {
        Some(bounds) => Position::new(bounds.min_x, bounds.max_y + config.generation_spacing),
        None => Position::new(config.margin, config.margin),
    };
    Placement {
        position,
        strategy: PlacementStrategy::BottomLeft,
        lookups,
    }
}

/// FNV-1a over the id bytes, stable across runs and platforms.
fn seed_for(id: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in id.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ir::{FamilySnapshot, PositionMap};
use crate::layout::incremental::LayoutCache;

/// Whether previously fixed positions survive a full relayout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrangeMode {
    /// Fixed positions from the previous layout are reported verbatim.
    #[default]
    Relayout,
    /// Every position is recomputed, including fixed ones.
    AutoArrange,
}

#[derive(Debug, Clone)]
pub struct LayoutInput<'a> {
    pub snapshot: &'a FamilySnapshot,
    pub collapsed: BTreeSet<String>,
    pub roots: Option<Vec<String>>,
    pub previous: Option<&'a LayoutCache>,
    pub mode: ArrangeMode,
}

impl<'a> LayoutInput<'a> {
    pub fn new(snapshot: &'a FamilySnapshot) -> Self {
        Self {
            snapshot,
            collapsed: BTreeSet::new(),
            roots: None,
            previous: None,
            mode: ArrangeMode::Relayout,
        }
    }

    pub fn with_collapsed<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collapsed = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_roots(mut self, roots: Vec<String>) -> Self {
        self.roots = Some(roots);
        self
    }

    pub fn with_previous(mut self, previous: &'a LayoutCache) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn with_mode(mut self, mode: ArrangeMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLayout {
    pub id: usize,
    pub members: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub generation: Option<usize>,
    pub cross_lineage: bool,
    pub orphan: bool,
}

impl ClusterLayout {
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// A parent-child link left out of placement because it would point
/// upward or sideways.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossLink {
    pub parent: String,
    pub child: String,
    pub from_cluster: usize,
    pub to_cluster: usize,
}

/// Placeholder copy of a person drawn under a parent whose edge was cut.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneLayout {
    pub person_id: String,
    pub parent: String,
    pub source_cluster: usize,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutStats {
    pub clusters: usize,
    pub edges: usize,
    pub cycle_edges: usize,
    pub orphan_clusters: usize,
    pub collision_passes: usize,
    pub collision_converged: bool,
    pub rejected_moves: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub positions: PositionMap,
    pub generations: BTreeMap<String, usize>,
    pub clusters: Vec<ClusterLayout>,
    pub orphans: Vec<String>,
    pub disconnected: Vec<String>,
    pub hidden: Vec<String>,
    pub cross_links: Vec<CrossLink>,
    pub clones: Vec<CloneLayout>,
    pub stats: LayoutStats,
    pub width: f32,
    pub height: f32,
}

impl Layout {
    pub fn empty() -> Self {
        Self {
            stats: LayoutStats {
                collision_converged: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn cluster_of(&self, person_id: &str) -> Option<&ClusterLayout> {
        self.clusters
            .iter()
            .find(|cluster| cluster.members.iter().any(|member| member == person_id))
    }
}

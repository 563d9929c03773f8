mod aesthetics;
mod cluster;
mod collision;
mod compact;
mod dagre;
pub(crate) mod family;
mod generation;
pub mod incremental;
mod orphan;
mod ranking;
pub(crate) mod types;
mod visibility;

pub use incremental::{Bounds, LayoutCache, Placement, PlacementStrategy, place_new_person};
pub use types::*;

use aesthetics::{
    AestheticContext, TitleMatcher, center_parents, group_titles, pull_children,
    reorder_siblings,
};
use cluster::{ClusterEdge, ClusterSet, build_cluster_edges, build_clusters};
use collision::{count_overlaps, resolve_collisions};
use compact::compact_rows;
use dagre::place_nodes_dagre;
use family::FamilyIndex;
use generation::assign_generations;
use orphan::{normalize, place_orphans};
use ranking::{Geometry, PlacementGraph, compute_ranks_subset, place_nodes};
use visibility::{Visibility, apply_collapse};

use crate::config::{CycleBreaking, GenerationAlignment, LayeredPlacer, LayoutConfig};
use crate::ir::{Position, PositionMap};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Working rectangle of one cluster: `x`/`y` are the top-left corner and
/// `gap` the spacing the cluster wants to its row neighbors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClusterBox {
    pub(crate) id: usize,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) gap: f32,
}

impl ClusterBox {
    pub(crate) fn right(&self) -> f32 {
        self.x + self.width
    }

    pub(crate) fn center(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// Full layout of a family snapshot. Deterministic: the same input and
/// config always produce the same positions.
pub fn compute_layout(input: &LayoutInput<'_>, config: &LayoutConfig) -> Layout {
    let snapshot = input.snapshot;
    if snapshot.is_empty() {
        debug!("empty snapshot, nothing to lay out");
        return Layout::empty();
    }
    let rules = &config.rules;

    let index = FamilyIndex::build(snapshot);
    let generations = assign_generations(&index, input.roots.as_deref());
    let visibility = apply_collapse(&index, &input.collapsed);
    let set = build_clusters(&index, &visibility, &generations, config);
    let raw_edges = build_cluster_edges(&index, &visibility, &set, rules.birth_date_sort);
    debug!(
        persons = index.len(),
        visible = visibility.visible.len(),
        clusters = set.clusters.len(),
        edges = raw_edges.len(),
        "clusters built"
    );

    // Clusters without a generation, or without any edge, go to the orphan grid.
    let placeable = |id: usize| set.clusters[id].generation.is_some();
    let linked_edges: Vec<ClusterEdge<'_>> = raw_edges
        .iter()
        .filter(|edge| placeable(edge.from) && placeable(edge.to))
        .copied()
        .collect();
    let linked: BTreeSet<usize> = linked_edges
        .iter()
        .flat_map(|edge| [edge.from, edge.to])
        .collect();
    let main: Vec<usize> = linked.iter().copied().collect();
    let orphan_ids: Vec<usize> = set
        .clusters
        .iter()
        .map(|cluster| cluster.id)
        .filter(|id| !linked.contains(id))
        .collect();

    let rows = assign_rows(&set, &main, &linked_edges, rules.generation_alignment);

    let mut dag_edges: Vec<(usize, usize)> = Vec::with_capacity(linked_edges.len());
    let mut cycle_edges: Vec<ClusterEdge<'_>> = Vec::new();
    for edge in &linked_edges {
        if rows[&edge.to] > rows[&edge.from] {
            dag_edges.push((edge.from, edge.to));
        } else {
            cycle_edges.push(*edge);
        }
    }

    let ordering_edges = if rules.cross_lineage_grouping {
        dag_edges.clone()
    } else {
        primary_lineage_edges(&index, &visibility, &set, &dag_edges)
    };

    let geometry: BTreeMap<usize, Geometry> = main
        .iter()
        .map(|&id| (id, cluster_geometry(&set, id, config)))
        .collect();
    let graph = PlacementGraph {
        rows: &rows,
        edges: &dag_edges,
        ordering_edges: &ordering_edges,
        geometry: &geometry,
    };
    let dagre_centers = match rules.layered_placer {
        LayeredPlacer::Dagre => place_nodes_dagre(&graph, config),
        LayeredPlacer::Median => None,
    };
    let used_dagre = dagre_centers.is_some();
    let centers = match dagre_centers {
        Some(centers) => centers,
        None => place_nodes(&graph, config.order_passes).0,
    };

    let mut boxes: Vec<ClusterBox> = main
        .iter()
        .map(|&id| {
            let shape = geometry[&id];
            ClusterBox {
                id,
                x: centers.get(&id).copied().unwrap_or(0.0) - shape.width / 2.0,
                y: rows[&id] as f32 * config.generation_spacing,
                width: shape.width,
                gap: shape.gap,
            }
        })
        .collect();
    let slot: BTreeMap<usize, usize> = boxes
        .iter()
        .enumerate()
        .map(|(idx, item)| (item.id, idx))
        .collect();
    debug!(
        main = boxes.len(),
        orphans = orphan_ids.len(),
        dag_edges = dag_edges.len(),
        cycle_edges = cycle_edges.len(),
        used_dagre,
        "clusters ranked and placed"
    );

    if rules.compaction {
        let moved = compact_rows(&mut boxes, config);
        debug!(moved, "rows compacted");
    }

    let tolerance = config.collision.row_tolerance;
    let mut collision_passes = 0;
    if rules.resolve_overlaps {
        let budget = config.collision.pass_budget(visibility.visible.len());
        let outcome = resolve_collisions(&mut boxes, config.min_gap, tolerance, budget);
        collision_passes += outcome.passes;
        debug!(passes = outcome.passes, converged = outcome.converged, "collisions resolved");
    }

    let ctx = AestheticContext {
        index: &index,
        visibility: &visibility,
        set: &set,
        edges: &dag_edges,
        slot: &slot,
        config,
    };
    let mut rejected_moves = 0;
    if rules.birth_date_sort {
        rejected_moves += reorder_siblings(&mut boxes, &ctx);
    }
    if rules.parent_centering {
        rejected_moves += center_parents(&mut boxes, &ctx);
    }
    rejected_moves += pull_children(&mut boxes, &ctx);
    if rules.resolve_overlaps {
        let outcome =
            resolve_collisions(&mut boxes, config.min_gap, tolerance, config.collision.final_passes);
        collision_passes += outcome.passes;
    }
    if rules.title_grouping {
        let matcher = TitleMatcher::new(&config.aesthetics.title_prefixes);
        rejected_moves += group_titles(&mut boxes, &ctx, matcher.as_ref());
    }
    let collision_converged = count_overlaps(&boxes, config.min_gap, tolerance) == 0;
    if !collision_converged {
        warn!(
            passes = collision_passes,
            "collision resolution did not converge, returning best effort"
        );
    }
    debug!(rejected_moves, "aesthetic passes done");

    let mut cross_links = Vec::new();
    let mut clones = Vec::new();
    for edge in &cycle_edges {
        match rules.cycle_breaking {
            CycleBreaking::Ignore => {}
            CycleBreaking::CrossLink => cross_links.push(CrossLink {
                parent: edge.parent.to_string(),
                child: edge.child.to_string(),
                from_cluster: edge.from,
                to_cluster: edge.to,
            }),
            CycleBreaking::CloneNode => {
                let source = boxes[slot[&edge.from]];
                clones.push(CloneLayout {
                    person_id: edge.child.to_string(),
                    parent: edge.parent.to_string(),
                    source_cluster: edge.from,
                    x: source.center() - config.node_width / 2.0,
                    y: source.y + config.generation_spacing,
                });
            }
        }
    }

    let mut orphan_boxes: Vec<ClusterBox> = orphan_ids
        .iter()
        .map(|&id| {
            let shape = cluster_geometry(&set, id, config);
            ClusterBox {
                id,
                x: 0.0,
                y: 0.0,
                width: shape.width,
                gap: shape.gap,
            }
        })
        .collect();
    if rules.show_orphans {
        place_orphans(&boxes, &mut orphan_boxes, config);
    } else {
        orphan_boxes.clear();
    }
    let main_count = boxes.len();
    boxes.extend(orphan_boxes);

    if rules.normalize_positions {
        normalize(&mut boxes, &mut clones, config.margin);
    }

    let mut positions = PositionMap::new();
    let mut clusters = Vec::with_capacity(boxes.len());
    for (idx, item) in boxes.iter().enumerate() {
        let cluster = &set.clusters[item.id];
        for (slot_idx, member) in cluster.members.iter().enumerate() {
            let x = item.x + cluster::Cluster::member_offset(slot_idx, config);
            positions.insert(member.to_string(), Position::new(x, item.y));
        }
        clusters.push(ClusterLayout {
            id: item.id,
            members: cluster.members.iter().map(|m| m.to_string()).collect(),
            x: item.x,
            y: item.y,
            width: item.width,
            height: config.node_height,
            generation: cluster.generation,
            cross_lineage: cluster.cross_lineage,
            orphan: idx >= main_count,
        });
    }
    clusters.sort_by_key(|cluster| cluster.id);

    if input.mode == ArrangeMode::Relayout
        && let Some(previous) = input.previous
    {
        let mut kept = 0;
        for (id, position) in positions.iter_mut() {
            if let Some(fixed) = previous.get(id).filter(|p| p.fixed) {
                *position = fixed;
                kept += 1;
            }
        }
        debug!(kept, "fixed positions preserved");
    }

    let (width, height) = extent(&positions, &clones, config);
    let orphans = orphan_ids
        .iter()
        .flat_map(|&id| set.clusters[id].members.iter().map(|m| m.to_string()))
        .collect();

    Layout {
        generations: positions
            .keys()
            .filter_map(|id| generations.of(id).map(|g| (id.clone(), g)))
            .collect(),
        positions,
        clusters,
        orphans,
        disconnected: generations
            .disconnected
            .iter()
            .map(|id| id.to_string())
            .collect(),
        hidden: visibility.hidden.iter().map(|id| id.to_string()).collect(),
        stats: LayoutStats {
            clusters: set.clusters.len(),
            edges: dag_edges.len(),
            cycle_edges: cycle_edges.len(),
            orphan_clusters: orphan_ids.len(),
            collision_passes,
            collision_converged,
            rejected_moves,
        },
        cross_links,
        clones,
        width,
        height,
    }
}

fn assign_rows(
    set: &ClusterSet<'_>,
    main: &[usize],
    edges: &[ClusterEdge<'_>],
    alignment: GenerationAlignment,
) -> BTreeMap<usize, usize> {
    match alignment {
        GenerationAlignment::Strict => {
            let generation = |id: usize| set.clusters[id].generation.unwrap_or(1);
            let top = main.iter().map(|&id| generation(id)).min().unwrap_or(1);
            main.iter()
                .map(|&id| (id, generation(id).saturating_sub(top)))
                .collect()
        }
        GenerationAlignment::Relaxed => {
            let pairs: Vec<(usize, usize)> = edges.iter().map(|e| (e.from, e.to)).collect();
            compute_ranks_subset(main, &pairs)
        }
    }
}

fn cluster_geometry(set: &ClusterSet<'_>, id: usize, config: &LayoutConfig) -> Geometry {
    let cluster = &set.clusters[id];
    let mut gap = config.sibling_spacing;
    if cluster.cross_lineage {
        gap *= config.cross_lineage_spacing_multiplier;
    }
    Geometry {
        width: cluster.width,
        gap,
    }
}

/// Keeps only the edges into each cluster that come from the parents of its
/// first member with visible parents.
fn primary_lineage_edges(
    index: &FamilyIndex<'_>,
    visibility: &Visibility<'_>,
    set: &ClusterSet<'_>,
    edges: &[(usize, usize)],
) -> Vec<(usize, usize)> {
    let primary: BTreeMap<usize, BTreeSet<usize>> = edges
        .iter()
        .map(|&(_, to)| to)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|to| {
            set.clusters[to].members.iter().find_map(|member| {
                let parents: BTreeSet<usize> = index
                    .parents(member)
                    .iter()
                    .filter(|parent| visibility.is_visible(parent))
                    .filter_map(|parent| set.of(parent))
                    .filter(|cluster| *cluster != to)
                    .collect();
                (!parents.is_empty()).then_some((to, parents))
            })
        })
        .collect();
    edges
        .iter()
        .copied()
        .filter(|(from, to)| primary.get(to).is_none_or(|parents| parents.contains(from)))
        .collect()
}

fn extent(positions: &PositionMap, clones: &[CloneLayout], config: &LayoutConfig) -> (f32, f32) {
    let points = positions
        .values()
        .map(|p| (p.x, p.y))
        .chain(clones.iter().map(|c| (c.x, c.y)));
    let mut max = None;
    for (x, y) in points {
        max = Some(match max {
            None => (x, y),
            Some((mx, my)) => (f32::max(mx, x), f32::max(my, y)),
        });
    }
    match max {
        Some((x, y)) => (
            x + config.node_width + config.margin,
            y + config.node_height + config.margin,
        ),
        None => (0.0, 0.0),
    }
}

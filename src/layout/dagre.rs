use std::collections::{BTreeMap, BTreeSet};

use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};

use crate::config::LayoutConfig;

use super::ranking::{NodeId, PlacementGraph, balance_coordinates, separate_row};

/// Runs the cluster graph through dagre and returns a center x per cluster,
/// or `None` when dagre did not place every cluster.
///
/// Edges carry `minlen` equal to their row distance so dagre's ranks follow
/// the generation rows. Rows still come from `graph.rows`: each row is taken
/// in dagre's x order, re-separated with the clusters' own spacing and then
/// balanced like the median placer's rows.
pub(crate) fn place_nodes_dagre(
    graph: &PlacementGraph<'_>,
    config: &LayoutConfig,
) -> Option<BTreeMap<NodeId, f32>> {
    if graph.rows.is_empty() {
        return None;
    }

    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some("tb".to_string());
    graph_config.nodesep = Some(config.sibling_spacing);
    graph_config.ranksep = Some(config.generation_spacing);
    graph_config.marginx = Some(0.0);
    graph_config.marginy = Some(0.0);
    dagre_graph.set_graph(graph_config);

    for &id in graph.rows.keys() {
        let shape = graph.geometry.get(&id).copied().unwrap_or_default();
        let mut node = DagreNode::default();
        node.width = shape.width;
        node.height = config.node_height;
        node.order = Some(id);
        dagre_graph.set_node(id.to_string(), Some(node));
    }

    let mut edge_set: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
    for &(from, to) in graph.ordering_edges {
        let (Some(&from_row), Some(&to_row)) = (graph.rows.get(&from), graph.rows.get(&to)) else {
            continue;
        };
        if to_row <= from_row || !edge_set.insert((from, to)) {
            continue;
        }
        let mut edge_label = DagreEdge::default();
        edge_label.minlen = Some((to_row - from_row) as _);
        let _ = dagre_graph.set_edge(&from.to_string(), &to.to_string(), Some(edge_label), None);
    }

    dagre_layout::run_layout(&mut dagre_graph);

    let mut by_row: BTreeMap<usize, Vec<(NodeId, f32)>> = BTreeMap::new();
    for (&id, &row) in graph.rows {
        let dagre_node = dagre_graph.node(&id.to_string())?;
        if !dagre_node.x.is_finite() {
            return None;
        }
        by_row.entry(row).or_default().push((id, dagre_node.x));
    }

    let mut centers = BTreeMap::new();
    let mut rows: Vec<Vec<NodeId>> = Vec::with_capacity(by_row.len());
    for mut row in by_row.into_values() {
        row.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        let ids: Vec<NodeId> = row.iter().map(|(id, _)| *id).collect();
        let desired: Vec<f32> = row.iter().map(|(_, x)| *x).collect();
        let xs = separate_row(&ids, desired, graph.geometry);
        centers.extend(ids.iter().copied().zip(xs));
        rows.push(ids);
    }

    let mut incoming: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    let mut outgoing: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for &(from, to) in graph.edges {
        outgoing.entry(from).or_default().push(to);
        incoming.entry(to).or_default().push(from);
    }
    balance_coordinates(
        &rows,
        graph.geometry,
        &incoming,
        &outgoing,
        config.order_passes,
        &mut centers,
    );
    Some(centers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ranking::Geometry;

    fn geometry(ids: &[NodeId], gap: f32) -> BTreeMap<NodeId, Geometry> {
        ids.iter()
            .map(|id| (*id, Geometry { width: 180.0, gap }))
            .collect()
    }

    #[test]
    fn every_cluster_gets_a_separated_center() {
        let rows = BTreeMap::from([(0, 0), (1, 1), (2, 1), (3, 1)]);
        let edges = vec![(0, 1), (0, 2), (0, 3)];
        let geometry = geometry(&[0, 1, 2, 3], 60.0);
        let graph = PlacementGraph {
            rows: &rows,
            edges: &edges,
            ordering_edges: &edges,
            geometry: &geometry,
        };
        let centers = place_nodes_dagre(&graph, &LayoutConfig::default()).unwrap();
        assert_eq!(centers.len(), 4);
        let mut row: Vec<f32> = [1, 2, 3].iter().map(|id| centers[id]).collect();
        row.sort_by(f32::total_cmp);
        for pair in row.windows(2) {
            assert!(pair[1] - pair[0] >= 240.0 - 1e-3);
        }
        let mid = row.iter().sum::<f32>() / 3.0;
        assert!((centers[&0] - mid).abs() < 1e-3);
    }

    #[test]
    fn empty_graph_is_left_to_the_fallback() {
        let rows = BTreeMap::new();
        let geometry = BTreeMap::new();
        let graph = PlacementGraph {
            rows: &rows,
            edges: &[],
            ordering_edges: &[],
            geometry: &geometry,
        };
        assert!(place_nodes_dagre(&graph, &LayoutConfig::default()).is_none());
    }
}

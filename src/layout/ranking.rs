use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

pub(crate) type NodeId = usize;

/// Horizontal footprint of a placed node: its width and the spacing it wants
/// on either side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Geometry {
    pub(crate) width: f32,
    pub(crate) gap: f32,
}

pub(crate) struct PlacementGraph<'g> {
    /// Row index of every real node.
    pub(crate) rows: &'g BTreeMap<NodeId, usize>,
    /// Edges used for coordinate balancing. Every edge points to a lower row.
    pub(crate) edges: &'g [(NodeId, NodeId)],
    /// Edges used for crossing reduction, a subset of `edges`.
    pub(crate) ordering_edges: &'g [(NodeId, NodeId)],
    pub(crate) geometry: &'g BTreeMap<NodeId, Geometry>,
}

/// Orders every row to reduce crossings and assigns a center x to every
/// real node. Returns the centers and the per-row order.
pub(crate) fn place_nodes(
    graph: &PlacementGraph<'_>,
    order_passes: usize,
) -> (BTreeMap<NodeId, f32>, Vec<Vec<NodeId>>) {
    let Some(max_row) = graph.rows.values().copied().max() else {
        return (BTreeMap::new(), Vec::new());
    };
    let mut next_dummy = graph.rows.keys().copied().max().unwrap_or(0) + 1;
    let mut node_rows = graph.rows.clone();

    // Edges spanning several rows get one ordering-only dummy per skipped row.
    let mut expanded: Vec<(NodeId, NodeId)> = Vec::with_capacity(graph.ordering_edges.len());
    for &(from, to) in graph.ordering_edges {
        let (Some(&from_row), Some(&to_row)) = (graph.rows.get(&from), graph.rows.get(&to)) else {
            continue;
        };
        if to_row <= from_row {
            continue;
        }
        let mut previous = from;
        for row in from_row + 1..to_row {
            let dummy = next_dummy;
            next_dummy += 1;
            node_rows.insert(dummy, row);
            expanded.push((previous, dummy));
            previous = dummy;
        }
        expanded.push((previous, to));
    }

    let sequence = discovery_order(&node_rows, &expanded);
    let mut buckets: Vec<Vec<NodeId>> = vec![Vec::new(); max_row + 1];
    for (&node, &row) in &node_rows {
        buckets[row].push(node);
    }
    for bucket in &mut buckets {
        bucket.sort_by_key(|node| sequence.get(node).copied().unwrap_or(usize::MAX));
    }

    order_rank_nodes(&mut buckets, &expanded, order_passes);

    let rows: Vec<Vec<NodeId>> = buckets
        .into_iter()
        .map(|bucket| {
            bucket
                .into_iter()
                .filter(|node| graph.rows.contains_key(node))
                .collect()
        })
        .collect();

    let mut incoming: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    let mut outgoing: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for &(from, to) in graph.edges {
        outgoing.entry(from).or_default().push(to);
        incoming.entry(to).or_default().push(from);
    }
    let centers = assign_coordinates(&rows, graph.geometry, &incoming, &outgoing, order_passes);
    (centers, rows)
}

/// Depth-first preorder from the top rows, following edges in insertion
/// order so siblings keep the order their edges were added in.
fn discovery_order(
    node_rows: &BTreeMap<NodeId, usize>,
    edges: &[(NodeId, NodeId)],
) -> BTreeMap<NodeId, usize> {
    let mut outgoing: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for &(from, to) in edges {
        outgoing.entry(from).or_default().push(to);
    }
    let mut starts: Vec<(usize, NodeId)> = node_rows.iter().map(|(&n, &r)| (r, n)).collect();
    starts.sort();

    let mut sequence = BTreeMap::new();
    let mut stack = Vec::new();
    for (_, start) in starts {
        stack.push(start);
        while let Some(node) = stack.pop() {
            if sequence.contains_key(&node) {
                continue;
            }
            sequence.insert(node, sequence.len());
            if let Some(nexts) = outgoing.get(&node) {
                stack.extend(nexts.iter().rev().copied());
            }
        }
    }
    sequence
}

pub(crate) fn order_rank_nodes(
    rank_nodes: &mut [Vec<NodeId>],
    edges: &[(NodeId, NodeId)],
    passes: usize,
) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let mut incoming: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    let mut outgoing: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for &(from, to) in edges {
        outgoing.entry(from).or_default().push(to);
        incoming.entry(to).or_default().push(from);
    }

    let mut positions: BTreeMap<NodeId, usize> = BTreeMap::new();
    let update_positions =
        |rank_nodes: &mut [Vec<NodeId>], positions: &mut BTreeMap<NodeId, usize>| {
            positions.clear();
            for bucket in rank_nodes.iter() {
                for (idx, node) in bucket.iter().enumerate() {
                    positions.insert(*node, idx);
                }
            }
        };
    update_positions(rank_nodes, &mut positions);

    let sort_bucket = |bucket: &mut Vec<NodeId>,
                       neighbors: &BTreeMap<NodeId, Vec<NodeId>>,
                       positions: &BTreeMap<NodeId, usize>| {
        let current: BTreeMap<NodeId, usize> =
            bucket.iter().enumerate().map(|(idx, n)| (*n, idx)).collect();
        bucket.sort_by(|a, b| {
            let a_score = median_position(*a, neighbors, positions, &current);
            let b_score = median_position(*b, neighbors, positions, &current);
            match a_score.partial_cmp(&b_score) {
                Some(Ordering::Equal) | None => current[a].cmp(&current[b]).then(a.cmp(b)),
                Some(ordering) => ordering,
            }
        });
    };

    for _ in 0..passes.max(1) {
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
            update_positions(rank_nodes, &mut positions);
        }
        for rank in (0..rank_nodes.len() - 1).rev() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
            update_positions(rank_nodes, &mut positions);
        }
    }
}

pub(crate) fn median_position(
    node: NodeId,
    neighbors: &BTreeMap<NodeId, Vec<NodeId>>,
    positions: &BTreeMap<NodeId, usize>,
    current: &BTreeMap<NodeId, usize>,
) -> f32 {
    let fallback = current.get(&node).copied().unwrap_or(0) as f32;
    let Some(list) = neighbors.get(&node) else {
        return fallback;
    };
    let mut values: Vec<f32> = list
        .iter()
        .filter_map(|neighbor| positions.get(neighbor))
        .map(|pos| *pos as f32)
        .collect();
    if values.is_empty() {
        return fallback;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

/// Longest-path layering. Nodes are released in id order; on a cycle the
/// smallest remaining id becomes the next source and its incoming edges
/// are treated as back-edges.
pub(crate) fn compute_ranks_subset(
    node_ids: &[NodeId],
    edges: &[(NodeId, NodeId)],
) -> BTreeMap<NodeId, usize> {
    let set: BTreeSet<NodeId> = node_ids.iter().copied().collect();
    let mut adj: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    let mut indeg: BTreeMap<NodeId, usize> = set.iter().map(|id| (*id, 0)).collect();
    for &(from, to) in edges {
        if set.contains(&from) && set.contains(&to) {
            adj.entry(from).or_default().push(to);
            if let Some(deg) = indeg.get_mut(&to) {
                *deg += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<NodeId>> = indeg
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();

    let mut order = Vec::with_capacity(set.len());
    let mut processed: BTreeSet<NodeId> = BTreeSet::new();
    loop {
        while let Some(Reverse(id)) = ready.pop() {
            if !processed.insert(id) {
                continue;
            }
            order.push(id);
            for next in adj.get(&id).into_iter().flatten() {
                if processed.contains(next) {
                    continue;
                }
                if let Some(deg) = indeg.get_mut(next) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push(Reverse(*next));
                    }
                }
            }
        }
        if processed.len() >= set.len() {
            break;
        }
        match set.iter().find(|id| !processed.contains(id)) {
            Some(&id) => ready.push(Reverse(id)),
            None => break,
        }
    }

    let order_index: BTreeMap<NodeId, usize> =
        order.iter().enumerate().map(|(idx, id)| (*id, idx)).collect();
    let mut ranks: BTreeMap<NodeId, usize> = BTreeMap::new();
    for node in &order {
        let rank = *ranks.entry(*node).or_insert(0);
        let from_idx = order_index[node];
        for next in adj.get(node).into_iter().flatten() {
            if order_index.get(next).is_none_or(|to_idx| *to_idx <= from_idx) {
                continue;
            }
            let entry = ranks.entry(*next).or_insert(0);
            *entry = (*entry).max(rank + 1);
        }
    }
    ranks
}

fn separation(a: Geometry, b: Geometry) -> f32 {
    a.width / 2.0 + a.gap.max(b.gap) + b.width / 2.0
}

/// Packs each row left to right, then alternates down and up sweeps that
/// pull nodes toward the mean of their neighbors while keeping row order
/// and separation.
pub(crate) fn assign_coordinates(
    rows: &[Vec<NodeId>],
    geometry: &BTreeMap<NodeId, Geometry>,
    incoming: &BTreeMap<NodeId, Vec<NodeId>>,
    outgoing: &BTreeMap<NodeId, Vec<NodeId>>,
    passes: usize,
) -> BTreeMap<NodeId, f32> {
    let shape = |id: &NodeId| geometry.get(id).copied().unwrap_or_default();
    let mut centers = BTreeMap::new();
    for row in rows {
        let mut previous: Option<(NodeId, f32)> = None;
        for id in row {
            let center = match previous {
                None => shape(id).width / 2.0,
                Some((prev, prev_center)) => prev_center + separation(shape(&prev), shape(id)),
            };
            centers.insert(*id, center);
            previous = Some((*id, center));
        }
    }

    balance_coordinates(rows, geometry, incoming, outgoing, passes, &mut centers);
    centers
}

/// Alternating down and up sweeps over ordered rows, starting from
/// `centers`. Each sweep moves nodes toward the mean of their neighbors in
/// the previous row while keeping row order and separation.
pub(crate) fn balance_coordinates(
    rows: &[Vec<NodeId>],
    geometry: &BTreeMap<NodeId, Geometry>,
    incoming: &BTreeMap<NodeId, Vec<NodeId>>,
    outgoing: &BTreeMap<NodeId, Vec<NodeId>>,
    passes: usize,
    centers: &mut BTreeMap<NodeId, f32>,
) {
    let shape = |id: &NodeId| geometry.get(id).copied().unwrap_or_default();
    for _ in 0..passes.max(1) {
        for row in rows.iter().skip(1) {
            balance_row(row, &shape, incoming, centers);
        }
        for row in rows.iter().rev().skip(1) {
            balance_row(row, &shape, outgoing, centers);
        }
    }
}

fn balance_row(
    row: &[NodeId],
    shape: &impl Fn(&NodeId) -> Geometry,
    neighbors: &BTreeMap<NodeId, Vec<NodeId>>,
    centers: &mut BTreeMap<NodeId, f32>,
) {
    if row.is_empty() {
        return;
    }
    let desired: Vec<f32> = row
        .iter()
        .map(|id| {
            let own = centers.get(id).copied().unwrap_or(0.0);
            let values: Vec<f32> = neighbors
                .get(id)
                .into_iter()
                .flatten()
                .filter_map(|n| centers.get(n).copied())
                .collect();
            if values.is_empty() {
                own
            } else {
                values.iter().sum::<f32>() / values.len() as f32
            }
        })
        .collect();
    let xs = feasible_row(row, desired, shape);
    for (id, x) in row.iter().zip(xs) {
        centers.insert(*id, x);
    }
}

/// Centers near `desired` that keep `row`'s order and separation: the
/// mean of a left-to-right and a right-to-left push, each of which already
/// satisfies every separation.
fn feasible_row(row: &[NodeId], desired: Vec<f32>, shape: &impl Fn(&NodeId) -> Geometry) -> Vec<f32> {
    let seps: Vec<f32> = row
        .windows(2)
        .map(|pair| separation(shape(&pair[0]), shape(&pair[1])))
        .collect();
    let mut forward = desired.clone();
    for i in 1..forward.len() {
        forward[i] = forward[i].max(forward[i - 1] + seps[i - 1]);
    }
    let mut backward = desired;
    for i in (0..backward.len().saturating_sub(1)).rev() {
        backward[i] = backward[i].min(backward[i + 1] - seps[i]);
    }
    forward
        .iter()
        .zip(&backward)
        .map(|(f, b)| (f + b) / 2.0)
        .collect()
}

/// Separates one ordered row around externally chosen centers.
pub(crate) fn separate_row(
    row: &[NodeId],
    desired: Vec<f32>,
    geometry: &BTreeMap<NodeId, Geometry>,
) -> Vec<f32> {
    let shape = |id: &NodeId| geometry.get(id).copied().unwrap_or_default();
    feasible_row(row, desired, &shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(ids: &[NodeId]) -> BTreeMap<NodeId, Geometry> {
        ids.iter()
            .map(|id| {
                (
                    *id,
                    Geometry {
                        width: 180.0,
                        gap: 60.0,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn ranks_follow_longest_path() {
        let ranks = compute_ranks_subset(&[0, 1, 2, 3], &[(0, 1), (1, 2), (0, 2), (3, 2)]);
        assert_eq!(ranks[&0], 0);
        assert_eq!(ranks[&1], 1);
        assert_eq!(ranks[&2], 2);
        assert_eq!(ranks[&3], 0);
    }

    #[test]
    fn cycles_break_at_the_smallest_id() {
        let ranks = compute_ranks_subset(&[0, 1, 2], &[(0, 1), (1, 2), (2, 0)]);
        assert_eq!(ranks[&0], 0);
        assert_eq!(ranks[&1], 1);
        assert_eq!(ranks[&2], 2);
    }

    #[test]
    fn median_sweeps_remove_a_crossing() {
        let mut rows = vec![vec![0, 1], vec![2, 3]];
        order_rank_nodes(&mut rows, &[(0, 3), (1, 2)], 2);
        assert_eq!(rows, vec![vec![0, 1], vec![3, 2]]);
    }

    #[test]
    fn balancing_centers_a_parent_over_two_children() {
        let rows = vec![vec![0], vec![1, 2]];
        let incoming = BTreeMap::from([(1, vec![0]), (2, vec![0])]);
        let outgoing = BTreeMap::from([(0, vec![1, 2])]);
        let centers = assign_coordinates(&rows, &uniform(&[0, 1, 2]), &incoming, &outgoing, 2);
        let mid = (centers[&1] + centers[&2]) / 2.0;
        assert!((centers[&0] - mid).abs() < 1e-3);
        assert!((centers[&2] - centers[&1] - 240.0).abs() < 1e-3);
    }

    #[test]
    fn separate_row_keeps_order_and_spacing() {
        let geometry = uniform(&[0, 1, 2]);
        let xs = separate_row(&[0, 1, 2], vec![0.0, 100.0, 1000.0], &geometry);
        assert!((xs[1] - xs[0] - 240.0).abs() < 1e-3);
        assert!((xs[2] - 1000.0).abs() < 1e-3);
        assert!((xs[0] + xs[1] - 100.0).abs() < 1e-3);

        let untouched = separate_row(&[0, 1], vec![0.0, 500.0], &geometry);
        assert_eq!(untouched, vec![0.0, 500.0]);
    }

    #[test]
    fn long_edges_keep_children_under_their_parents() {
        // Two lineages; the second has a child two rows down.
        let rows = BTreeMap::from([(0, 0), (1, 0), (2, 1), (3, 2)]);
        let edges = vec![(0, 2), (1, 3)];
        let geometry = uniform(&[0, 1, 2, 3]);
        let graph = PlacementGraph {
            rows: &rows,
            edges: &edges,
            ordering_edges: &edges,
            geometry: &geometry,
        };
        let (centers, order) = place_nodes(&graph, 4);
        assert_eq!(order, vec![vec![0, 1], vec![2], vec![3]]);
        assert!(centers[&1] - centers[&0] >= 240.0 - 1e-3);
        assert!((centers[&3] - centers[&1]).abs() < 1e-3);
    }
}

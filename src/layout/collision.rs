use std::collections::BTreeMap;

use super::ClusterBox;

const EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CollisionOutcome {
    pub(crate) passes: usize,
    pub(crate) converged: bool,
}

pub(crate) fn row_key(y: f32, tolerance: f32) -> i64 {
    (y / tolerance.max(EPSILON)).round() as i64
}

/// Box indices grouped by row and sorted left to right (ties by cluster id).
pub(crate) fn row_groups(boxes: &[ClusterBox], tolerance: f32) -> BTreeMap<i64, Vec<usize>> {
    let mut rows: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, item) in boxes.iter().enumerate() {
        rows.entry(row_key(item.y, tolerance)).or_default().push(idx);
    }
    for row in rows.values_mut() {
        row.sort_by(|a, b| {
            boxes[*a]
                .x
                .total_cmp(&boxes[*b].x)
                .then(boxes[*a].id.cmp(&boxes[*b].id))
        });
    }
    rows
}

/// Pushes every adjacent same-row pair closer than `min_gap` apart by half
/// the shortfall each, for at most `budget` passes. Stops after the first
/// pass that finds nothing to fix.
pub(crate) fn resolve_collisions(
    boxes: &mut [ClusterBox],
    min_gap: f32,
    tolerance: f32,
    budget: usize,
) -> CollisionOutcome {
    for pass in 1..=budget {
        let mut overlaps = 0usize;
        for row in row_groups(boxes, tolerance).into_values() {
            for pair in row.windows(2) {
                let (left, right) = (pair[0], pair[1]);
                let gap = boxes[right].x - boxes[left].right();
                if gap < min_gap - EPSILON {
                    let push = (min_gap - gap) / 2.0;
                    boxes[left].x -= push;
                    boxes[right].x += push;
                    overlaps += 1;
                }
            }
        }
        if overlaps == 0 {
            return CollisionOutcome {
                passes: pass,
                converged: true,
            };
        }
    }
    CollisionOutcome {
        passes: budget,
        converged: count_overlaps(boxes, min_gap, tolerance) == 0,
    }
}

pub(crate) fn count_overlaps(boxes: &[ClusterBox], min_gap: f32, tolerance: f32) -> usize {
    row_groups(boxes, tolerance)
        .values()
        .map(|row| {
            row.windows(2)
                .filter(|pair| boxes[pair[1]].x - boxes[pair[0]].right() < min_gap - EPSILON)
                .count()
        })
        .sum()
}

/// Whether the box at `idx` could sit at `new_x` keeping `min_gap` to every
/// other box in its row.
pub(crate) fn fits(
    boxes: &[ClusterBox],
    idx: usize,
    new_x: f32,
    min_gap: f32,
    tolerance: f32,
) -> bool {
    let moving = boxes[idx];
    let row = row_key(moving.y, tolerance);
    let new_right = new_x + moving.width;
    boxes.iter().enumerate().all(|(other_idx, other)| {
        other_idx == idx
            || row_key(other.y, tolerance) != row
            || new_right + min_gap <= other.x + EPSILON
            || other.right() + min_gap <= new_x + EPSILON
    })
}

use crate::config::LayoutConfig;

use super::ClusterBox;
use super::collision::row_groups;

/// Tightens every row left to right: a cluster further than its target
/// spacing from its left neighbor moves left by `compaction_fraction` of the
/// slack. Order is preserved and no gap ever widens. Returns the number of
/// clusters moved.
pub(crate) fn compact_rows(boxes: &mut [ClusterBox], config: &LayoutConfig) -> usize {
    let fraction = config.compaction_fraction;
    if fraction <= 0.0 {
        return 0;
    }
    let mut moved = 0;
    for row in row_groups(boxes, config.collision.row_tolerance).into_values() {
        for pair in row.windows(2) {
            let left = boxes[pair[0]];
            let current = &mut boxes[pair[1]];
            let target = left.gap.max(current.gap).max(config.min_gap);
            let gap = current.x - left.right();
            if gap > target {
                current.x -= (gap - target) * fraction;
                moved += 1;
            }
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: usize, x: f32) -> ClusterBox {
        ClusterBox {
            id,
            x,
            y: 0.0,
            width: 100.0,
            gap: 60.0,
        }
    }

    #[test]
    fn halves_slack_without_reordering() {
        let mut boxes = vec![item(0, 0.0), item(1, 300.0), item(2, 420.0)];
        let moved = compact_rows(&mut boxes, &LayoutConfig::default());
        // 200 gap, target 60 -> moves 70 left.
        assert_eq!(boxes[1].x, 230.0);
        // Gap after the first move is 90 -> moves 15 left.
        assert_eq!(boxes[2].x, 405.0);
        assert_eq!(moved, 2);
        assert!(boxes[0].x < boxes[1].x && boxes[1].x < boxes[2].x);
    }

    #[test]
    fn never_widens_tight_rows() {
        let mut boxes = vec![item(0, 0.0), item(1, 130.0)];
        compact_rows(&mut boxes, &LayoutConfig::default());
        assert_eq!(boxes[1].x, 130.0);
    }
}

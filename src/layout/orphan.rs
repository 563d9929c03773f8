use crate::config::LayoutConfig;

use super::ClusterBox;
use super::types::CloneLayout;

/// Lays orphan clusters on a grid under the main tree, wrapping after
/// `orphan_columns` clusters per row. The grid starts at the main tree's
/// left edge.
pub(crate) fn place_orphans(main: &[ClusterBox], orphans: &mut [ClusterBox], config: &LayoutConfig) {
    if orphans.is_empty() {
        return;
    }
    let (start_x, start_y) = if main.is_empty() {
        (0.0, 0.0)
    } else {
        let min_x = main.iter().map(|item| item.x).fold(f32::MAX, f32::min);
        let max_y = main.iter().map(|item| item.y).fold(f32::MIN, f32::max);
        (min_x, max_y + config.node_height + config.orphan_gap)
    };

    let columns = config.orphan_columns.max(1);
    let mut cursor = start_x;
    let mut y = start_y;
    for (idx, item) in orphans.iter_mut().enumerate() {
        if idx > 0 && idx % columns == 0 {
            cursor = start_x;
            y += config.node_height + config.orphan_row_gap;
        }
        item.x = cursor;
        item.y = y;
        cursor += item.width + config.sibling_spacing;
    }
}

/// Translates boxes and clones so the bounding box starts at `margin`.
pub(crate) fn normalize(boxes: &mut [ClusterBox], clones: &mut [CloneLayout], margin: f32) {
    let min_x = boxes
        .iter()
        .map(|item| item.x)
        .chain(clones.iter().map(|clone| clone.x))
        .fold(f32::MAX, f32::min);
    let min_y = boxes
        .iter()
        .map(|item| item.y)
        .chain(clones.iter().map(|clone| clone.y))
        .fold(f32::MAX, f32::min);
    if min_x == f32::MAX || min_y == f32::MAX {
        return;
    }
    let shift_x = margin - min_x;
    let shift_y = margin - min_y;
    for item in boxes.iter_mut() {
        item.x += shift_x;
        item.y += shift_y;
    }
    for clone in clones.iter_mut() {
        clone.x += shift_x;
        clone.y += shift_y;
    }
}

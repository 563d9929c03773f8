use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use tracing::warn;

use crate::config::LayoutConfig;
use crate::ir::Person;

use super::ClusterBox;
use super::cluster::ClusterSet;
use super::collision::{fits, row_key};
use super::family::FamilyIndex;
use super::visibility::Visibility;

const EPSILON: f32 = 1e-3;

/// Everything the aesthetic passes read. `slot` maps a cluster id to its
/// index in the box slice; `edges` only holds edges between placed boxes.
pub(crate) struct AestheticContext<'c, 'a> {
    pub(crate) index: &'c FamilyIndex<'a>,
    pub(crate) visibility: &'c Visibility<'a>,
    pub(crate) set: &'c ClusterSet<'a>,
    pub(crate) edges: &'c [(usize, usize)],
    pub(crate) slot: &'c BTreeMap<usize, usize>,
    pub(crate) config: &'c LayoutConfig,
}

impl AestheticContext<'_, '_> {
    fn try_move(&self, boxes: &mut [ClusterBox], idx: usize, new_x: f32) -> bool {
        if (boxes[idx].x - new_x).abs() < EPSILON {
            return true;
        }
        if fits(
            boxes,
            idx,
            new_x,
            self.config.min_gap,
            self.config.collision.row_tolerance,
        ) {
            boxes[idx].x = new_x;
            true
        } else {
            false
        }
    }

    fn neighbors(&self, outgoing: bool) -> BTreeMap<usize, Vec<usize>> {
        let mut map: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &(from, to) in self.edges {
            let (Some(&from_idx), Some(&to_idx)) = (self.slot.get(&from), self.slot.get(&to))
            else {
                continue;
            };
            if outgoing {
                map.entry(from_idx).or_default().push(to_idx);
            } else {
                map.entry(to_idx).or_default().push(from_idx);
            }
        }
        map
    }

    fn rows_top_down(&self, boxes: &[ClusterBox]) -> Vec<usize> {
        let tolerance = self.config.collision.row_tolerance;
        let mut order: Vec<usize> = (0..boxes.len()).collect();
        order.sort_by(|a, b| {
            row_key(boxes[*a].y, tolerance)
                .cmp(&row_key(boxes[*b].y, tolerance))
                .then(boxes[*a].x.total_cmp(&boxes[*b].x))
                .then(boxes[*a].id.cmp(&boxes[*b].id))
        });
        order
    }
}

fn mean_center(boxes: &[ClusterBox], indices: &[usize]) -> Option<f32> {
    if indices.is_empty() {
        return None;
    }
    Some(indices.iter().map(|idx| boxes[*idx].center()).sum::<f32>() / indices.len() as f32)
}

/// Re-sorts each parent's same-row child clusters by birth order, repacking
/// them over the span they already occupy. A group that would collide stays
/// as it was.
/// Returns the number of rejected groups.
pub(crate) fn reorder_siblings(boxes: &mut [ClusterBox], ctx: &AestheticContext<'_, '_>) -> usize {
    let tolerance = ctx.config.collision.row_tolerance;
    let mut rejected = 0;
    let mut handled: BTreeSet<Vec<usize>> = BTreeSet::new();

    for &parent in &ctx.index.order {
        if !ctx.visibility.is_visible(parent) {
            continue;
        }
        let own_cluster = ctx.set.of(parent);
        let mut by_row: BTreeMap<i64, Vec<(&str, usize)>> = BTreeMap::new();
        for child in ctx.index.children(parent) {
            if !ctx.visibility.is_visible(child) {
                continue;
            }
            let Some(cluster) = ctx.set.of(child) else {
                continue;
            };
            if Some(cluster) == own_cluster {
                continue;
            }
            let Some(&idx) = ctx.slot.get(&cluster) else {
                continue;
            };
            by_row
                .entry(row_key(boxes[idx].y, tolerance))
                .or_default()
                .push((child, idx));
        }

        for mut group in by_row.into_values() {
            if group.len() < 2 {
                continue;
            }
            let unique: BTreeSet<usize> = group.iter().map(|(_, idx)| *idx).collect();
            if unique.len() != group.len() {
                continue;
            }
            group.sort_by(|a, b| ctx.index.compare_birth(a.0, b.0, true));
            let desired: Vec<usize> = group.iter().map(|(_, idx)| *idx).collect();
            if !handled.insert(desired.clone()) {
                continue;
            }

            let mut current = desired.clone();
            current.sort_by(|a, b| boxes[*a].x.total_cmp(&boxes[*b].x));
            if current == desired {
                continue;
            }
            // Repack from the leftmost slot with each cluster's own width,
            // keeping the gaps between consecutive slots.
            let gaps: Vec<f32> = current
                .windows(2)
                .map(|pair| boxes[pair[1]].x - boxes[pair[0]].right())
                .collect();
            let previous: Vec<(usize, f32)> = desired.iter().map(|idx| (*idx, boxes[*idx].x)).collect();
            let mut cursor = boxes[current[0]].x;
            for (pos, idx) in desired.iter().enumerate() {
                boxes[*idx].x = cursor;
                cursor += boxes[*idx].width + gaps.get(pos).copied().unwrap_or(0.0);
            }
            let view: &[ClusterBox] = boxes;
            let collides = desired
                .iter()
                .any(|idx| !fits(view, *idx, view[*idx].x, ctx.config.min_gap, tolerance));
            if collides {
                for (idx, x) in previous {
                    boxes[idx].x = x;
                }
                rejected += 1;
            }
        }
    }
    rejected
}

/// Moves each parent cluster over the mean of its child clusters, deepest
/// rows first, for the configured number of iterations.
pub(crate) fn center_parents(boxes: &mut [ClusterBox], ctx: &AestheticContext<'_, '_>) -> usize {
    let children = ctx.neighbors(true);
    let mut rejected = 0;
    for _ in 0..ctx.config.aesthetics.parent_centering_iterations {
        let mut order = ctx.rows_top_down(boxes);
        order.reverse();
        for idx in order {
            let Some(list) = children.get(&idx) else {
                continue;
            };
            let Some(target) = mean_center(boxes, list) else {
                continue;
            };
            let new_x = target - boxes[idx].width / 2.0;
            if !ctx.try_move(boxes, idx, new_x) {
                rejected += 1;
            }
        }
    }
    rejected
}

/// Pulls child clusters that drifted far from their parents part of the way
/// back. Cross-lineage clusters tolerate a larger drift.
pub(crate) fn pull_children(boxes: &mut [ClusterBox], ctx: &AestheticContext<'_, '_>) -> usize {
    let parents = ctx.neighbors(false);
    let aesthetics = &ctx.config.aesthetics;
    let mut rejected = 0;
    for idx in ctx.rows_top_down(boxes) {
        let Some(list) = parents.get(&idx) else {
            continue;
        };
        let Some(anchor) = mean_center(boxes, list) else {
            continue;
        };
        let cross_lineage = ctx
            .set
            .clusters
            .get(boxes[idx].id)
            .is_some_and(|cluster| cluster.cross_lineage);
        let mut threshold = aesthetics.child_pull_threshold;
        if cross_lineage {
            threshold *= ctx.config.cross_lineage_pull_multiplier;
        }
        let distance = anchor - boxes[idx].center();
        if distance.abs() <= threshold {
            continue;
        }
        let new_x = boxes[idx].x + distance * aesthetics.child_pull_factor;
        if !ctx.try_move(boxes, idx, new_x) {
            rejected += 1;
        }
    }
    rejected
}

/// Recognizes noble and honorific titles at the start of a name.
pub(crate) struct TitleMatcher {
    pattern: Regex,
}

impl TitleMatcher {
    pub(crate) fn new(prefixes: &[String]) -> Option<Self> {
        let mut prefixes: Vec<&str> = prefixes
            .iter()
            .map(|prefix| prefix.trim())
            .filter(|prefix| !prefix.is_empty())
            .collect();
        if prefixes.is_empty() {
            return None;
        }
        // Leftmost-first alternation: longer prefixes must come first.
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = prefixes
            .iter()
            .map(|prefix| regex::escape(prefix))
            .collect::<Vec<_>>()
            .join("|");
        match Regex::new(&format!(r"(?i)^\s*({alternation})\b")) {
            Ok(pattern) => Some(Self { pattern }),
            Err(err) => {
                warn!(error = %err, "title pattern rejected, title grouping disabled");
                None
            }
        }
    }

    pub(crate) fn match_name(&self, name: &str) -> Option<String> {
        self.pattern
            .captures(name)
            .and_then(|captures| captures.get(1))
            .map(|title| normalize_title(title.as_str()))
    }

    /// Explicit title first, then a prefix of the name.
    pub(crate) fn title_of(&self, person: &Person) -> Option<String> {
        if let Some(title) = person.title.as_deref().map(str::trim)
            && !title.is_empty()
        {
            return Some(normalize_title(title));
        }
        person.name.as_deref().and_then(|name| self.match_name(name))
    }
}

fn normalize_title(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Nudges clusters that share a title toward the group's median x by the
/// damping factor. A cluster's title is the first titled member's.
pub(crate) fn group_titles(
    boxes: &mut [ClusterBox],
    ctx: &AestheticContext<'_, '_>,
    matcher: Option<&TitleMatcher>,
) -> usize {
    let Some(matcher) = matcher else {
        return 0;
    };
    let damping = ctx.config.aesthetics.title_damping;
    if damping <= 0.0 {
        return 0;
    }

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, item) in boxes.iter().enumerate() {
        let Some(cluster) = ctx.set.clusters.get(item.id) else {
            continue;
        };
        let title = cluster
            .members
            .iter()
            .filter_map(|member| ctx.index.person(member))
            .find_map(|person| matcher.title_of(person));
        if let Some(title) = title {
            groups.entry(title).or_default().push(idx);
        }
    }

    let mut rejected = 0;
    for members in groups.values() {
        if members.len() < 2 {
            continue;
        }
        let mut centers: Vec<f32> = members.iter().map(|idx| boxes[*idx].center()).collect();
        centers.sort_by(f32::total_cmp);
        let mid = centers.len() / 2;
        let median = if centers.len() % 2 == 1 {
            centers[mid]
        } else {
            (centers[mid - 1] + centers[mid]) / 2.0
        };
        for &idx in members {
            let shift = (median - boxes[idx].center()) * damping;
            if !ctx.try_move(boxes, idx, boxes[idx].x + shift) {
                rejected += 1;
            }
        }
    }
    rejected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AestheticConfig;
    use crate::ir::{FamilySnapshot, Gender};
    use crate::layout::cluster::build_clusters;
    use crate::layout::generation::assign_generations;
    use crate::layout::visibility::apply_collapse;

    fn item(id: usize, x: f32, y: f32, width: f32) -> ClusterBox {
        ClusterBox {
            id,
            x,
            y,
            width,
            gap: 60.0,
        }
    }

    fn add(snapshot: &mut FamilySnapshot, id: &str, gender: Gender) {
        snapshot.upsert_person(Person::new(id, gender));
    }

    /// Runs one pass over `boxes` with a context built from `snapshot`.
    /// Cluster ids follow the first member's input position.
    fn run_pass(
        snapshot: &FamilySnapshot,
        edges: &[(usize, usize)],
        boxes: &mut [ClusterBox],
        pass: impl Fn(&mut [ClusterBox], &AestheticContext<'_, '_>) -> usize,
    ) -> usize {
        let config = LayoutConfig::default();
        let index = FamilyIndex::build(snapshot);
        let visibility = apply_collapse(&index, &BTreeSet::new());
        let generations = assign_generations(&index, None);
        let set = build_clusters(&index, &visibility, &generations, &config);
        let slot: BTreeMap<usize, usize> = boxes
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.id, idx))
            .collect();
        let ctx = AestheticContext {
            index: &index,
            visibility: &visibility,
            set: &set,
            edges,
            slot: &slot,
            config: &config,
        };
        pass(boxes, &ctx)
    }

    #[test]
    fn far_children_are_pulled_part_way() {
        let mut snapshot = FamilySnapshot::new();
        add(&mut snapshot, "p", Gender::Male);
        add(&mut snapshot, "c", Gender::Male);
        snapshot.add_child("p", "c");

        let mut boxes = [item(0, 0.0, 0.0, 180.0), item(1, 1000.0, 200.0, 180.0)];
        let rejected = run_pass(&snapshot, &[(0, 1)], &mut boxes, pull_children);
        assert_eq!(rejected, 0);
        assert!((boxes[1].x - 700.0).abs() < 1e-3);

        // Within the threshold nothing moves.
        let mut boxes = [item(0, 0.0, 0.0, 180.0), item(1, 200.0, 200.0, 180.0)];
        run_pass(&snapshot, &[(0, 1)], &mut boxes, pull_children);
        assert_eq!(boxes[1].x, 200.0);
    }

    #[test]
    fn blocked_pull_is_rejected() {
        let mut snapshot = FamilySnapshot::new();
        add(&mut snapshot, "p", Gender::Male);
        add(&mut snapshot, "c", Gender::Male);
        add(&mut snapshot, "z", Gender::Male);
        snapshot.add_child("p", "c");

        let mut boxes = [
            item(0, 0.0, 0.0, 180.0),
            item(1, 1000.0, 200.0, 180.0),
            item(2, 600.0, 200.0, 180.0),
        ];
        let rejected = run_pass(&snapshot, &[(0, 1)], &mut boxes, pull_children);
        assert_eq!(rejected, 1);
        assert_eq!(boxes[1].x, 1000.0);
    }

    #[test]
    fn cross_lineage_couples_tolerate_a_wider_drift() {
        let mut snapshot = FamilySnapshot::new();
        add(&mut snapshot, "ra", Gender::Male);
        add(&mut snapshot, "rb", Gender::Male);
        add(&mut snapshot, "groom", Gender::Male);
        add(&mut snapshot, "bride", Gender::Female);
        snapshot.add_child("ra", "groom");
        snapshot.add_child("rb", "bride");
        snapshot.marry("groom", "bride", None);
        let edges = [(0, 2), (1, 2)];
        let parents = || [item(0, 0.0, 0.0, 180.0), item(1, 400.0, 0.0, 180.0)];

        // Anchor 290, couple center 600: past 240 but inside 2 x 240.
        let [a, b] = parents();
        let mut boxes = [a, b, item(2, 400.0, 200.0, 400.0)];
        run_pass(&snapshot, &edges, &mut boxes, pull_children);
        assert_eq!(boxes[2].x, 400.0);

        // Couple center 900 is past the widened threshold.
        let [a, b] = parents();
        let mut boxes = [a, b, item(2, 700.0, 200.0, 400.0)];
        run_pass(&snapshot, &edges, &mut boxes, pull_children);
        assert!((boxes[2].x - 517.0).abs() < 1e-2);
    }

    #[test]
    fn parent_centering_moves_or_rejects() {
        let mut snapshot = FamilySnapshot::new();
        add(&mut snapshot, "p", Gender::Male);
        add(&mut snapshot, "c", Gender::Male);
        add(&mut snapshot, "q", Gender::Male);
        snapshot.add_child("p", "c");

        let mut boxes = [item(0, 0.0, 0.0, 180.0), item(1, 500.0, 200.0, 180.0)];
        let rejected = run_pass(&snapshot, &[(0, 1)], &mut boxes, center_parents);
        assert_eq!(rejected, 0);
        assert_eq!(boxes[0].x, 500.0);

        // q blocks the target slot on every iteration.
        let mut boxes = [
            item(0, 0.0, 0.0, 180.0),
            item(1, 500.0, 200.0, 180.0),
            item(2, 400.0, 0.0, 180.0),
        ];
        let rejected = run_pass(&snapshot, &[(0, 1)], &mut boxes, center_parents);
        assert_eq!(rejected, 3);
        assert_eq!(boxes[0].x, 0.0);
    }

    #[test]
    fn half_siblings_of_unequal_width_are_repacked_in_birth_order() {
        let mut snapshot = FamilySnapshot::new();
        add(&mut snapshot, "h", Gender::Male);
        add(&mut snapshot, "w1", Gender::Female);
        add(&mut snapshot, "w2", Gender::Female);
        add(&mut snapshot, "a", Gender::Male);
        add(&mut snapshot, "x", Gender::Female);
        add(&mut snapshot, "b", Gender::Female);
        snapshot.marry("h", "w1", Some(1));
        snapshot.marry("h", "w2", Some(2));
        snapshot.marry("a", "x", None);
        for (parent, child) in [("h", "a"), ("w2", "a"), ("h", "b"), ("w1", "b")] {
            snapshot.add_child(parent, child);
        }
        snapshot.persons[3].birth_date = Some("2000".into());
        snapshot.persons[5].birth_date = Some("2005".into());

        // Clusters: 0 = h with wives, 1 = a and x, 2 = b.
        let mut boxes = [
            item(0, 0.0, 0.0, 620.0),
            item(1, 335.0, 200.0, 400.0),
            item(2, 95.0, 200.0, 180.0),
        ];
        let rejected = run_pass(&snapshot, &[(0, 1), (0, 2)], &mut boxes, reorder_siblings);
        assert_eq!(rejected, 0);
        assert_eq!(boxes[1].x, 95.0);
        assert_eq!(boxes[2].x, 555.0);
    }

    #[test]
    fn shared_titles_are_nudged_toward_their_median() {
        let mut snapshot = FamilySnapshot::new();
        for (id, name) in [("r1", "Raden Arya"), ("r2", "Raden Bagus"), ("o", "Budi")] {
            let mut person = Person::new(id, Gender::Male);
            person.name = Some(name.into());
            snapshot.upsert_person(person);
        }
        let matcher = matcher();
        let mut boxes = [
            item(0, 0.0, 0.0, 180.0),
            item(1, 1000.0, 0.0, 180.0),
            item(2, 400.0, 0.0, 180.0),
        ];
        let rejected = run_pass(&snapshot, &[], &mut boxes, |boxes, ctx| {
            group_titles(boxes, ctx, Some(&matcher))
        });
        assert_eq!(rejected, 0);
        assert!((boxes[0].x - 150.0).abs() < 1e-3);
        assert!((boxes[1].x - 850.0).abs() < 1e-3);
        assert_eq!(boxes[2].x, 400.0);
    }

    fn matcher() -> TitleMatcher {
        TitleMatcher::new(&AestheticConfig::default().title_prefixes).unwrap()
    }

    #[test]
    fn longest_title_prefix_wins() {
        let matcher = matcher();
        assert_eq!(
            matcher.match_name("Raden Mas Said").as_deref(),
            Some("raden mas")
        );
        assert_eq!(matcher.match_name("raden Ajeng Kartini").as_deref(), Some("raden ajeng"));
        assert_eq!(matcher.match_name("RADEN Sosro").as_deref(), Some("raden"));
        assert_eq!(matcher.match_name("Radenmas Palsu"), None);
        assert_eq!(matcher.match_name("Budi Raden"), None);
    }

    #[test]
    fn explicit_title_beats_name_prefix() {
        let matcher = matcher();
        let mut person = Person::new("p", Gender::Male);
        person.name = Some("Tengku Amir".into());
        assert_eq!(matcher.title_of(&person).as_deref(), Some("tengku"));
        person.title = Some("  Sultan  ".into());
        assert_eq!(matcher.title_of(&person).as_deref(), Some("sultan"));
    }

    #[test]
    fn empty_prefix_list_disables_matching() {
        assert!(TitleMatcher::new(&[]).is_none());
        assert!(TitleMatcher::new(&["  ".to_string()]).is_none());
    }
}

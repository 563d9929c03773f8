use std::collections::BTreeMap;
use std::path::Path;

use silsilah_layout::config::{GenerationAlignment, LayoutConfig};
use silsilah_layout::ir::RelationshipKind;
use silsilah_layout::{
    FamilySnapshot, Gender, Layout, LayoutCache, LayoutInput, Person, PlacementStrategy,
    compute_layout, parse_snapshot,
};

const FIXTURES: [&str; 5] = [
    "scenario_a_root_two_children.json",
    "scenario_b_two_wives.json",
    "scenario_c_intermarriage.json",
    "scenario_d_isolated.json",
    "birth_order.json",
];

const EPS: f32 = 1e-3;

fn load_fixture(name: &str) -> FamilySnapshot {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let input = std::fs::read_to_string(&path).expect("fixture read failed");
    parse_snapshot(&input).expect("fixture parse failed").snapshot
}

fn layout_of(snapshot: &FamilySnapshot, config: &LayoutConfig) -> Layout {
    compute_layout(&LayoutInput::new(snapshot), config)
}

/// Every recorded parent-child pair, from all three places links can live.
fn parent_pairs(snapshot: &FamilySnapshot) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for person in &snapshot.persons {
        for parent in &person.parent_ids {
            pairs.push((parent.clone(), person.id.clone()));
        }
        for child in &person.child_ids {
            pairs.push((person.id.clone(), child.clone()));
        }
    }
    for rel in &snapshot.relationships {
        if rel.kind == RelationshipKind::ParentChild {
            pairs.push((rel.person1.clone(), rel.person2.clone()));
        }
    }
    pairs.sort();
    pairs.dedup();
    pairs
}

/// A deterministic tree: each descendant marries someone from outside and
/// has one to three children, breadth first, until `size` people exist.
fn generated_tree(size: usize) -> FamilySnapshot {
    let mut snapshot = FamilySnapshot::new();
    snapshot.upsert_person(Person::new("p0", Gender::Male));
    let mut queue = vec!["p0".to_string()];
    let mut next = 1usize;
    let mut head = 0usize;
    while head < queue.len() && next < size {
        let parent = queue[head].clone();
        head += 1;
        let parent_gender = snapshot.person(&parent).map(|p| p.gender).unwrap_or_default();
        let spouse_id = format!("s{next}");
        let spouse_gender = if parent_gender == Gender::Male {
            Gender::Female
        } else {
            Gender::Male
        };
        snapshot.upsert_person(Person::new(&spouse_id, spouse_gender));
        snapshot.marry(&parent, &spouse_id, Some(1));
        next += 1;

        let children = 1 + head % 3;
        for birth in 0..children {
            if next >= size {
                break;
            }
            let id = format!("p{next}");
            let gender = if next % 2 == 0 { Gender::Male } else { Gender::Female };
            let mut child = Person::new(&id, gender);
            child.birth_date = Some(format!("{}", 1900 + next * 2 + birth));
            snapshot.upsert_person(child);
            snapshot.add_child(&parent, &id);
            snapshot.add_child(&spouse_id, &id);
            queue.push(id);
            next += 1;
        }
    }
    snapshot
}

fn assert_same_row_gaps(layout: &Layout, min_gap: f32) {
    let mut rows: BTreeMap<i64, Vec<(f32, f32)>> = BTreeMap::new();
    for cluster in &layout.clusters {
        rows.entry(cluster.y.round() as i64)
            .or_default()
            .push((cluster.x, cluster.x + cluster.width));
    }
    for (row, mut spans) in rows {
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in spans.windows(2) {
            let gap = pair[1].0 - pair[0].1;
            assert!(gap >= min_gap - EPS, "row {row}: gap {gap} below {min_gap}");
        }
    }
}

#[test]
fn all_fixtures_parse_and_place_everyone() {
    let config = LayoutConfig::default();
    for name in FIXTURES {
        let snapshot = load_fixture(name);
        let layout = layout_of(&snapshot, &config);
        assert_eq!(
            layout.positions.len(),
            snapshot.persons.len(),
            "{name}: not every person placed"
        );
        assert!(layout.stats.collision_converged, "{name}: no convergence");
        assert!(layout.width > 0.0 && layout.height > 0.0, "{name}: empty extent");
    }
}

#[test]
fn layouts_are_deterministic() {
    let config = LayoutConfig::default();
    for name in FIXTURES {
        let snapshot = load_fixture(name);
        let first = layout_of(&snapshot, &config);
        let second = layout_of(&snapshot, &config);
        assert_eq!(first.positions, second.positions, "{name}");
    }
    let tree = generated_tree(120);
    assert_eq!(
        layout_of(&tree, &config).positions,
        layout_of(&tree, &config).positions
    );
}

#[test]
fn same_generation_shares_a_row() {
    let config = LayoutConfig::default();
    for name in FIXTURES {
        let snapshot = load_fixture(name);
        let layout = layout_of(&snapshot, &config);
        let mut row_of: BTreeMap<usize, f32> = BTreeMap::new();
        for cluster in layout.clusters.iter().filter(|cluster| !cluster.orphan) {
            for member in &cluster.members {
                let generation = layout.generations[member];
                let y = layout.positions[member].y;
                let expected = *row_of.entry(generation).or_insert(y);
                assert_eq!(y, expected, "{name}: {member} off its generation row");
            }
        }
    }
}

#[test]
fn descendants_sit_below_ancestors() {
    let mut relaxed = LayoutConfig::default();
    relaxed.rules.generation_alignment = GenerationAlignment::Relaxed;
    for config in [LayoutConfig::default(), relaxed] {
        for name in FIXTURES {
            let snapshot = load_fixture(name);
            let layout = layout_of(&snapshot, &config);
            for (parent, child) in parent_pairs(&snapshot) {
                let (Some(p), Some(c)) = (layout.positions.get(&parent), layout.positions.get(&child))
                else {
                    continue;
                };
                assert!(c.y > p.y, "{name}: {child} not below {parent}");
            }
        }
    }
}

#[test]
fn spouse_clusters_occupy_contiguous_slots() {
    let config = LayoutConfig::default();
    let slot = config.node_width + config.spouse_gap;
    for name in FIXTURES {
        let snapshot = load_fixture(name);
        let layout = layout_of(&snapshot, &config);
        for cluster in &layout.clusters {
            for pair in cluster.members.windows(2) {
                let left = layout.positions[&pair[0]];
                let right = layout.positions[&pair[1]];
                assert_eq!(left.y, right.y, "{name}");
                assert!((right.x - left.x - slot).abs() < EPS, "{name}: gap in cluster");
            }
        }
    }
}

#[test]
fn scenario_a_root_centered_over_two_children() {
    let config = LayoutConfig::default();
    let layout = layout_of(&load_fixture("scenario_a_root_two_children.json"), &config);
    let (root, a, b) = (
        layout.positions["root"],
        layout.positions["a"],
        layout.positions["b"],
    );
    assert_eq!(layout.generations["a"], 2);
    assert_eq!(layout.generations["b"], 2);
    assert_eq!(a.y, b.y);
    assert_eq!(a.y - root.y, config.generation_spacing);
    assert!(((a.x + b.x) / 2.0 - root.x).abs() < EPS);
    assert!(((b.x - a.x).abs() - (config.node_width + config.sibling_spacing)).abs() < EPS);
}

#[test]
fn scenario_b_husband_between_two_wives() {
    let layout = layout_of(&load_fixture("scenario_b_two_wives.json"), &LayoutConfig::default());
    let cluster = layout.cluster_of("h").expect("husband clustered");
    assert_eq!(cluster.members, vec!["w1", "h", "w2"]);
    let (w1, h, w2) = (
        layout.positions["w1"],
        layout.positions["h"],
        layout.positions["w2"],
    );
    assert!(w1.x < h.x && h.x < w2.x);
}

#[test]
fn scenario_b_three_wives_keep_marriage_order_after_husband() {
    let mut snapshot = load_fixture("scenario_b_two_wives.json");
    snapshot.upsert_person(Person::new("w3", Gender::Female));
    snapshot.marry("h", "w3", Some(3));
    let layout = layout_of(&snapshot, &LayoutConfig::default());
    let cluster = layout.cluster_of("h").expect("husband clustered");
    assert_eq!(cluster.members, vec!["h", "w1", "w2", "w3"]);
}

#[test]
fn scenario_c_married_in_generation_is_the_maximum() {
    let config = LayoutConfig::default();
    let layout = layout_of(&load_fixture("scenario_c_intermarriage.json"), &config);
    assert_eq!(layout.generations["b"], 3);
    assert_eq!(layout.generations["a"], 3);
    assert_eq!(layout.generations["k"], 4);
    let (r1, a, b, k) = (
        layout.positions["r1"],
        layout.positions["a"],
        layout.positions["b"],
        layout.positions["k"],
    );
    assert_eq!(a.y, b.y);
    assert_eq!(a.y - r1.y, 2.0 * config.generation_spacing);
    assert_eq!(k.y - a.y, config.generation_spacing);
    assert!(layout.cluster_of("a").is_some_and(|cluster| cluster.cross_lineage));
}

#[test]
fn scenario_d_isolated_person_goes_to_the_orphan_grid() {
    let config = LayoutConfig::default();
    let layout = layout_of(&load_fixture("scenario_d_isolated.json"), &config);
    assert_eq!(layout.orphans, vec!["z".to_string()]);
    let z = layout.positions["z"];
    for id in ["p", "c"] {
        assert!(z.y > layout.positions[id].y, "orphan not under the main rows");
    }
    assert!(layout.cluster_of("z").is_some_and(|cluster| cluster.orphan));
    assert!(layout.cluster_of("p").is_some_and(|cluster| !cluster.orphan));
}

#[test]
fn siblings_follow_birth_dates() {
    let layout = layout_of(&load_fixture("birth_order.json"), &LayoutConfig::default());
    let (a, b, c) = (
        layout.positions["a"],
        layout.positions["b"],
        layout.positions["c"],
    );
    assert!(a.x < b.x && b.x < c.x, "expected a, b, c left to right");
    assert_eq!(a.y, c.y);
}

#[test]
fn scenario_e_incremental_child_moves_nothing_else() {
    let config = LayoutConfig::default();
    let snapshot = load_fixture("birth_order.json");
    let layout = layout_of(&snapshot, &config);
    let mut cache = LayoutCache::from_layout(&layout, &snapshot);
    assert_eq!(cache.child_count("h"), 3);
    let before = cache.positions().clone();

    let mut child = Person::new("d", Gender::Male);
    child.parent_ids = vec!["h".into(), "w".into()];
    let placement = cache.insert_new_person(&child, None, &config);
    assert_eq!(placement.strategy, PlacementStrategy::BelowParent);

    let (h, w) = (before["h"], before["w"]);
    assert_eq!(placement.position.y, h.y + config.generation_spacing);
    let anchor = (h.x + w.x) / 2.0;
    assert!((placement.position.x - anchor).abs() <= config.incremental.jitter * 3.0 + EPS);

    for (id, position) in &before {
        assert_eq!(cache.get(id), Some(*position), "{id} moved");
    }
    assert_eq!(cache.len(), before.len() + 1);

    let big_tree = generated_tree(200);
    let big_layout = layout_of(&big_tree, &config);
    let big_cache = LayoutCache::from_layout(&big_layout, &big_tree);
    let mut other = Person::new("late", Gender::Female);
    other.parent_ids = vec!["p0".into(), "s1".into()];
    let far = silsilah_layout::place_new_person(&other, &big_cache, None, &config);
    assert_eq!(far.lookups, placement.lookups);
}

#[test]
fn two_hundred_person_tree_converges_without_overlaps() {
    let config = LayoutConfig::default();
    let tree = generated_tree(200);
    assert_eq!(tree.persons.len(), 200);
    let layout = layout_of(&tree, &config);
    assert!(layout.stats.collision_converged);
    assert_eq!(layout.positions.len(), 200);
    assert!(layout.orphans.is_empty());
    assert_same_row_gaps(&layout, config.min_gap);
    for (parent, child) in parent_pairs(&tree) {
        assert!(layout.positions[&child].y > layout.positions[&parent].y);
    }
}

#[test]
fn collapsing_the_root_hides_the_whole_tree_below() {
    let config = LayoutConfig::default();
    let tree = generated_tree(40);
    let layout = compute_layout(&LayoutInput::new(&tree).with_collapsed(["p0"]), &config);
    assert!(layout.positions.contains_key("p0"));
    assert!(layout.positions.contains_key("s1"));
    assert_eq!(layout.positions.len() + layout.hidden.len(), 40);
    assert!(!layout.hidden.is_empty());
}

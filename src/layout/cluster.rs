use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::config::{LayoutConfig, MultiSpouseOrdering};
use crate::ir::Gender;

use super::family::FamilyIndex;
use super::generation::Generations;
use super::visibility::Visibility;

/// A rigid row unit of spouse-connected persons in display order.
#[derive(Debug, Clone)]
pub(crate) struct Cluster<'a> {
    pub(crate) id: usize,
    pub(crate) members: Vec<&'a str>,
    pub(crate) width: f32,
    pub(crate) generation: Option<usize>,
    pub(crate) cross_lineage: bool,
}

impl Cluster<'_> {
    /// Left offset of the member at `slot` relative to the cluster's left edge.
    pub(crate) fn member_offset(slot: usize, config: &LayoutConfig) -> f32 {
        slot as f32 * (config.node_width + config.spouse_gap)
    }
}

pub(crate) fn cluster_width(members: usize, config: &LayoutConfig) -> f32 {
    let count = members.max(1) as f32;
    count * config.node_width + (count - 1.0) * config.spouse_gap
}

/// A parent cluster to child cluster edge with the person pair that first
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClusterEdge<'a> {
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) parent: &'a str,
    pub(crate) child: &'a str,
}

pub(crate) struct ClusterSet<'a> {
    pub(crate) clusters: Vec<Cluster<'a>>,
    pub(crate) cluster_of: BTreeMap<&'a str, usize>,
}

impl<'a> ClusterSet<'a> {
    pub(crate) fn of(&self, person: &str) -> Option<usize> {
        self.cluster_of.get(person).copied()
    }
}

/// Groups visible persons into spouse clusters. Components are discovered
/// in id order and numbered by their earliest member in input order.
pub(crate) fn build_clusters<'a>(
    index: &FamilyIndex<'a>,
    visibility: &Visibility<'a>,
    generations: &Generations<'a>,
    config: &LayoutConfig,
) -> ClusterSet<'a> {
    let mut assigned: BTreeSet<&'a str> = BTreeSet::new();
    let mut components: Vec<Vec<&'a str>> = Vec::new();

    for &seed in &visibility.visible {
        if assigned.contains(seed) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([seed]);
        assigned.insert(seed);
        while let Some(current) = queue.pop_front() {
            component.push(current);
            for spouse in index.spouses(current) {
                if visibility.is_visible(spouse) && assigned.insert(spouse) {
                    queue.push_back(spouse);
                }
            }
        }
        components.push(component);
    }

    components.sort_by_key(|members| {
        members
            .iter()
            .map(|id| index.input_index(id))
            .min()
            .unwrap_or(usize::MAX)
    });

    let mut clusters = Vec::with_capacity(components.len());
    let mut cluster_of = BTreeMap::new();
    for (id, component) in components.into_iter().enumerate() {
        let members = order_members(index, component, config);
        for &member in &members {
            cluster_of.insert(member, id);
        }
        let generation = members.iter().filter_map(|m| generations.of(m)).max();
        let cross_lineage = is_cross_lineage(index, &members);
        clusters.push(Cluster {
            id,
            width: cluster_width(members.len(), config),
            members,
            generation,
            cross_lineage,
        });
    }

    ClusterSet {
        clusters,
        cluster_of,
    }
}

/// Display order inside a cluster. Husbands come first; a single husband
/// with exactly two wives sits between them; otherwise wives follow in
/// the configured spouse order.
pub(crate) fn order_members<'a>(
    index: &FamilyIndex<'a>,
    mut members: Vec<&'a str>,
    config: &LayoutConfig,
) -> Vec<&'a str> {
    let rules = &config.rules;
    members.sort_by_key(|id| (index.input_index(id), *id));
    if !rules.spouse_ordering || members.len() < 2 {
        return members;
    }

    let (husbands, mut wives): (Vec<&'a str>, Vec<&'a str>) = members
        .into_iter()
        .partition(|id| index.person(id).map(|p| p.gender) == Some(Gender::Male));

    match rules.multi_spouse_ordering {
        MultiSpouseOrdering::MarriageOrder => {
            let rank = |wife: &str| {
                husbands
                    .iter()
                    .filter_map(|husband| index.marriage_order(husband, wife))
                    .min()
                    .unwrap_or(1)
            };
            wives.sort_by_key(|wife| (rank(wife), index.input_index(wife)));
        }
        MultiSpouseOrdering::BirthDate => {
            wives.sort_by(|a, b| index.compare_birth(a, b, true));
        }
        MultiSpouseOrdering::Input => {}
    }

    if rules.center_husband_between_two_wives && husbands.len() == 1 && wives.len() == 2 {
        return vec![wives[0], husbands[0], wives[1]];
    }
    let mut ordered = husbands;
    ordered.extend(wives);
    ordered
}

/// Two members with known parents whose root-ancestor sets never meet.
fn is_cross_lineage<'a>(index: &FamilyIndex<'a>, members: &[&'a str]) -> bool {
    let lineages: Vec<BTreeSet<&'a str>> = members
        .iter()
        .filter(|id| index.has_parents(id))
        .map(|id| index.root_ancestors(id))
        .collect();
    for (i, a) in lineages.iter().enumerate() {
        for b in &lineages[i + 1..] {
            if a.is_disjoint(b) {
                return true;
            }
        }
    }
    false
}

/// Parent-to-child cluster edges over visible persons. The visible children
/// of all members are sorted together in birth order, so the order does not
/// depend on which member a child descends from. Duplicate edges and
/// self-loops are dropped.
pub(crate) fn build_cluster_edges<'a>(
    index: &FamilyIndex<'a>,
    visibility: &Visibility<'a>,
    set: &ClusterSet<'a>,
    use_birth_data: bool,
) -> Vec<ClusterEdge<'a>> {
    let mut seen: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut edges = Vec::new();
    for cluster in &set.clusters {
        // child -> first member (display order) that is one of its parents
        let mut children: Vec<(&'a str, &'a str)> = Vec::new();
        for &member in &cluster.members {
            for child in index.children(member) {
                if visibility.is_visible(child) && !children.iter().any(|(c, _)| *c == child) {
                    children.push((child, member));
                }
            }
        }
        children.sort_by(|a, b| index.compare_birth(a.0, b.0, use_birth_data));
        for (child, parent) in children {
            let Some(to) = set.of(child) else {
                continue;
            };
            if to == cluster.id || !seen.insert((cluster.id, to)) {
                continue;
            }
            edges.push(ClusterEdge {
                from: cluster.id,
                to,
                parent,
                child,
            });
        }
    }
    edges
}

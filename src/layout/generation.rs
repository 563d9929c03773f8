use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use super::family::FamilyIndex;

pub(crate) struct Generations<'a> {
    pub(crate) depth: BTreeMap<&'a str, usize>,
    /// Persons unreachable from every root, in input order.
    pub(crate) disconnected: Vec<&'a str>,
}

impl Generations<'_> {
    pub(crate) fn of(&self, id: &str) -> Option<usize> {
        self.depth.get(id).copied()
    }
}

/// Persons without a known parent, in input order.
pub(crate) fn find_root_ancestors<'a>(index: &FamilyIndex<'a>) -> Vec<&'a str> {
    index
        .order
        .iter()
        .copied()
        .filter(|id| !index.has_parents(id))
        .collect()
}

/// Generation index per person: 1 at a root, +1 per child hop, maximized
/// over every root that reaches the person. Spouses share the larger of
/// their generations and children are re-propagated until stable. Depths
/// never exceed the person count, so parent cycles terminate.
pub(crate) fn assign_generations<'a>(
    index: &FamilyIndex<'a>,
    explicit_roots: Option<&[String]>,
) -> Generations<'a> {
    let roots: Vec<&'a str> = match explicit_roots {
        Some(ids) => {
            let mut roots = Vec::with_capacity(ids.len());
            for id in ids {
                match index.key(id) {
                    Some(key) if !roots.contains(&key) => roots.push(key),
                    Some(_) => {}
                    None => debug!(id = %id, "unknown root id skipped"),
                }
            }
            roots
        }
        None => find_root_ancestors(index),
    };

    let cap = index.len().max(1);
    let mut depth: BTreeMap<&'a str, usize> = BTreeMap::new();
    let mut queue: VecDeque<&'a str> = VecDeque::new();
    for &root in &roots {
        depth.entry(root).or_insert(1);
        queue.push_back(root);
    }
    propagate(index, &mut depth, &mut queue, cap);

    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut raised: Vec<(&'a str, usize)> = Vec::new();
        for &id in &index.order {
            let own = depth.get(id).copied();
            let best = index
                .spouses(id)
                .filter_map(|spouse| depth.get(spouse).copied())
                .max();
            if let Some(best) = best
                && own.is_none_or(|own| best > own)
            {
                raised.push((id, best));
            }
        }
        if raised.is_empty() || rounds > cap {
            break;
        }
        for (id, value) in raised {
            let entry = depth.entry(id).or_insert(value);
            if *entry < value {
                *entry = value;
            }
            queue.push_back(id);
        }
        propagate(index, &mut depth, &mut queue, cap);
    }

    let disconnected = index
        .order
        .iter()
        .copied()
        .filter(|id| !depth.contains_key(id))
        .collect::<Vec<_>>();
    debug!(
        roots = roots.len(),
        assigned = depth.len(),
        disconnected = disconnected.len(),
        spouse_rounds = rounds,
        "generations assigned"
    );

    Generations {
        depth,
        disconnected,
    }
}

fn propagate<'a>(
    index: &FamilyIndex<'a>,
    depth: &mut BTreeMap<&'a str, usize>,
    queue: &mut VecDeque<&'a str>,
    cap: usize,
) {
    while let Some(current) = queue.pop_front() {
        let Some(&current_depth) = depth.get(current) else {
            continue;
        };
        let next = current_depth + 1;
        if next > cap {
            continue;
        }
        for child in index.children(current) {
            let entry = depth.entry(child).or_insert(0);
            if *entry < next {
                *entry = next;
                queue.push_back(child);
            }
        }
    }
}

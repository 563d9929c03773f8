use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::ir::{FamilySnapshot, Person, RelationshipKind};

const MAX_PARENTS: usize = 2;

/// Relationship index merged from per-person id sets and relationship
/// records. Only edges between known, distinct persons are kept.
#[derive(Debug)]
pub(crate) struct FamilyIndex<'a> {
    pub(crate) order: Vec<&'a str>,
    persons: BTreeMap<&'a str, (usize, &'a Person)>,
    spouses: BTreeMap<&'a str, BTreeSet<&'a str>>,
    parents: BTreeMap<&'a str, Vec<&'a str>>,
    children: BTreeMap<&'a str, BTreeSet<&'a str>>,
    marriage_order: BTreeMap<(&'a str, &'a str), u32>,
    birth_dates: BTreeMap<&'a str, NaiveDate>,
}

impl<'a> FamilyIndex<'a> {
    pub(crate) fn build(snapshot: &'a FamilySnapshot) -> Self {
        let mut persons = BTreeMap::new();
        let mut order = Vec::with_capacity(snapshot.persons.len());
        for person in &snapshot.persons {
            if persons.contains_key(person.id.as_str()) {
                debug!(id = %person.id, "duplicate person id skipped");
                continue;
            }
            persons.insert(person.id.as_str(), (order.len(), person));
            order.push(person.id.as_str());
        }

        let known = |id: &str| persons.get_key_value(id).map(|(key, _)| *key);

        let mut spouses: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut parent_candidates: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut marriage_order = BTreeMap::new();

        let mut link_spouses = |a: &'a str, b: &'a str| {
            spouses.entry(a).or_default().insert(b);
            spouses.entry(b).or_default().insert(a);
        };

        for &id in &order {
            let (_, person) = persons[id];
            for spouse in &person.spouse_ids {
                match known(spouse.as_str()) {
                    Some(spouse) if spouse != id => link_spouses(id, spouse),
                    Some(_) => debug!(id, "self spouse reference skipped"),
                    None => debug!(id, spouse = %spouse, "unknown spouse reference skipped"),
                }
            }
            for parent in &person.parent_ids {
                match known(parent.as_str()) {
                    Some(parent) if parent != id => {
                        parent_candidates.entry(id).or_default().push(parent)
                    }
                    _ => debug!(id, parent = %parent, "unusable parent reference skipped"),
                }
            }
        }

        for relationship in &snapshot.relationships {
            let (Some(a), Some(b)) = (
                known(relationship.person1.as_str()),
                known(relationship.person2.as_str()),
            )
            else {
                debug!(
                    person1 = %relationship.person1,
                    person2 = %relationship.person2,
                    "relationship with unknown person skipped"
                );
                continue;
            };
            if a == b {
                debug!(id = a, "self relationship skipped");
                continue;
            }
            match relationship.kind {
                RelationshipKind::Spouse => {
                    link_spouses(a, b);
                    if let Some(rank) = relationship.marriage_order {
                        marriage_order.insert((a, b), rank);
                        marriage_order.insert((b, a), rank);
                    }
                }
                RelationshipKind::ParentChild => {
                    parent_candidates.entry(b).or_default().push(a);
                }
            }
        }

        for &id in &order {
            let (_, person) = persons[id];
            for child in &person.child_ids {
                match known(child.as_str()) {
                    Some(child) if child != id => {
                        parent_candidates.entry(child).or_default().push(id)
                    }
                    _ => debug!(id, child = %child, "unusable child reference skipped"),
                }
            }
        }

        let mut parents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut children: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (child, candidates) in parent_candidates {
            let mut kept: Vec<&str> = Vec::with_capacity(MAX_PARENTS);
            for parent in candidates {
                if kept.contains(&parent) {
                    continue;
                }
                if kept.len() == MAX_PARENTS {
                    debug!(child, parent, "more than two parents, extra parent ignored");
                    continue;
                }
                kept.push(parent);
            }
            for &parent in &kept {
                children.entry(parent).or_default().insert(child);
            }
            parents.insert(child, kept);
        }

        let birth_dates = persons
            .iter()
            .filter_map(|(id, (_, person))| person.birth_date_value().map(|date| (*id, date)))
            .collect();

        Self {
            order,
            persons,
            spouses,
            parents,
            children,
            marriage_order,
            birth_dates,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn key(&self, id: &str) -> Option<&'a str> {
        self.persons.get_key_value(id).map(|(key, _)| *key)
    }

    pub(crate) fn person(&self, id: &str) -> Option<&'a Person> {
        self.persons.get(id).map(|(_, person)| *person)
    }

    pub(crate) fn input_index(&self, id: &str) -> usize {
        self.persons.get(id).map(|(idx, _)| *idx).unwrap_or(usize::MAX)
    }

    pub(crate) fn spouses(&self, id: &str) -> impl Iterator<Item = &'a str> + '_ {
        self.spouses.get(id).into_iter().flatten().copied()
    }

    pub(crate) fn parents(&self, id: &str) -> &[&'a str] {
        self.parents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn children(&self, id: &str) -> impl Iterator<Item = &'a str> + '_ {
        self.children.get(id).into_iter().flatten().copied()
    }

    pub(crate) fn has_parents(&self, id: &str) -> bool {
        !self.parents(id).is_empty()
    }

    pub(crate) fn marriage_order(&self, a: &str, b: &str) -> Option<u32> {
        self.marriage_order.get(&(a, b)).copied()
    }

    pub(crate) fn birth_date(&self, id: &str) -> Option<NaiveDate> {
        self.birth_dates.get(id).copied()
    }

    /// Sibling order: known birth date first, then birth order, then input
    /// order, then id. Dates are ignored when `use_birth_data` is off.
    pub(crate) fn compare_birth(&self, a: &str, b: &str, use_birth_data: bool) -> Ordering {
        if use_birth_data {
            let date_a = self.birth_date(a);
            let date_b = self.birth_date(b);
            let order_a = self.person(a).and_then(|p| p.birth_order);
            let order_b = self.person(b).and_then(|p| p.birth_order);
            let by_birth = (date_a.is_none(), date_a, order_a.is_none(), order_a).cmp(&(
                date_b.is_none(),
                date_b,
                order_b.is_none(),
                order_b,
            ));
            if by_birth != Ordering::Equal {
                return by_birth;
            }
        }
        self.input_index(a)
            .cmp(&self.input_index(b))
            .then_with(|| a.cmp(b))
    }

    /// Root ancestors of `id`: persons without known parents reachable by
    /// walking parent edges. A person with no parents is its own root.
    pub(crate) fn root_ancestors(&self, id: &'a str) -> BTreeSet<&'a str> {
        let mut roots = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let parents = self.parents(current);
            if parents.is_empty() {
                roots.insert(current);
            }
            stack.extend(parents.iter().copied());
        }
        roots
    }
}

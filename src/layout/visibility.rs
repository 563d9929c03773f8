use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use super::family::FamilyIndex;

pub(crate) struct Visibility<'a> {
    pub(crate) visible: BTreeSet<&'a str>,
    /// Hidden persons in input order.
    pub(crate) hidden: Vec<&'a str>,
}

impl Visibility<'_> {
    pub(crate) fn is_visible(&self, id: &str) -> bool {
        self.visible.contains(id)
    }
}

/// Hides the descendants of every collapsed person, then the married-in
/// spouses left without a visible spouse or parent. Collapsed persons stay
/// visible unless another collapsed ancestor hides them.
pub(crate) fn apply_collapse<'a>(
    index: &FamilyIndex<'a>,
    collapsed: &BTreeSet<String>,
) -> Visibility<'a> {
    let mut hidden: BTreeSet<&'a str> = BTreeSet::new();

    for id in collapsed {
        let Some(root) = index.key(id) else {
            debug!(id = %id, "unknown collapsed id skipped");
            continue;
        };
        let mut queue: VecDeque<&'a str> = index.children(root).collect();
        while let Some(current) = queue.pop_front() {
            if current == root || !hidden.insert(current) {
                continue;
            }
            queue.extend(index.children(current));
        }
    }

    if !hidden.is_empty() {
        // Cascades through chains of married-in spouses.
        for _ in 0..index.len() {
            let mut newly_hidden = Vec::new();
            for &id in &index.order {
                if hidden.contains(id) {
                    continue;
                }
                let mut spouses = index.spouses(id).peekable();
                if spouses.peek().is_none() {
                    continue;
                }
                let mut any_hidden_spouse = false;
                let mut any_visible_spouse = false;
                for spouse in spouses {
                    if hidden.contains(spouse) {
                        any_hidden_spouse = true;
                    } else {
                        any_visible_spouse = true;
                    }
                }
                let visible_parent = index
                    .parents(id)
                    .iter()
                    .any(|parent| !hidden.contains(parent));
                if any_hidden_spouse && !any_visible_spouse && !visible_parent {
                    newly_hidden.push(id);
                }
            }
            if newly_hidden.is_empty() {
                break;
            }
            hidden.extend(newly_hidden);
        }
    }

    let visible = index
        .order
        .iter()
        .copied()
        .filter(|id| !hidden.contains(id))
        .collect();
    let hidden = index
        .order
        .iter()
        .copied()
        .filter(|id| hidden.contains(id))
        .collect();
    Visibility { visible, hidden }
}

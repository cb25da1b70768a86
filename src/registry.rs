//! Name, group and tag lookups over loaded function docs.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::catalog::{FunctionDoc, RecordRef};

/// Two records claimed the same name. The first one stays in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameConflict {
    pub name: String,
    /// The record that was kept.
    pub first: RecordRef,
    /// The record that was excluded.
    pub duplicate: RecordRef,
}

/// Immutable index of function docs.
///
/// Docs are stored in load order and every lookup returns results in that
/// order. Rebuild the registry to change its contents.
#[derive(Debug, Default)]
pub struct Registry {
    docs: Vec<FunctionDoc>,
    by_name: HashMap<String, usize>,
    by_group: HashMap<String, Vec<usize>>,
    by_tag: HashMap<String, Vec<usize>>,
}

impl Registry {
    /// Index `docs`, reporting every name that was already taken.
    pub fn build(docs: impl IntoIterator<Item = FunctionDoc>) -> (Self, Vec<NameConflict>) {
        let mut registry = Registry::default();
        let mut conflicts = Vec::new();

        for doc in docs {
            if let Some(&existing) = registry.by_name.get(&doc.name) {
                let conflict = NameConflict {
                    name: doc.name.clone(),
                    first: registry.docs[existing].origin.clone(),
                    duplicate: doc.origin.clone(),
                };
                tracing::warn!(
                    name = %conflict.name,
                    first = %conflict.first,
                    duplicate = %conflict.duplicate,
                    "duplicate function name"
                );
                conflicts.push(conflict);
                continue;
            }

            let idx = registry.docs.len();
            registry.by_name.insert(doc.name.clone(), idx);
            for group in &doc.groups {
                let slots = registry.by_group.entry(group.clone()).or_default();
                // A record may repeat a group label
                if slots.last() != Some(&idx) {
                    slots.push(idx);
                }
            }
            for tag in &doc.tags {
                let slots = registry.by_tag.entry(tag.clone()).or_default();
                if slots.last() != Some(&idx) {
                    slots.push(idx);
                }
            }
            registry.docs.push(doc);
        }

        (registry, conflicts)
    }

    /// Look up a doc by exact, case-sensitive name.
    pub fn by_name(&self, name: &str) -> Option<&FunctionDoc> {
        self.by_name.get(name).map(|&i| &self.docs[i])
    }

    /// All docs listed under `group`, in load order.
    pub fn by_group(&self, group: &str) -> Vec<&FunctionDoc> {
        self.resolve(self.by_group.get(group))
    }

    /// All docs carrying `tag`, in load order. The query is lowercased.
    pub fn by_tag(&self, tag: &str) -> Vec<&FunctionDoc> {
        self.resolve(self.by_tag.get(&tag.to_lowercase()))
    }

    fn resolve(&self, slots: Option<&Vec<usize>>) -> Vec<&FunctionDoc> {
        slots
            .map(|s| s.iter().map(|&i| &self.docs[i]).collect())
            .unwrap_or_default()
    }

    /// All docs in load order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDoc> {
        self.docs.iter()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Total number of examples across all docs.
    pub fn example_count(&self) -> usize {
        self.docs.iter().map(|d| d.examples.len()).sum()
    }

    /// Sorted group labels.
    pub fn groups(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.by_group.keys().map(String::as_str).collect();
        set.into_iter().collect()
    }

    /// Sorted tags.
    pub fn tags(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.by_tag.keys().map(String::as_str).collect();
        set.into_iter().collect()
    }

    /// Build a new registry holding only the docs matching `keep`.
    pub fn select(&self, mut keep: impl FnMut(&FunctionDoc) -> bool) -> Registry {
        let (registry, _) = Registry::build(self.docs.iter().filter(|d| keep(*d)).cloned());
        registry
    }
}

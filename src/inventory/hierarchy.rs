//! Package ↔ event relation used to decide where a direct change is mirrored.
//!
//! The relation is deliberately asymmetric:
//! - a package reaches every event it bundles and every other package that
//!   bundles at least one of the same events;
//! - an event reaches only the package(s) that bundle it, never its siblings.
//!
//! Listings outside both maps (the season listing) reach nothing.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipGraph {
    /// package -> bundled events
    packages: BTreeMap<String, BTreeSet<String>>,
    /// event -> packages bundling it
    parents: BTreeMap<String, BTreeSet<String>>,
    include_sibling_events: bool,
}

impl RelationshipGraph {
    pub fn new<I, P, E>(packages: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<E>)>,
        P: Into<String>,
        E: Into<String>,
    {
        let mut graph = RelationshipGraph::default();
        for (package, events) in packages {
            let package = package.into();
            let children = graph.packages.entry(package.clone()).or_default();
            for event in events {
                let event = event.into();
                children.insert(event.clone());
                graph.parents.entry(event).or_default().insert(package.clone());
            }
        }
        graph
    }

    /// Also relate an event to the other events bundled by its packages.
    /// Off by default; kept for venues that want the looser relation.
    pub fn with_sibling_events(mut self, enabled: bool) -> Self {
        self.include_sibling_events = enabled;
        self
    }

    pub fn includes_sibling_events(&self) -> bool {
        self.include_sibling_events
    }

    pub fn is_package(&self, id: &str) -> bool {
        self.packages.contains_key(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.packages.contains_key(id) || self.parents.contains_key(id)
    }

    pub fn children_of(&self, package: &str) -> impl Iterator<Item = &str> {
        self.packages.get(package).into_iter().flatten().map(String::as_str)
    }

    pub fn parents_of(&self, event: &str) -> impl Iterator<Item = &str> {
        self.parents.get(event).into_iter().flatten().map(String::as_str)
    }

    /// Every package and event id that appears in the relation.
    pub fn nodes(&self) -> BTreeSet<&str> {
        self.packages
            .keys()
            .chain(self.parents.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn related_events(&self, id: &str) -> BTreeSet<String> {
        let mut related = BTreeSet::new();

        if let Some(children) = self.packages.get(id) {
            related.extend(children.iter().cloned());
            for (other, other_children) in &self.packages {
                if other != id && !other_children.is_disjoint(children) {
                    related.insert(other.clone());
                }
            }
        }

        if let Some(parents) = self.parents.get(id) {
            related.extend(parents.iter().cloned());
            if self.include_sibling_events {
                for parent in parents {
                    related.extend(self.children_of(parent).map(str::to_string));
                }
            }
        }

        related.remove(id);
        related
    }
}

//! Per-transaction local delta: the added/removed axiom sets of one
//! not-yet-committed transaction, per context.
//!
//! Containment is three-valued so the precedence rule (delta overrides
//! central state) stays auditable in isolation: `Added` and `Removed` are
//! definitive local answers, `Unknown` defers to the central connector.

use crate::connector::matches_pattern;
use ontomap_model::{Assertion, Axiom, NamedResource, Value};
use std::collections::{HashMap, HashSet};

/// Tri-state result of a local containment check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Locally added, not yet committed.
    Added,
    /// Locally removed.
    Removed,
    /// The delta says nothing; ask the central store.
    Unknown,
}

type ContextKey = Option<NamedResource>;

/// Added/removed axiom sets of one transaction, keyed by context.
#[derive(Debug, Default)]
pub struct LocalDelta {
    added: HashMap<ContextKey, HashSet<Axiom>>,
    removed: HashMap<ContextKey, HashSet<Axiom>>,
    /// Named contexts this delta has touched, in first-touch order.
    context_order: Vec<NamedResource>,
}

impl LocalDelta {
    pub fn new() -> Self {
        Self::default()
    }

    fn note_context(&mut self, context: &ContextKey) {
        if let Some(ctx) = context {
            if !self.context_order.contains(ctx) {
                self.context_order.push(ctx.clone());
            }
        }
    }

    /// Registers additions. An axiom previously marked removed in the same
    /// context becomes present again.
    pub fn add_axioms(&mut self, axioms: &[Axiom], context: Option<&NamedResource>) {
        let key: ContextKey = context.cloned();
        self.note_context(&key);
        let removed = self.removed.entry(key.clone()).or_default();
        let added = self.added.entry(key).or_default();
        for axiom in axioms {
            removed.remove(axiom);
            added.insert(axiom.clone());
        }
    }

    /// Registers removals. The removal is recorded unconditionally, even
    /// for an axiom added in the same transaction: the same triple may also
    /// exist in the central store, and the local removal must shadow it
    /// until commit.
    pub fn remove_axioms(&mut self, axioms: &[Axiom], context: Option<&NamedResource>) {
        let key: ContextKey = context.cloned();
        self.note_context(&key);
        let added = self.added.entry(key.clone()).or_default();
        let removed = self.removed.entry(key).or_default();
        for axiom in axioms {
            added.remove(axiom);
            removed.insert(axiom.clone());
        }
    }

    pub fn contains(&self, axiom: &Axiom, context: Option<&NamedResource>) -> Containment {
        let key: ContextKey = context.cloned();
        if self
            .added
            .get(&key)
            .map(|s| s.contains(axiom))
            .unwrap_or(false)
        {
            Containment::Added
        } else if self
            .removed
            .get(&key)
            .map(|s| s.contains(axiom))
            .unwrap_or(false)
        {
            Containment::Removed
        } else {
            Containment::Unknown
        }
    }

    /// Layers this delta over `existing` central results: removed matches
    /// are filtered out, added matches appended. The delta always wins over
    /// central state for the same triple.
    pub fn enhance(
        &self,
        existing: Vec<Axiom>,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Vec<Axiom> {
        let key: ContextKey = context.cloned();
        let mut result: Vec<Axiom> = match self.removed.get(&key) {
            Some(removed) => existing
                .into_iter()
                .filter(|axiom| !removed.contains(axiom))
                .collect(),
            None => existing,
        };
        if let Some(added) = self.added.get(&key) {
            for axiom in added {
                if matches_pattern(axiom, subject, assertion, value) && !result.contains(axiom) {
                    result.push(axiom.clone());
                }
            }
        }
        result
    }

    /// Whether the delta holds any pending change touching `subject` in the
    /// given context. Used to keep advisory caches subordinate to the
    /// session's own changes.
    pub fn touches_subject(&self, subject: &NamedResource, context: Option<&NamedResource>) -> bool {
        let key: ContextKey = context.cloned();
        let in_set = |set: Option<&HashSet<Axiom>>| {
            set.map(|s| s.iter().any(|a| a.subject() == subject))
                .unwrap_or(false)
        };
        in_set(self.added.get(&key)) || in_set(self.removed.get(&key))
    }

    /// Named contexts touched by this delta, in first-touch order.
    pub fn contexts(&self) -> &[NamedResource] {
        &self.context_order
    }

    pub fn is_empty(&self) -> bool {
        self.added.values().all(HashSet::is_empty) && self.removed.values().all(HashSet::is_empty)
    }

    /// Drains the delta into (removed, added) change lists for the central
    /// merge.
    pub fn into_changes(
        self,
    ) -> (
        Vec<(Axiom, Option<NamedResource>)>,
        Vec<(Axiom, Option<NamedResource>)>,
    ) {
        let flatten = |map: HashMap<ContextKey, HashSet<Axiom>>| {
            map.into_iter()
                .flat_map(|(ctx, axioms)| {
                    axioms.into_iter().map(move |a| (a, ctx.clone()))
                })
                .collect::<Vec<_>>()
        };
        (flatten(self.removed), flatten(self.added))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axiom(subject: &str, value: &str) -> Axiom {
        Axiom::new(
            NamedResource::new(subject),
            Assertion::data_property("http://example.org/p", false),
            Value::string(value),
        )
    }

    #[test]
    fn containment_is_three_valued() {
        let mut delta = LocalDelta::new();
        let added = axiom("urn:e1", "a");
        let removed = axiom("urn:e2", "r");
        let untouched = axiom("urn:e3", "u");
        delta.add_axioms(std::slice::from_ref(&added), None);
        delta.remove_axioms(std::slice::from_ref(&removed), None);

        assert_eq!(delta.contains(&added, None), Containment::Added);
        assert_eq!(delta.contains(&removed, None), Containment::Removed);
        assert_eq!(delta.contains(&untouched, None), Containment::Unknown);
    }

    #[test]
    fn re_adding_a_removed_axiom_cancels_the_removal() {
        let mut delta = LocalDelta::new();
        let a = axiom("urn:e1", "v");
        delta.remove_axioms(std::slice::from_ref(&a), None);
        delta.add_axioms(std::slice::from_ref(&a), None);
        assert_eq!(delta.contains(&a, None), Containment::Added);
    }

    #[test]
    fn removing_a_locally_added_axiom_cancels_the_add_but_keeps_the_removal() {
        let mut delta = LocalDelta::new();
        let a = axiom("urn:e1", "v");
        delta.add_axioms(std::slice::from_ref(&a), None);
        delta.remove_axioms(std::slice::from_ref(&a), None);
        // The removal must stay definitive: the same triple may also exist
        // in the central store, and the delta has to shadow it.
        assert_eq!(delta.contains(&a, None), Containment::Removed);
        let (removed, added) = delta.into_changes();
        assert_eq!(removed, vec![(a, None)]);
        assert!(added.is_empty());
    }

    #[test]
    fn enhance_filters_removed_and_appends_added() {
        let mut delta = LocalDelta::new();
        let central = axiom("urn:e1", "central");
        let gone = axiom("urn:e1", "gone");
        let fresh = axiom("urn:e1", "fresh");
        delta.remove_axioms(std::slice::from_ref(&gone), None);
        delta.add_axioms(std::slice::from_ref(&fresh), None);

        let subject = NamedResource::new("urn:e1");
        let result = delta.enhance(
            vec![central.clone(), gone],
            Some(&subject),
            None,
            None,
            None,
        );
        assert_eq!(result.len(), 2);
        assert!(result.contains(&central));
        assert!(result.contains(&fresh));
    }

    #[test]
    fn contexts_are_isolated_within_the_delta() {
        let mut delta = LocalDelta::new();
        let a = axiom("urn:e1", "v");
        let ctx = NamedResource::new("urn:ctx:one");
        delta.add_axioms(std::slice::from_ref(&a), Some(&ctx));

        assert_eq!(delta.contains(&a, None), Containment::Unknown);
        assert_eq!(delta.contains(&a, Some(&ctx)), Containment::Added);
        assert_eq!(delta.contexts(), &[ctx]);
    }
}

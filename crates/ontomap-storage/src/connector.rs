//! Storage connector contract and the shared (central) connector.
//!
//! The shared connector owns the committed state of the store, one axiom
//! set per context. Reads on a context may proceed concurrently; writes and
//! the commit-time merge serialize per context. There is no cross-context
//! atomicity: a merge failure partway through a multi-context commit leaves
//! contexts already merged in the new state. This is a documented weak
//! point of the model, not a transactional guarantee.

use ontomap_model::{Assertion, Axiom, NamedResource, OntoError, Result, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Axioms of one context, independently lockable.
type ContextStore = Arc<RwLock<HashSet<Axiom>>>;

/// Changes grouped with their target context; `None` is the default
/// context.
pub type ContextChanges = Vec<(Axiom, Option<NamedResource>)>;

// ============================================================================
// Pattern matching
// ============================================================================

/// Whether `axiom` satisfies a triple pattern; `None` in any position
/// matches anything.
pub(crate) fn matches_pattern(
    axiom: &Axiom,
    subject: Option<&NamedResource>,
    assertion: Option<&Assertion>,
    value: Option<&Value>,
) -> bool {
    if let Some(s) = subject {
        if axiom.subject() != s {
            return false;
        }
    }
    if let Some(a) = assertion {
        if !a.matches(axiom.assertion()) {
            return false;
        }
    }
    if let Some(v) = value {
        if axiom.value() != v {
            return false;
        }
    }
    true
}

// ============================================================================
// Queries
// ============================================================================

/// Triple-pattern query. No query language is defined by this core; the
/// pattern form is the contract backing drivers implement.
///
/// Queries see only committed state. A session's uncommitted delta is
/// deliberately invisible to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    pub subject: Option<NamedResource>,
    pub assertion: Option<Assertion>,
    pub value: Option<Value>,
    pub context: Option<NamedResource>,
}

impl SelectQuery {
    pub fn with_subject(subject: NamedResource) -> Self {
        SelectQuery {
            subject: Some(subject),
            ..Default::default()
        }
    }
}

/// Update statement applied directly to committed state, bypassing any
/// transactional delta.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuery {
    pub insertions: Vec<Axiom>,
    pub deletions: Vec<Axiom>,
    pub context: Option<NamedResource>,
}

// ============================================================================
// Connector contract
// ============================================================================

/// Contract of a connector owning (or layering over) the triples of a
/// store.
///
/// The backing graph-store driver implements this for its committed state;
/// [`crate::ChangeTrackingConnector`] implements it by layering a local
/// delta over another connector.
pub trait StorageConnector: Send + Sync {
    /// Axioms matching the pattern in the given context (`None` = default
    /// context).
    fn find(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<Vec<Axiom>>;

    fn contains(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<bool>;

    fn add(&self, axioms: &[Axiom], context: Option<&NamedResource>) -> Result<()>;

    fn remove(&self, axioms: &[Axiom], context: Option<&NamedResource>) -> Result<()>;

    /// Removes every axiom matching the pattern.
    fn remove_matching(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<()>;

    /// Executes a pattern query against committed state only.
    fn execute_select_query(&self, query: &SelectQuery) -> Result<Vec<Axiom>>;

    fn execute_ask_query(&self, query: &SelectQuery) -> Result<bool>;

    /// Applies an update against committed state, outside any transaction.
    fn execute_update(&self, update: &UpdateQuery) -> Result<()>;

    /// Named contexts known to this connector, in creation order.
    fn contexts(&self) -> Result<Vec<NamedResource>>;

    /// Atomically-per-context merges a transaction's changes: all removals
    /// of a context are replayed before its additions. Merge order across
    /// contexts is deterministic but not atomic.
    fn apply_changes(&self, removed: ContextChanges, added: ContextChanges) -> Result<()>;
}

// ============================================================================
// Shared storage connector
// ============================================================================

/// Central connector holding the committed axioms of every context.
///
/// Contexts are created externally and passed at construction; reads and
/// writes naming an unknown context fail with `ContextNotFound`. The
/// default context always exists.
pub struct SharedStorageConnector {
    default: ContextStore,
    /// Named contexts in creation order. The outer lock only guards the
    /// list; axiom access goes through the per-context locks.
    named: RwLock<Vec<(NamedResource, ContextStore)>>,
    /// Serializes commit-time merges so two sessions cannot interleave
    /// their per-context replays.
    merge_lock: Mutex<()>,
}

impl SharedStorageConnector {
    pub fn new(contexts: impl IntoIterator<Item = NamedResource>) -> Self {
        let named = contexts
            .into_iter()
            .map(|c| (c, Arc::new(RwLock::new(HashSet::new())) as ContextStore))
            .collect();
        SharedStorageConnector {
            default: Arc::new(RwLock::new(HashSet::new())),
            named: RwLock::new(named),
            merge_lock: Mutex::new(()),
        }
    }

    fn store_for(&self, context: Option<&NamedResource>) -> Result<ContextStore> {
        match context {
            None => Ok(Arc::clone(&self.default)),
            Some(ctx) => {
                let named = self.named.read();
                named
                    .iter()
                    .find(|(name, _)| name == ctx)
                    .map(|(_, store)| Arc::clone(store))
                    .ok_or_else(|| OntoError::ContextNotFound {
                        context: ctx.clone(),
                    })
            }
        }
    }
}

impl Default for SharedStorageConnector {
    fn default() -> Self {
        Self::new([])
    }
}

impl StorageConnector for SharedStorageConnector {
    fn find(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<Vec<Axiom>> {
        let store = self.store_for(context)?;
        let guard = store.read();
        Ok(guard
            .iter()
            .filter(|axiom| matches_pattern(axiom, subject, assertion, value))
            .cloned()
            .collect())
    }

    fn contains(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<bool> {
        let store = self.store_for(context)?;
        let guard = store.read();
        Ok(guard
            .iter()
            .any(|axiom| matches_pattern(axiom, subject, assertion, value)))
    }

    fn add(&self, axioms: &[Axiom], context: Option<&NamedResource>) -> Result<()> {
        let store = self.store_for(context)?;
        let mut guard = store.write();
        for axiom in axioms {
            guard.insert(axiom.clone());
        }
        Ok(())
    }

    fn remove(&self, axioms: &[Axiom], context: Option<&NamedResource>) -> Result<()> {
        let store = self.store_for(context)?;
        let mut guard = store.write();
        for axiom in axioms {
            guard.remove(axiom);
        }
        Ok(())
    }

    fn remove_matching(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<()> {
        let store = self.store_for(context)?;
        let mut guard = store.write();
        guard.retain(|axiom| !matches_pattern(axiom, subject, assertion, value));
        Ok(())
    }

    fn execute_select_query(&self, query: &SelectQuery) -> Result<Vec<Axiom>> {
        self.find(
            query.subject.as_ref(),
            query.assertion.as_ref(),
            query.value.as_ref(),
            query.context.as_ref(),
        )
    }

    fn execute_ask_query(&self, query: &SelectQuery) -> Result<bool> {
        self.contains(
            query.subject.as_ref(),
            query.assertion.as_ref(),
            query.value.as_ref(),
            query.context.as_ref(),
        )
    }

    fn execute_update(&self, update: &UpdateQuery) -> Result<()> {
        self.remove(&update.deletions, update.context.as_ref())?;
        self.add(&update.insertions, update.context.as_ref())
    }

    fn contexts(&self) -> Result<Vec<NamedResource>> {
        Ok(self.named.read().iter().map(|(c, _)| c.clone()).collect())
    }

    fn apply_changes(&self, removed: ContextChanges, added: ContextChanges) -> Result<()> {
        let _merge = self.merge_lock.lock();

        // Group per context; removals replay before additions within each.
        let mut grouped: BTreeMap<Option<NamedResource>, (Vec<Axiom>, Vec<Axiom>)> =
            BTreeMap::new();
        for (axiom, ctx) in removed {
            grouped.entry(ctx).or_default().0.push(axiom);
        }
        for (axiom, ctx) in added {
            grouped.entry(ctx).or_default().1.push(axiom);
        }

        for (context, (to_remove, to_add)) in grouped {
            let store = self.store_for(context.as_ref()).map_err(|e| {
                tracing::warn!(
                    context = context.as_ref().map(|c| c.as_str()).unwrap_or("<default>"),
                    "merge aborted; contexts merged so far keep the new state"
                );
                e
            })?;
            let mut guard = store.write();
            for axiom in &to_remove {
                guard.remove(axiom);
            }
            for axiom in to_add {
                guard.insert(axiom);
            }
            tracing::debug!(
                context = context.as_ref().map(|c| c.as_str()).unwrap_or("<default>"),
                removed = to_remove.len(),
                "merged context changes"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axiom(subject: &str, property: &str, value: &str) -> Axiom {
        Axiom::new(
            NamedResource::new(subject),
            Assertion::data_property(property, false),
            Value::string(value),
        )
    }

    #[test]
    fn add_then_find_in_default_context() {
        let connector = SharedStorageConnector::default();
        let a = axiom("urn:e1", "http://example.org/name", "v1");
        connector.add(std::slice::from_ref(&a), None).unwrap();

        let found = connector
            .find(Some(a.subject()), None, None, None)
            .unwrap();
        assert_eq!(found, vec![a]);
    }

    #[test]
    fn named_contexts_are_isolated_from_default() {
        let ctx = NamedResource::new("urn:ctx:one");
        let connector = SharedStorageConnector::new([ctx.clone()]);
        let a = axiom("urn:e1", "http://example.org/name", "v1");
        connector.add(std::slice::from_ref(&a), Some(&ctx)).unwrap();

        assert!(!connector
            .contains(Some(a.subject()), None, None, None)
            .unwrap());
        assert!(connector
            .contains(Some(a.subject()), None, None, Some(&ctx))
            .unwrap());
    }

    #[test]
    fn unknown_context_is_reported() {
        let connector = SharedStorageConnector::default();
        let missing = NamedResource::new("urn:ctx:missing");
        let result = connector.find(None, None, None, Some(&missing));
        assert!(matches!(
            result,
            Err(OntoError::ContextNotFound { context }) if context == missing
        ));
    }

    #[test]
    fn apply_changes_replays_removals_before_additions() {
        let connector = SharedStorageConnector::default();
        let old = axiom("urn:e1", "http://example.org/name", "old");
        let new = axiom("urn:e1", "http://example.org/name", "new");
        connector.add(std::slice::from_ref(&old), None).unwrap();

        connector
            .apply_changes(vec![(old.clone(), None)], vec![(new.clone(), None)])
            .unwrap();

        let found = connector
            .find(Some(new.subject()), None, None, None)
            .unwrap();
        assert_eq!(found, vec![new]);
    }

    #[test]
    fn multi_context_merge_failure_keeps_earlier_contexts_merged() {
        let ctx = NamedResource::new("urn:ctx:known");
        let connector = SharedStorageConnector::new([ctx.clone()]);
        let known = axiom("urn:e1", "http://example.org/p", "v");
        let orphan = axiom("urn:e2", "http://example.org/p", "v");

        // BTreeMap ordering visits Some("urn:ctx:known") before
        // Some("urn:ctx:missing"), so the known context merges first.
        let result = connector.apply_changes(
            vec![],
            vec![
                (known.clone(), Some(ctx.clone())),
                (orphan, Some(NamedResource::new("urn:ctx:missing"))),
            ],
        );

        assert!(matches!(result, Err(OntoError::ContextNotFound { .. })));
        assert!(connector
            .contains(Some(known.subject()), None, None, Some(&ctx))
            .unwrap());
    }

    #[test]
    fn update_bypasses_nothing_on_shared_connector() {
        let connector = SharedStorageConnector::default();
        let a = axiom("urn:e1", "http://example.org/p", "v");
        connector
            .execute_update(&UpdateQuery {
                insertions: vec![a.clone()],
                deletions: vec![],
                context: None,
            })
            .unwrap();
        assert!(connector
            .execute_ask_query(&SelectQuery::with_subject(a.subject().clone()))
            .unwrap());
    }
}

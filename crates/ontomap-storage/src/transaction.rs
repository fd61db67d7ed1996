//! Change-tracking connector: one per active transaction.
//!
//! Layers an in-memory [`LocalDelta`] over a central connector. All
//! mutations land in the delta; the central store is only touched at
//! commit, when the delta is replayed (removals first, then additions,
//! grouped by context) under the central connector's merge serialization.
//! Rollback discards the delta without contacting the central connector and
//! never fails.

use crate::connector::{ContextChanges, SelectQuery, StorageConnector, UpdateQuery};
use crate::delta::{Containment, LocalDelta};
use ontomap_model::{Assertion, Axiom, NamedResource, OntoError, Result, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

struct ActiveTransaction {
    id: Uuid,
    delta: LocalDelta,
}

/// Transactional layer over a shared central connector.
pub struct ChangeTrackingConnector<C: StorageConnector> {
    central: Arc<C>,
    transaction: Mutex<Option<ActiveTransaction>>,
}

impl<C: StorageConnector> ChangeTrackingConnector<C> {
    pub fn new(central: Arc<C>) -> Self {
        ChangeTrackingConnector {
            central,
            transaction: Mutex::new(None),
        }
    }

    pub fn central(&self) -> &Arc<C> {
        &self.central
    }

    pub fn is_active(&self) -> bool {
        self.transaction.lock().is_some()
    }

    /// Starts a transaction, creating a fresh local delta.
    pub fn begin(&self) -> Result<()> {
        let mut guard = self.transaction.lock();
        if guard.is_some() {
            return Err(OntoError::invalid_argument(
                "a transaction is already active on this connector",
            ));
        }
        let id = Uuid::new_v4();
        tracing::debug!(transaction = %id, "transaction begin");
        *guard = Some(ActiveTransaction {
            id,
            delta: LocalDelta::new(),
        });
        Ok(())
    }

    /// Merges the local delta into the central connector and ends the
    /// transaction.
    ///
    /// On merge failure the delta is discarded all the same; the caller
    /// must begin a new transaction and re-apply its changes. No partial
    /// retry is attempted.
    pub fn commit(&self) -> Result<Vec<Option<NamedResource>>> {
        let tx = self
            .transaction
            .lock()
            .take()
            .ok_or(OntoError::TransactionNotActive)?;
        let (removed, added) = tx.delta.into_changes();
        let mut touched: Vec<Option<NamedResource>> = Vec::new();
        for (_, ctx) in removed.iter().chain(added.iter()) {
            if !touched.contains(ctx) {
                touched.push(ctx.clone());
            }
        }
        match self.central.apply_changes(removed, added) {
            Ok(()) => {
                tracing::debug!(transaction = %tx.id, contexts = touched.len(), "transaction committed");
                Ok(touched)
            }
            Err(e) => {
                tracing::warn!(transaction = %tx.id, error = %e, "commit failed, local changes discarded");
                Err(e)
            }
        }
    }

    /// Discards the local delta. Never fails, even when invoked to recover
    /// from a prior storage error.
    pub fn rollback(&self) {
        if let Some(tx) = self.transaction.lock().take() {
            tracing::debug!(transaction = %tx.id, "transaction rolled back");
        }
    }

    /// Rolls back any active transaction and detaches from the central
    /// connector.
    pub fn close(&self) {
        self.rollback();
    }

    /// Whether the active delta carries changes touching `subject`.
    /// Advisory caches consult this to stay subordinate to the session's
    /// own pending changes.
    pub fn has_local_changes_for(
        &self,
        subject: &NamedResource,
        context: Option<&NamedResource>,
    ) -> bool {
        self.transaction
            .lock()
            .as_ref()
            .map(|tx| tx.delta.touches_subject(subject, context))
            .unwrap_or(false)
    }

    pub fn has_changes(&self) -> bool {
        self.transaction
            .lock()
            .as_ref()
            .map(|tx| !tx.delta.is_empty())
            .unwrap_or(false)
    }

    fn with_active<T>(&self, f: impl FnOnce(&mut ActiveTransaction) -> T) -> Result<T> {
        let mut guard = self.transaction.lock();
        match guard.as_mut() {
            Some(tx) => Ok(f(tx)),
            None => Err(OntoError::TransactionNotActive),
        }
    }
}

impl<C: StorageConnector> StorageConnector for ChangeTrackingConnector<C> {
    /// Union of central results and locally added matches, minus locally
    /// removed matches.
    fn find(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<Vec<Axiom>> {
        let existing = self.central.find(subject, assertion, value, context)?;
        self.with_active(|tx| tx.delta.enhance(existing, subject, assertion, value, context))
    }

    fn contains(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<bool> {
        // Pattern-level containment has to go through find so wildcards
        // meet the delta; exact axioms use the tri-state check directly.
        if let (Some(s), Some(a), Some(v)) = (subject, assertion, value) {
            let axiom = Axiom::new(s.clone(), a.clone(), v.clone());
            let local = self.with_active(|tx| tx.delta.contains(&axiom, context))?;
            return match local {
                Containment::Added => Ok(true),
                Containment::Removed => Ok(false),
                Containment::Unknown => self.central.contains(subject, assertion, value, context),
            };
        }
        Ok(!self.find(subject, assertion, value, context)?.is_empty())
    }

    fn add(&self, axioms: &[Axiom], context: Option<&NamedResource>) -> Result<()> {
        self.with_active(|tx| tx.delta.add_axioms(axioms, context))
    }

    fn remove(&self, axioms: &[Axiom], context: Option<&NamedResource>) -> Result<()> {
        self.with_active(|tx| tx.delta.remove_axioms(axioms, context))
    }

    fn remove_matching(
        &self,
        subject: Option<&NamedResource>,
        assertion: Option<&Assertion>,
        value: Option<&Value>,
        context: Option<&NamedResource>,
    ) -> Result<()> {
        let matching = self.find(subject, assertion, value, context)?;
        self.remove(&matching, context)
    }

    /// Query results are not enhanced with transactional changes, so no
    /// active transaction is required.
    fn execute_select_query(&self, query: &SelectQuery) -> Result<Vec<Axiom>> {
        self.central.execute_select_query(query)
    }

    fn execute_ask_query(&self, query: &SelectQuery) -> Result<bool> {
        self.central.execute_ask_query(query)
    }

    /// Updates have their own execution path and transcend the
    /// transactional boundary.
    fn execute_update(&self, update: &UpdateQuery) -> Result<()> {
        self.central.execute_update(update)
    }

    /// Central contexts plus contexts only the local delta has touched, in
    /// stable order.
    fn contexts(&self) -> Result<Vec<NamedResource>> {
        let mut contexts = self.central.contexts()?;
        self.with_active(|tx| {
            for ctx in tx.delta.contexts() {
                if !contexts.contains(ctx) {
                    contexts.push(ctx.clone());
                }
            }
        })?;
        Ok(contexts)
    }

    fn apply_changes(&self, removed: ContextChanges, added: ContextChanges) -> Result<()> {
        self.with_active(|tx| {
            for (axiom, ctx) in &removed {
                tx.delta
                    .remove_axioms(std::slice::from_ref(axiom), ctx.as_ref());
            }
            for (axiom, ctx) in &added {
                tx.delta
                    .add_axioms(std::slice::from_ref(axiom), ctx.as_ref());
            }
        })
    }
}

impl<C: StorageConnector> Drop for ChangeTrackingConnector<C> {
    fn drop(&mut self) {
        if self.is_active() {
            self.rollback();
        }
    }
}

//! Unit of work: one session over the shared store.
//!
//! A connection owns an identity map (at most one live instance per key,
//! so repeated finds are reference-equal via `Arc`), the new/changed
//! tracking of the running transaction, and the change-tracking connector
//! isolating the session's edits until commit. Connections are used by a
//! single logical caller at a time and are not internally thread-safe;
//! any number of them may run concurrently over one shared connector.

use crate::metamodel::{EntityPrototype, EntityTypeSpec, ListAttributeSpec, Metamodel};
use ontomap_model::{
    Assertion, Axiom, AxiomDescriptor, AxiomValueDescriptor, DriverConfiguration, NamedResource,
    OntoError, ReferencedListDescriptor, ReferencedListValueDescriptor, Result,
    SimpleListDescriptor, SimpleListValueDescriptor, Value,
};
use ontomap_storage::{
    ChangeTrackingConnector, ReferencedListHandler, SecondLevelCache, SimpleListHandler,
    StorageConnector,
};
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type EntityKey = (TypeId, NamedResource);

/// Session boundary over the shared store.
pub struct Connection<C: StorageConnector> {
    central: Arc<C>,
    cache: Arc<SecondLevelCache>,
    metamodel: Option<Arc<Metamodel>>,
    default_context: Option<NamedResource>,
    transaction: Option<Arc<ChangeTrackingConnector<C>>>,
    /// (entity type, key) -> the one live instance of that entity.
    identity_map: HashMap<EntityKey, Arc<dyn Any + Send + Sync>>,
    /// Context each managed entity was loaded from / persisted to.
    entity_contexts: HashMap<EntityKey, Option<NamedResource>>,
    /// Entities first persisted in the running transaction; evicted from
    /// the identity map on rollback.
    new_in_transaction: HashSet<EntityKey>,
    has_changes: bool,
    auto_commit: bool,
    open: bool,
}

impl<C: StorageConnector> Connection<C> {
    pub fn new(
        central: Arc<C>,
        cache: Arc<SecondLevelCache>,
        configuration: &DriverConfiguration,
    ) -> Self {
        Connection {
            central,
            cache,
            metamodel: None,
            default_context: configuration.default_context(),
            transaction: None,
            identity_map: HashMap::new(),
            entity_contexts: HashMap::new(),
            new_in_transaction: HashSet::new(),
            has_changes: false,
            auto_commit: configuration.auto_commit(),
            open: true,
        }
    }

    pub fn set_metamodel(&mut self, metamodel: Arc<Metamodel>) {
        self.metamodel = Some(metamodel);
    }

    // ========================================================================
    // State machine
    // ========================================================================

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(OntoError::NotOpen)
        }
    }

    pub fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.ensure_open()?;
        self.auto_commit = auto_commit;
        Ok(())
    }

    pub fn auto_commit(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.auto_commit)
    }

    /// Explicitly starts a transaction. Valid only when open and no
    /// transaction is active.
    pub fn begin(&mut self) -> Result<()> {
        self.start_transaction().map(|_| ())
    }

    fn start_transaction(&mut self) -> Result<Arc<ChangeTrackingConnector<C>>> {
        self.ensure_open()?;
        if self.transaction.is_some() {
            return Err(OntoError::invalid_argument(
                "a transaction is already active on this connection",
            ));
        }
        let connector = ChangeTrackingConnector::new(Arc::clone(&self.central));
        connector.begin()?;
        let connector = Arc::new(connector);
        self.transaction = Some(Arc::clone(&connector));
        Ok(connector)
    }

    /// The active change-tracking connector, starting a transaction lazily
    /// when none is running.
    fn transaction(&mut self) -> Result<Arc<ChangeTrackingConnector<C>>> {
        if let Some(tx) = &self.transaction {
            return Ok(Arc::clone(tx));
        }
        self.start_transaction()
    }

    /// Commits the running transaction. A no-op when no changes are
    /// pending. Identity map entries survive commit; entities stay
    /// attached.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        let Some(tx) = self.transaction.take() else {
            return Ok(());
        };
        if !self.has_changes {
            // Nothing pending; discard the empty delta quietly.
            tx.rollback();
            return Ok(());
        }
        match tx.commit() {
            Ok(touched) => {
                for context in &touched {
                    self.cache.evict_context(context.as_ref());
                }
                self.new_in_transaction.clear();
                self.has_changes = false;
                Ok(())
            }
            Err(e) => {
                // The delta is already gone; treat the session as rolled
                // back so the caller can retry on a fresh transaction.
                self.evict_new_entities();
                self.has_changes = false;
                Err(e)
            }
        }
    }

    /// Discards all pending changes. Never fails in discarding local
    /// state; the only reportable error is calling it on a closed
    /// connection.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        if let Some(tx) = self.transaction.take() {
            tx.rollback();
        }
        self.evict_new_entities();
        self.has_changes = false;
        Ok(())
    }

    fn evict_new_entities(&mut self) {
        for key in std::mem::take(&mut self.new_in_transaction) {
            self.identity_map.remove(&key);
            self.entity_contexts.remove(&key);
        }
    }

    /// Rolls back any active transaction and detaches all entities.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        if self.transaction.is_some() {
            // Infallible by construction; rollback only discards state.
            let _ = self.rollback();
        }
        self.identity_map.clear();
        self.entity_contexts.clear();
        self.open = false;
    }

    // ========================================================================
    // Context resolution
    // ========================================================================

    /// Known contexts: the central ones plus any the running delta has
    /// touched.
    pub fn contexts(&self) -> Result<Vec<NamedResource>> {
        self.ensure_open()?;
        match &self.transaction {
            Some(tx) => tx.contexts(),
            None => self.central.contexts(),
        }
    }

    fn validate_context(&self, context: Option<&NamedResource>) -> Result<()> {
        let Some(ctx) = context else { return Ok(()) };
        if self.central.contexts()?.contains(ctx) {
            return Ok(());
        }
        Err(OntoError::ContextNotFound {
            context: ctx.clone(),
        })
    }

    /// Context an entity would be saved to: the one it is bound to, or the
    /// configured default.
    pub fn save_context_for<T: EntityPrototype>(&self, key: &NamedResource) -> Option<NamedResource> {
        let entity_key = (TypeId::of::<T>(), key.clone());
        match self.entity_contexts.get(&entity_key) {
            Some(bound) => bound.clone(),
            None => self.default_context.clone(),
        }
    }

    // ========================================================================
    // Entity lifecycle
    // ========================================================================

    fn entity_spec<T: EntityPrototype>(&self) -> Result<EntityTypeSpec> {
        let metamodel = self.metamodel.as_ref().ok_or(OntoError::MetamodelNotSet)?;
        metamodel
            .get(T::type_name())
            .cloned()
            .ok_or_else(|| {
                OntoError::invalid_argument(format!(
                    "entity type {} is not registered with the metamodel",
                    T::type_name()
                ))
            })
    }

    fn register_entity<T: EntityPrototype>(
        &mut self,
        entity: Arc<T>,
        context: Option<NamedResource>,
    ) -> EntityKey {
        let key = (TypeId::of::<T>(), entity.key());
        self.identity_map.insert(key.clone(), entity);
        self.entity_contexts.insert(key.clone(), context);
        key
    }

    fn managed<T: EntityPrototype>(&self, key: &NamedResource) -> Option<Arc<T>> {
        self.identity_map
            .get(&(TypeId::of::<T>(), key.clone()))
            .and_then(|entity| Arc::clone(entity).downcast::<T>().ok())
    }

    /// Whether an entity with this key is attached to this session.
    pub fn contains<T: EntityPrototype>(&self, key: &NamedResource) -> bool {
        self.identity_map.contains_key(&(TypeId::of::<T>(), key.clone()))
    }

    /// Loads the entity identified by `key`, restricted to the assertions
    /// and contexts the descriptor declares. Repeated finds of the same key
    /// return the same instance. Absence is not an error.
    pub fn find<T: EntityPrototype>(
        &mut self,
        key: &NamedResource,
        descriptor: &AxiomDescriptor,
    ) -> Result<Option<Arc<T>>> {
        self.ensure_open()?;
        self.entity_spec::<T>()?;
        if let Some(existing) = self.managed::<T>(key) {
            return Ok(Some(existing));
        }
        self.validate_context(descriptor.subject_context())?;
        let tx = self.transaction()?;
        let context = descriptor
            .subject_context()
            .cloned()
            .or_else(|| self.default_context.clone());

        // The cache is advisory only: skip it whenever this session has
        // pending changes touching the subject.
        if !tx.has_local_changes_for(key, context.as_ref()) {
            if let Some(cached) = self.cache.get::<T>(T::type_name(), key, context.as_ref()) {
                tracing::debug!(key = %key, "second-level cache hit");
                self.register_entity(Arc::clone(&cached), context);
                return Ok(Some(cached));
            }
        }

        let axioms = self.load_axioms(&tx, key, descriptor)?;
        if axioms.is_empty() {
            return Ok(None);
        }
        let Some(mut entity) = T::decode(key, &axioms)? else {
            return Ok(None);
        };
        for attribute in T::list_attributes() {
            let values = self.load_list(&tx, key, &attribute, context.as_ref())?;
            entity.set_list_values(&attribute, values);
        }

        let entity = Arc::new(entity);
        self.cache.add(
            T::type_name(),
            key.clone(),
            context.clone(),
            Arc::clone(&entity),
        );
        self.register_entity(Arc::clone(&entity), context);
        Ok(Some(entity))
    }

    /// Tries the configured default context first, then every other
    /// context known to the store.
    pub fn find_in_any_context<T: EntityPrototype>(
        &mut self,
        key: &NamedResource,
    ) -> Result<Option<Arc<T>>> {
        let descriptor = AxiomDescriptor::new(key.clone());
        if let Some(found) = self.find::<T>(key, &descriptor)? {
            return Ok(Some(found));
        }
        for context in self.contexts()? {
            if Some(&context) == self.default_context.as_ref() {
                continue;
            }
            let mut descriptor = AxiomDescriptor::new(key.clone());
            descriptor.set_subject_context(Some(context));
            if let Some(found) = self.find::<T>(key, &descriptor)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn load_axioms(
        &self,
        tx: &ChangeTrackingConnector<C>,
        key: &NamedResource,
        descriptor: &AxiomDescriptor,
    ) -> Result<Vec<Axiom>> {
        let mut axioms = Vec::new();
        if descriptor.is_empty() {
            // No declared assertions: load the whole property set.
            let context = descriptor
                .subject_context()
                .cloned()
                .or_else(|| self.default_context.clone());
            let wildcard = Assertion::unspecified_property(false);
            axioms.extend(tx.find(Some(key), Some(&wildcard), None, context.as_ref())?);
        } else {
            for assertion in descriptor.assertions() {
                let context = descriptor
                    .assertion_context(assertion)
                    .cloned()
                    .or_else(|| self.default_context.clone());
                for axiom in tx.find(Some(key), Some(assertion), None, context.as_ref())? {
                    if !axioms.contains(&axiom) {
                        axioms.push(axiom);
                    }
                }
            }
        }
        Ok(axioms)
    }

    /// Makes a new entity managed. Fails with `AlreadyExists` when an
    /// entity with the same key is attached to this session or present in
    /// the store.
    pub fn persist<T: EntityPrototype>(
        &mut self,
        entity: T,
        context: Option<NamedResource>,
    ) -> Result<Arc<T>> {
        self.ensure_open()?;
        let spec = self.entity_spec::<T>()?;
        let key = entity.key();
        self.validate_context(context.as_ref())?;
        let context = context.or_else(|| self.default_context.clone());
        let tx = self.transaction()?;
        if self.contains::<T>(&key)
            || tx.contains(Some(&key), None, None, context.as_ref())?
        {
            return Err(OntoError::AlreadyExists { identifier: key });
        }

        let mut descriptor = AxiomValueDescriptor::new(key.clone());
        descriptor.set_subject_context(context.clone());
        descriptor.add_value(
            Assertion::class_assertion(false),
            Value::Reference(spec.type_class.clone()),
        );
        entity.encode(&mut descriptor)?;
        self.write_axioms(&tx, descriptor.to_context_axioms(), false)?;
        for attribute in T::list_attributes() {
            let values = entity.list_values(&attribute);
            self.persist_list(&tx, &key, &attribute, values, context.as_ref())?;
        }

        let entity = Arc::new(entity);
        let entity_key = self.register_entity(Arc::clone(&entity), context);
        self.new_in_transaction.insert(entity_key);
        self.has_changes = true;
        if self.auto_commit {
            self.commit()?;
        }
        Ok(entity)
    }

    /// Rewrites the axioms of an already managed entity to match `entity`.
    pub fn merge<T: EntityPrototype>(&mut self, key: &NamedResource, entity: T) -> Result<Arc<T>> {
        self.ensure_open()?;
        let spec = self.entity_spec::<T>()?;
        let Some(previous) = self.managed::<T>(key) else {
            return Err(OntoError::invalid_argument(format!(
                "entity <{key}> is not managed by this connection"
            )));
        };
        if entity.key() != *key {
            return Err(OntoError::invalid_argument(
                "merged entity carries a different key",
            ));
        }
        let context = self
            .entity_contexts
            .get(&(TypeId::of::<T>(), key.clone()))
            .cloned()
            .flatten();
        let tx = self.transaction()?;

        let old_axioms = Self::encoded_axioms(&spec, &*previous, context.clone())?;
        let new_axioms = Self::encoded_axioms(&spec, &entity, context.clone())?;
        let removals: Vec<_> = old_axioms
            .iter()
            .filter(|pair| !new_axioms.contains(pair))
            .cloned()
            .collect();
        let additions: Vec<_> = new_axioms
            .into_iter()
            .filter(|pair| !old_axioms.contains(pair))
            .collect();
        self.write_axioms(&tx, removals, true)?;
        self.write_axioms(&tx, additions, false)?;
        for attribute in T::list_attributes() {
            let values = entity.list_values(&attribute);
            self.persist_list(&tx, key, &attribute, values, context.as_ref())?;
        }

        self.cache.evict(T::type_name(), key, context.as_ref());
        let entity = Arc::new(entity);
        self.register_entity(Arc::clone(&entity), context);
        self.has_changes = true;
        if self.auto_commit {
            self.commit()?;
        }
        Ok(entity)
    }

    /// Detaches the entity and issues removal of all its known axioms.
    pub fn remove<T: EntityPrototype>(&mut self, key: &NamedResource) -> Result<()> {
        self.ensure_open()?;
        let _spec = self.entity_spec::<T>()?;
        let entity_key = (TypeId::of::<T>(), key.clone());
        if !self.identity_map.contains_key(&entity_key) {
            return Err(OntoError::invalid_argument(format!(
                "entity <{key}> is not managed by this connection"
            )));
        }
        let context = self.entity_contexts.get(&entity_key).cloned().flatten();
        let tx = self.transaction()?;

        // List chains first, while their head links still exist; the
        // chain links hang off other subjects and a wildcard removal on
        // the owner would orphan them.
        for attribute in T::list_attributes() {
            self.persist_list(&tx, key, &attribute, Vec::new(), context.as_ref())?;
        }
        let wildcard = Assertion::unspecified_property(false);
        tx.remove_matching(Some(key), Some(&wildcard), None, context.as_ref())?;

        self.identity_map.remove(&entity_key);
        self.entity_contexts.remove(&entity_key);
        self.new_in_transaction.remove(&entity_key);
        self.cache.evict(T::type_name(), key, context.as_ref());
        self.has_changes = true;
        if self.auto_commit {
            self.commit()?;
        }
        Ok(())
    }

    // ========================================================================
    // Encoding helpers
    // ========================================================================

    fn encoded_axioms<T: EntityPrototype>(
        spec: &EntityTypeSpec,
        entity: &T,
        context: Option<NamedResource>,
    ) -> Result<Vec<(Axiom, Option<NamedResource>)>> {
        let mut descriptor = AxiomValueDescriptor::new(entity.key());
        descriptor.set_subject_context(context);
        descriptor.add_value(
            Assertion::class_assertion(false),
            Value::Reference(spec.type_class.clone()),
        );
        entity.encode(&mut descriptor)?;
        Ok(descriptor.to_context_axioms())
    }

    fn write_axioms(
        &self,
        tx: &ChangeTrackingConnector<C>,
        axioms: Vec<(Axiom, Option<NamedResource>)>,
        remove: bool,
    ) -> Result<()> {
        for (axiom, context) in axioms {
            let batch = [axiom];
            if remove {
                tx.remove(&batch, context.as_ref())?;
            } else {
                tx.add(&batch, context.as_ref())?;
            }
        }
        Ok(())
    }

    fn load_list(
        &self,
        tx: &ChangeTrackingConnector<C>,
        owner: &NamedResource,
        attribute: &ListAttributeSpec,
        context: Option<&NamedResource>,
    ) -> Result<Vec<NamedResource>> {
        match attribute {
            ListAttributeSpec::Simple { property, .. } => {
                let mut descriptor =
                    SimpleListDescriptor::new(owner.clone(), property.clone());
                descriptor.set_context(context.cloned());
                SimpleListHandler::new(tx).load(&descriptor)
            }
            ListAttributeSpec::Referenced {
                head,
                next_node,
                has_element,
                ..
            } => {
                let mut descriptor = ReferencedListDescriptor::new(
                    owner.clone(),
                    head.clone(),
                    next_node.clone(),
                    has_element.clone(),
                );
                descriptor.set_context(context.cloned());
                ReferencedListHandler::new(tx).load(&descriptor)
            }
        }
    }

    fn persist_list(
        &self,
        tx: &ChangeTrackingConnector<C>,
        owner: &NamedResource,
        attribute: &ListAttributeSpec,
        values: Vec<NamedResource>,
        context: Option<&NamedResource>,
    ) -> Result<()> {
        match attribute {
            ListAttributeSpec::Simple { property, .. } => {
                let mut descriptor =
                    SimpleListValueDescriptor::new(owner.clone(), property.clone());
                descriptor.set_context(context.cloned());
                for value in values {
                    descriptor.add_value(value);
                }
                SimpleListHandler::new(tx).persist(&descriptor)
            }
            ListAttributeSpec::Referenced {
                head,
                next_node,
                has_element,
                ..
            } => {
                let mut descriptor = ReferencedListValueDescriptor::new(
                    owner.clone(),
                    head.clone(),
                    next_node.clone(),
                    has_element.clone(),
                );
                descriptor.set_context(context.cloned());
                for value in values {
                    descriptor.add_value(value);
                }
                ReferencedListHandler::new(tx).persist(&descriptor)
            }
        }
    }
}

impl<C: StorageConnector> Drop for Connection<C> {
    fn drop(&mut self) {
        self.close();
    }
}

//! Descriptors route entity attributes to storage contexts and languages.
//!
//! A read descriptor ([`AxiomDescriptor`]) declares which assertions of a
//! subject the caller is interested in and where to look for them. A write
//! descriptor ([`AxiomValueDescriptor`]) additionally carries the values to
//! persist. List descriptors identify the properties used to encode ordered
//! sequences as triple chains.
//!
//! The key routing rule consumers rely on: an assertion without an explicit
//! context falls back to the descriptor's subject-level context.

use crate::error::{OntoError, Result};
use crate::model::{Assertion, Axiom, NamedResource, Value};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Read descriptor
// ============================================================================

/// Specifies a subject and the assertions to search for, with optional
/// context routing per assertion.
///
/// Descriptors take part in cache keys, so equality and hashing cover the
/// subject, the subject context, the assertion set and the per-assertion
/// context map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AxiomDescriptor {
    subject: NamedResource,
    subject_context: Option<NamedResource>,
    assertions: BTreeSet<Assertion>,
    assertion_contexts: BTreeMap<Assertion, Option<NamedResource>>,
}

impl AxiomDescriptor {
    pub fn new(subject: NamedResource) -> Self {
        AxiomDescriptor {
            subject,
            subject_context: None,
            assertions: BTreeSet::new(),
            assertion_contexts: BTreeMap::new(),
        }
    }

    pub fn subject(&self) -> &NamedResource {
        &self.subject
    }

    pub fn set_subject_context(&mut self, context: Option<NamedResource>) {
        self.subject_context = context;
    }

    pub fn subject_context(&self) -> Option<&NamedResource> {
        self.subject_context.as_ref()
    }

    pub fn add_assertion(&mut self, assertion: Assertion) {
        self.assertions.insert(assertion);
    }

    /// Sets the context for `assertion`. The assertion must already be
    /// present in this descriptor.
    pub fn set_assertion_context(
        &mut self,
        assertion: &Assertion,
        context: Option<NamedResource>,
    ) -> Result<()> {
        if !self.assertions.contains(assertion) {
            return Err(OntoError::invalid_argument(format!(
                "assertion {assertion} is not present in this descriptor"
            )));
        }
        self.assertion_contexts.insert(assertion.clone(), context);
        Ok(())
    }

    /// Context of `assertion`: the explicitly set one, or the subject
    /// context when none was set.
    pub fn assertion_context(&self, assertion: &Assertion) -> Option<&NamedResource> {
        match self.assertion_contexts.get(assertion) {
            Some(ctx) => ctx.as_ref(),
            None => self.subject_context.as_ref(),
        }
    }

    pub fn contains_assertion(&self, assertion: &Assertion) -> bool {
        self.assertions.contains(assertion)
    }

    pub fn assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.assertions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }
}

// ============================================================================
// Write descriptor
// ============================================================================

/// An [`AxiomDescriptor`] that also carries the values to persist for each
/// assertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AxiomValueDescriptor {
    descriptor: AxiomDescriptor,
    values: BTreeMap<Assertion, Vec<Value>>,
}

impl AxiomValueDescriptor {
    pub fn new(subject: NamedResource) -> Self {
        AxiomValueDescriptor {
            descriptor: AxiomDescriptor::new(subject),
            values: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &AxiomDescriptor {
        &self.descriptor
    }

    pub fn subject(&self) -> &NamedResource {
        self.descriptor.subject()
    }

    pub fn set_subject_context(&mut self, context: Option<NamedResource>) {
        self.descriptor.set_subject_context(context);
    }

    pub fn subject_context(&self) -> Option<&NamedResource> {
        self.descriptor.subject_context()
    }

    pub fn set_assertion_context(
        &mut self,
        assertion: &Assertion,
        context: Option<NamedResource>,
    ) -> Result<()> {
        self.descriptor.set_assertion_context(assertion, context)
    }

    pub fn assertion_context(&self, assertion: &Assertion) -> Option<&NamedResource> {
        self.descriptor.assertion_context(assertion)
    }

    /// Adds a value for `assertion`, registering the assertion when it is
    /// not yet present.
    pub fn add_value(&mut self, assertion: Assertion, value: Value) {
        self.descriptor.add_assertion(assertion.clone());
        self.values.entry(assertion).or_default().push(value);
    }

    pub fn values_of(&self, assertion: &Assertion) -> &[Value] {
        self.values.get(assertion).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.descriptor.assertions()
    }

    /// Materializes the descriptor into axioms paired with their resolved
    /// context. `Null` values are skipped; they are never persisted.
    pub fn to_context_axioms(&self) -> Vec<(Axiom, Option<NamedResource>)> {
        let mut out = Vec::new();
        for (assertion, values) in &self.values {
            let context = self.descriptor.assertion_context(assertion).cloned();
            for value in values {
                if value.is_null() {
                    continue;
                }
                out.push((
                    Axiom::new(self.subject().clone(), assertion.clone(), value.clone()),
                    context.clone(),
                ));
            }
        }
        out
    }
}

// ============================================================================
// List descriptors
// ============================================================================

/// Simple list: one property serves as both the head link from the owner
/// and the chain link between consecutive elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleListDescriptor {
    owner: NamedResource,
    list_property: Assertion,
    context: Option<NamedResource>,
}

impl SimpleListDescriptor {
    pub fn new(owner: NamedResource, list_property: Assertion) -> Self {
        SimpleListDescriptor {
            owner,
            list_property,
            context: None,
        }
    }

    pub fn owner(&self) -> &NamedResource {
        &self.owner
    }

    /// Head link from the owner to the first element.
    pub fn list_property(&self) -> &Assertion {
        &self.list_property
    }

    /// Chain link between consecutive elements. Simple lists reuse the list
    /// property for every link.
    pub fn next_node(&self) -> &Assertion {
        &self.list_property
    }

    pub fn set_context(&mut self, context: Option<NamedResource>) {
        self.context = context;
    }

    pub fn context(&self) -> Option<&NamedResource> {
        self.context.as_ref()
    }

    pub fn is_inferred(&self) -> bool {
        self.list_property.is_inferred()
    }
}

/// A [`SimpleListDescriptor`] carrying the ordered sequence to persist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleListValueDescriptor {
    descriptor: SimpleListDescriptor,
    values: Vec<NamedResource>,
}

impl SimpleListValueDescriptor {
    pub fn new(owner: NamedResource, list_property: Assertion) -> Self {
        SimpleListValueDescriptor {
            descriptor: SimpleListDescriptor::new(owner, list_property),
            values: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &SimpleListDescriptor {
        &self.descriptor
    }

    pub fn set_context(&mut self, context: Option<NamedResource>) {
        self.descriptor.set_context(context);
    }

    pub fn add_value(&mut self, value: NamedResource) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[NamedResource] {
        &self.values
    }
}

/// Referenced list: the chain is built from dedicated node resources linked
/// by `next_node`, each node pointing at its element through `has_element`.
/// Node identity and chain identity are decoupled, so an element may be
/// referenced elsewhere without breaking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferencedListDescriptor {
    owner: NamedResource,
    list_property: Assertion,
    next_node: Assertion,
    has_element: Assertion,
    context: Option<NamedResource>,
}

impl ReferencedListDescriptor {
    pub fn new(
        owner: NamedResource,
        list_property: Assertion,
        next_node: Assertion,
        has_element: Assertion,
    ) -> Self {
        ReferencedListDescriptor {
            owner,
            list_property,
            next_node,
            has_element,
            context: None,
        }
    }

    pub fn owner(&self) -> &NamedResource {
        &self.owner
    }

    /// Head link from the owner to the first node.
    pub fn list_property(&self) -> &Assertion {
        &self.list_property
    }

    /// Chain link between consecutive nodes.
    pub fn next_node(&self) -> &Assertion {
        &self.next_node
    }

    /// Link from a node to the element it carries.
    pub fn has_element(&self) -> &Assertion {
        &self.has_element
    }

    pub fn set_context(&mut self, context: Option<NamedResource>) {
        self.context = context;
    }

    pub fn context(&self) -> Option<&NamedResource> {
        self.context.as_ref()
    }

    pub fn is_inferred(&self) -> bool {
        self.list_property.is_inferred()
            || self.next_node.is_inferred()
            || self.has_element.is_inferred()
    }
}

/// A [`ReferencedListDescriptor`] carrying the ordered sequence to persist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferencedListValueDescriptor {
    descriptor: ReferencedListDescriptor,
    values: Vec<NamedResource>,
}

impl ReferencedListValueDescriptor {
    pub fn new(
        owner: NamedResource,
        list_property: Assertion,
        next_node: Assertion,
        has_element: Assertion,
    ) -> Self {
        ReferencedListValueDescriptor {
            descriptor: ReferencedListDescriptor::new(owner, list_property, next_node, has_element),
            values: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &ReferencedListDescriptor {
        &self.descriptor
    }

    pub fn set_context(&mut self, context: Option<NamedResource>) {
        self.descriptor.set_context(context);
    }

    pub fn add_value(&mut self, value: NamedResource) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[NamedResource] {
        &self.values
    }
}

// ============================================================================
// Tests
// ============================================================================

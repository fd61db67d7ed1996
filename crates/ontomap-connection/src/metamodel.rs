//! Metamodel seam: explicit schema descriptions supplied by the caller.
//!
//! There is no runtime field introspection here. Each entity type brings an
//! explicit encode/decode capability ([`EntityPrototype`]) plus a schema
//! description ([`EntityTypeSpec`]) registered in a [`Metamodel`] object
//! that the composition root owns and passes in at startup.

use ontomap_model::{Assertion, Axiom, AxiomValueDescriptor, NamedResource, Result};
use std::any::Any;
use std::collections::HashMap;

/// Attribute multiplicity, as the schema provider declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Plural,
}

/// One attribute of an entity type: its name and the assertion its values
/// are stored under.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub assertion: Assertion,
    pub cardinality: Cardinality,
}

/// Schema description of one entity type.
#[derive(Debug, Clone)]
pub struct EntityTypeSpec {
    pub type_name: &'static str,
    /// Ontology class the entity instances are typed with.
    pub type_class: NamedResource,
    /// Name of the attribute holding the primary key.
    pub identifier_attribute: &'static str,
    pub attributes: Vec<AttributeSpec>,
}

impl EntityTypeSpec {
    /// Assertions a read descriptor for this type declares: the class
    /// assertion plus one per attribute.
    pub fn declared_assertions(&self) -> Vec<Assertion> {
        let mut assertions = vec![Assertion::class_assertion(false)];
        assertions.extend(self.attributes.iter().map(|a| a.assertion.clone()));
        assertions
    }
}

/// Schema of an ordered (list-valued) attribute.
#[derive(Debug, Clone)]
pub enum ListAttributeSpec {
    /// One property serves as head link and chain link.
    Simple {
        name: &'static str,
        property: Assertion,
    },
    /// Dedicated chain nodes with separate content and next-node
    /// properties.
    Referenced {
        name: &'static str,
        head: Assertion,
        next_node: Assertion,
        has_element: Assertion,
    },
}

impl ListAttributeSpec {
    pub fn name(&self) -> &'static str {
        match self {
            ListAttributeSpec::Simple { name, .. } => name,
            ListAttributeSpec::Referenced { name, .. } => name,
        }
    }
}

/// Encode/decode capability of one entity type.
///
/// Scalar attributes travel through an [`AxiomValueDescriptor`]; ordered
/// attributes are declared via [`Self::list_attributes`] and exchanged as
/// plain sequences, with the unit of work driving the list codec.
pub trait EntityPrototype: Any + Send + Sync + Sized {
    fn type_name() -> &'static str;

    /// Schema description registered with the metamodel.
    fn entity_type() -> EntityTypeSpec;

    /// Primary key of this instance.
    fn key(&self) -> NamedResource;

    /// Writes the instance's scalar attribute values into `descriptor`.
    fn encode(&self, descriptor: &mut AxiomValueDescriptor) -> Result<()>;

    /// Reconstructs an instance from the axioms loaded for `subject`.
    /// Returns `None` when the axioms do not describe this type.
    fn decode(subject: &NamedResource, axioms: &[Axiom]) -> Result<Option<Self>>;

    fn list_attributes() -> Vec<ListAttributeSpec> {
        Vec::new()
    }

    /// Current sequence of an ordered attribute.
    fn list_values(&self, _attribute: &ListAttributeSpec) -> Vec<NamedResource> {
        Vec::new()
    }

    /// Installs a decoded sequence into an ordered attribute.
    fn set_list_values(&mut self, _attribute: &ListAttributeSpec, _values: Vec<NamedResource>) {}
}

/// Registry of entity type schemas, passed to connections at startup.
#[derive(Debug, Default)]
pub struct Metamodel {
    types: HashMap<&'static str, EntityTypeSpec>,
}

impl Metamodel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: EntityPrototype>(&mut self) -> &mut Self {
        let spec = T::entity_type();
        self.types.insert(T::type_name(), spec);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&EntityTypeSpec> {
        self.types.get(type_name)
    }

    pub fn is_registered<T: EntityPrototype>(&self) -> bool {
        self.types.contains_key(T::type_name())
    }
}

//! Triple model: resource identifiers, assertions, values and axioms.
//!
//! All types here are immutable values. Mutation of stored knowledge is
//! always expressed as "remove the old axiom, add a new one"; nothing in
//! this module carries interior state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of `rdf:type`, reserved for class assertions.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Reserved identifier of the unspecified (wildcard) property assertion.
/// On read it matches any predicate of the subject.
pub const UNSPECIFIED_PROPERTY: &str = "http://ontomap.org/attributes#unspecified-property";

// ============================================================================
// Named resources
// ============================================================================

/// An opaque, globally unique, URI-like identifier.
///
/// Used as axiom subject, as object-reference value and as context
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedResource(String);

impl NamedResource {
    pub fn new(identifier: impl Into<String>) -> Self {
        NamedResource(identifier.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NamedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NamedResource {
    fn from(s: &str) -> Self {
        NamedResource::new(s)
    }
}

// ============================================================================
// Assertions
// ============================================================================

/// Role of an assertion. Fixed at construction.
///
/// The hierarchy is closed (there are no other kinds of assertions in an
/// ontology), so a plain enum is sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssertionRole {
    Class,
    /// Used when the property kind is unknown, e.g. when loading the whole
    /// property set of a subject.
    Property,
    ObjectProperty,
    DataProperty,
    AnnotationProperty,
}

/// A typed, identified predicate, distinguishing inferred from explicit
/// statements.
///
/// Equality includes the inferred flag and the role, so an inferred and an
/// explicit assertion on the same identifier are distinct map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Assertion {
    identifier: NamedResource,
    role: AssertionRole,
    inferred: bool,
}

impl Assertion {
    /// Class assertions use the reserved `rdf:type` identifier.
    pub fn class_assertion(inferred: bool) -> Self {
        Assertion {
            identifier: NamedResource::new(RDF_TYPE),
            role: AssertionRole::Class,
            inferred,
        }
    }

    /// A property assertion whose identifier is left unspecified. Matches
    /// any predicate on read.
    pub fn unspecified_property(inferred: bool) -> Self {
        Assertion {
            identifier: NamedResource::new(UNSPECIFIED_PROPERTY),
            role: AssertionRole::Property,
            inferred,
        }
    }

    pub fn property(identifier: impl Into<NamedResource>, inferred: bool) -> Self {
        Assertion {
            identifier: identifier.into(),
            role: AssertionRole::Property,
            inferred,
        }
    }

    pub fn object_property(identifier: impl Into<NamedResource>, inferred: bool) -> Self {
        Assertion {
            identifier: identifier.into(),
            role: AssertionRole::ObjectProperty,
            inferred,
        }
    }

    pub fn data_property(identifier: impl Into<NamedResource>, inferred: bool) -> Self {
        Assertion {
            identifier: identifier.into(),
            role: AssertionRole::DataProperty,
            inferred,
        }
    }

    pub fn annotation_property(identifier: impl Into<NamedResource>, inferred: bool) -> Self {
        Assertion {
            identifier: identifier.into(),
            role: AssertionRole::AnnotationProperty,
            inferred,
        }
    }

    pub fn identifier(&self) -> &NamedResource {
        &self.identifier
    }

    pub fn role(&self) -> AssertionRole {
        self.role
    }

    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    pub fn is_class_assertion(&self) -> bool {
        self.identifier.as_str() == RDF_TYPE
    }

    pub fn is_unspecified(&self) -> bool {
        self.identifier.as_str() == UNSPECIFIED_PROPERTY
    }

    /// Whether an axiom carrying `stored` satisfies a read pattern on
    /// `self`. Unspecified assertions match any identifier; an inferred
    /// pattern also accepts explicit statements, while an explicit pattern
    /// never matches inferred ones.
    pub fn matches(&self, stored: &Assertion) -> bool {
        let identifier_ok = self.is_unspecified() || self.identifier == stored.identifier;
        identifier_ok && (self.inferred || !stored.inferred)
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}>{}",
            self.identifier,
            if self.inferred { " (inferred)" } else { "" }
        )
    }
}

// ============================================================================
// Values
// ============================================================================

/// A typed scalar literal.
///
/// `Double` compares and hashes by bit pattern so axioms can live in hash
/// sets; NaN payload differences therefore distinguish literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Boolean(a), Literal::Boolean(b)) => a == b,
            (Literal::Integer(a), Literal::Integer(b)) => a == b,
            (Literal::Double(a), Literal::Double(b)) => a.to_bits() == b.to_bits(),
            (Literal::String(a), Literal::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Literal::Boolean(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Literal::Integer(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Literal::Double(v) => {
                2u8.hash(state);
                v.to_bits().hash(state);
            }
            Literal::String(v) => {
                3u8.hash(state);
                v.hash(state);
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(v) => write!(f, "{v}"),
            Literal::Integer(v) => write!(f, "{v}"),
            Literal::Double(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "\"{v}\""),
        }
    }
}

/// Object position of an axiom: a literal (with optional language tag), a
/// reference to another resource, or null.
///
/// `Null` signals "no value" in write descriptors and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Literal {
        value: Literal,
        language: Option<String>,
    },
    Reference(NamedResource),
    Null,
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::Literal {
            value: Literal::String(value.into()),
            language: None,
        }
    }

    pub fn lang_string(value: impl Into<String>, language: impl Into<String>) -> Self {
        Value::Literal {
            value: Literal::String(value.into()),
            language: Some(language.into()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Value::Literal {
            value: Literal::Integer(value),
            language: None,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Value::Literal {
            value: Literal::Boolean(value),
            language: None,
        }
    }

    pub fn double(value: f64) -> Self {
        Value::Literal {
            value: Literal::Double(value),
            language: None,
        }
    }

    pub fn reference(resource: impl Into<NamedResource>) -> Self {
        Value::Reference(resource.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The referenced resource, when this value is a reference.
    pub fn as_reference(&self) -> Option<&NamedResource> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal {
                value,
                language: Some(lang),
            } => write!(f, "{value}@{lang}"),
            Value::Literal {
                value,
                language: None,
            } => write!(f, "{value}"),
            Value::Reference(r) => write!(f, "<{r}>"),
            Value::Null => write!(f, "null"),
        }
    }
}

// ============================================================================
// Axioms
// ============================================================================

/// A subject-assertion-value triple, the atomic unit of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Axiom {
    subject: NamedResource,
    assertion: Assertion,
    value: Value,
}

impl Axiom {
    pub fn new(subject: NamedResource, assertion: Assertion, value: Value) -> Self {
        Axiom {
            subject,
            assertion,
            value,
        }
    }

    pub fn subject(&self) -> &NamedResource {
        &self.subject
    }

    pub fn assertion(&self) -> &Assertion {
        &self.assertion
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for Axiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[<{}> {} {}]", self.subject, self.assertion, self.value)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Ontomap data model: the triple/axiom value types, the descriptors that
//! route entity attributes to storage contexts, and the driver configuration.
//!
//! Everything in this crate is a plain value type. Behavior lives in
//! `ontomap-storage` (connectors, list codec, cache) and
//! `ontomap-connection` (unit of work); this crate only defines the shared
//! vocabulary those layers exchange:
//!
//! ```text
//!   NamedResource ── subject / reference / context identifier
//!   Assertion ────── typed predicate (explicit or inferred)
//!   Value ────────── literal, resource reference, or null
//!   Axiom ────────── (subject, assertion, value), the storage unit
//!   Descriptor ───── per-attribute context/language routing
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod model;

pub use config::DriverConfiguration;
pub use descriptor::{
    AxiomDescriptor, AxiomValueDescriptor, ReferencedListDescriptor,
    ReferencedListValueDescriptor, SimpleListDescriptor, SimpleListValueDescriptor,
};
pub use error::{OntoError, Result};
pub use model::{Assertion, AssertionRole, Axiom, Literal, NamedResource, Value};

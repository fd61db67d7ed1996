//! Session layer: drivers, connections and the entity metamodel seam.
//!
//! ```text
//!            Driver (composition root)
//!                 |  connect()
//!                 v
//!   Connection ───── identity map + entity tracking
//!       |
//!       v
//!   ChangeTrackingConnector ── local delta (ontomap-storage)
//!       |
//!       v
//!   SharedStorageConnector ─── committed contexts
//! ```
//!
//! A [`Connection`] is the unit of work: it materializes entities through
//! the caller-supplied [`Metamodel`], keeps at most one live instance per
//! key, and stages all changes in a transaction-local delta until commit.

pub mod connection;
pub mod driver;
pub mod metamodel;

pub use connection::Connection;
pub use driver::Driver;
pub use metamodel::{
    AttributeSpec, Cardinality, EntityPrototype, EntityTypeSpec, ListAttributeSpec, Metamodel,
};

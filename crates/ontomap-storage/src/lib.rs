//! Ontomap storage layer.
//!
//! Two connector layers give each session snapshot-like isolation on top of
//! a store with no native transaction support:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  session A                      session B                  │
//! │  ┌──────────────────────┐      ┌──────────────────────┐   │
//! │  │ ChangeTrackingConn.  │      │ ChangeTrackingConn.  │   │
//! │  │  LocalDelta (A)      │      │  LocalDelta (B)      │   │
//! │  └──────────┬───────────┘      └──────────┬───────────┘   │
//! │             │        commit merges        │               │
//! │             ▼                             ▼               │
//! │  ┌────────────────────────────────────────────────────┐   │
//! │  │       SharedStorageConnector (committed state)     │   │
//! │  │           one axiom set per context                │   │
//! │  └────────────────────────────────────────────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads resolve through the local delta first (delta wins over central
//! state for the same triple), then the committed store. Queries bypass the
//! delta entirely; querying is not transactional in this model.

pub mod cache;
pub mod connector;
pub mod delta;
pub mod lists;
pub mod transaction;


pub use cache::SecondLevelCache;
pub use connector::{SelectQuery, SharedStorageConnector, StorageConnector, UpdateQuery};
pub use delta::{Containment, LocalDelta};
pub use lists::{ReferencedListHandler, SimpleListHandler};
pub use transaction::ChangeTrackingConnector;

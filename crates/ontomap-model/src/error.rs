//! Error taxonomy shared by all Ontomap crates.
//!
//! Validation errors (`InvalidArgument`, `AlreadyExists`, `ContextNotFound`)
//! are raised synchronously at the offending call and do not poison the
//! active transaction. `Storage` and `Consistency` surfaced during commit
//! force an implicit rollback of the failing session's delta.

use crate::model::NamedResource;

pub type Result<T> = std::result::Result<T, OntoError>;

#[derive(Debug, thiserror::Error)]
pub enum OntoError {
    /// Operation invoked on a closed connection.
    #[error("connection is not open")]
    NotOpen,

    /// Read or write outside an active transaction.
    #[error("no transaction is active")]
    TransactionNotActive,

    /// Persist of an entity whose key is already registered.
    #[error("an entity with identifier <{identifier}> already exists")]
    AlreadyExists { identifier: NamedResource },

    /// An explicitly named context is unknown to the store.
    #[error("context <{context}> not found")]
    ContextNotFound { context: NamedResource },

    /// Entity operation attempted without metamodel information.
    #[error("metamodel has not been set on this connection")]
    MetamodelNotSet,

    /// Contract violation by the caller (missing assertion, untracked key).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by the backing store.
    #[error("storage access failure: {0}")]
    Storage(String),

    /// Commit-time merge failure or a malformed triple structure
    /// (e.g. a list node with multiple successors).
    #[error("consistency violation: {0}")]
    Consistency(String),
}

impl OntoError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        OntoError::InvalidArgument(message.into())
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        OntoError::Consistency(message.into())
    }
}

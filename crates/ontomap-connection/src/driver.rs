//! Driver: composition root tying the shared connector, the second-level
//! cache, the metamodel and the configuration together.
//!
//! One driver per store. Every connection handed out by [`Driver::connect`]
//! shares the driver's central connector and cache; each carries its own
//! transaction state.

use crate::connection::Connection;
use crate::metamodel::Metamodel;
use ontomap_model::{DriverConfiguration, NamedResource, Result};
use ontomap_storage::{SecondLevelCache, SharedStorageConnector, StorageConnector};
use std::sync::Arc;

pub struct Driver<C: StorageConnector = SharedStorageConnector> {
    central: Arc<C>,
    cache: Arc<SecondLevelCache>,
    metamodel: Arc<Metamodel>,
    configuration: DriverConfiguration,
}

impl Driver<SharedStorageConnector> {
    /// In-memory driver over a fresh shared connector. Named contexts must
    /// be declared up front; the store never creates them on demand.
    pub fn in_memory(
        contexts: impl IntoIterator<Item = NamedResource>,
        metamodel: Metamodel,
        configuration: DriverConfiguration,
    ) -> Self {
        Self::new(
            Arc::new(SharedStorageConnector::new(contexts)),
            metamodel,
            configuration,
        )
    }
}

impl<C: StorageConnector> Driver<C> {
    pub fn new(central: Arc<C>, metamodel: Metamodel, configuration: DriverConfiguration) -> Self {
        Driver {
            central,
            cache: Arc::new(SecondLevelCache::new()),
            metamodel: Arc::new(metamodel),
            configuration,
        }
    }

    pub fn central(&self) -> &Arc<C> {
        &self.central
    }

    pub fn cache(&self) -> &Arc<SecondLevelCache> {
        &self.cache
    }

    pub fn configuration(&self) -> &DriverConfiguration {
        &self.configuration
    }

    /// Opens a new session over the shared store.
    pub fn connect(&self) -> Connection<C> {
        let mut connection = Connection::new(
            Arc::clone(&self.central),
            Arc::clone(&self.cache),
            &self.configuration,
        );
        connection.set_metamodel(Arc::clone(&self.metamodel));
        connection
    }

    /// Contexts known to the central connector.
    pub fn contexts(&self) -> Result<Vec<NamedResource>> {
        self.central.contexts()
    }

    /// Drops every cached entity, e.g. after changes applied outside any
    /// connection.
    pub fn evict_cache(&self) {
        self.cache.evict_all();
    }
}

//! Driver configuration.
//!
//! Connection parameters are carried as opaque key/value properties; this
//! core only interprets the handful of keys below and passes everything
//! else through to the backing store driver.

use crate::model::NamedResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Property key of the default storage context URI.
pub const DEFAULT_CONTEXT: &str = "ontomap.context.default";
/// Property key of the default language tag for string literals.
pub const DEFAULT_LANGUAGE: &str = "ontomap.language.default";
/// Property key of the initial auto-commit mode of new connections.
pub const AUTO_COMMIT: &str = "ontomap.connection.autocommit";

/// Opaque key/value configuration with typed accessors for the keys this
/// core understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverConfiguration {
    properties: BTreeMap<String, String>,
}

impl DriverConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&contents)?)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is(&self, key: &str) -> bool {
        self.get(key).map(|v| v == "true").unwrap_or(false)
    }

    pub fn default_context(&self) -> Option<NamedResource> {
        self.get(DEFAULT_CONTEXT).map(NamedResource::new)
    }

    pub fn default_language(&self) -> Option<&str> {
        self.get(DEFAULT_LANGUAGE)
    }

    pub fn auto_commit(&self) -> bool {
        self.is(AUTO_COMMIT)
    }
}

//! Bundle configuration entities and the storages they are read from.
//!
//! A bundle carries one graph URI per graph name. The URIs live in the
//! bundle's third-party settings under the `rdf_entity` namespace with keys
//! of the form `graph_<name>`, the same shape an exported configuration file
//! has, and are validated whenever a bundle is saved.

pub mod memory;
pub mod sqlite;
pub mod yaml;

pub use memory::MemoryBundleStorage;
pub use sqlite::SqliteBundleStorage;
pub use yaml::YamlBundleStorage;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RdfGraphError, Result};
use crate::graph::is_machine_name;
use crate::sparql;

/// Third-party settings namespace holding the graph URIs.
pub const SETTINGS_NAMESPACE: &str = "rdf_entity";

/// Setting key prefix, followed by the graph name.
pub const GRAPH_KEY_PREFIX: &str = "graph_";

/// A bundle configuration entity, e.g. one content type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Bundle machine name
    #[serde(default, alias = "rid", alias = "type")]
    pub id: String,
    /// Human-readable name
    #[serde(default, alias = "name")]
    pub label: String,
    /// Settings contributed by other components, keyed by namespace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub third_party_settings: BTreeMap<String, BTreeMap<String, Value>>,
}

impl BundleConfig {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            third_party_settings: BTreeMap::new(),
        }
    }

    /// Builder form of [`BundleConfig::set_graph_uri`].
    pub fn with_graph_uri(mut self, graph_name: &str, uri: &str) -> Self {
        self.set_graph_uri(graph_name, uri);
        self
    }

    pub fn third_party_setting(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.third_party_settings.get(namespace)?.get(key)
    }

    pub fn set_third_party_setting(&mut self, namespace: &str, key: &str, value: Value) {
        self.third_party_settings
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// The URI configured for `graph_name`.
    ///
    /// Unset, empty and non-string settings all count as "not configured".
    pub fn graph_uri(&self, graph_name: &str) -> Option<&str> {
        let key = format!("{GRAPH_KEY_PREFIX}{graph_name}");
        match self.third_party_setting(SETTINGS_NAMESPACE, &key)? {
            Value::String(uri) if !uri.is_empty() => Some(uri.as_str()),
            _ => None,
        }
    }

    pub fn set_graph_uri(&mut self, graph_name: &str, uri: &str) {
        let key = format!("{GRAPH_KEY_PREFIX}{graph_name}");
        self.set_third_party_setting(SETTINGS_NAMESPACE, &key, Value::String(uri.to_string()));
    }

    /// All configured `(graph name, uri)` pairs, ordered by graph name.
    pub fn graph_uris(&self) -> Vec<(&str, &str)> {
        let Some(settings) = self.third_party_settings.get(SETTINGS_NAMESPACE) else {
            return Vec::new();
        };
        settings
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(GRAPH_KEY_PREFIX)?;
                match value {
                    Value::String(uri) if !uri.is_empty() => Some((name, uri.as_str())),
                    _ => None,
                }
            })
            .collect()
    }

    /// Check the bundle before it is persisted.
    pub fn validate(&self) -> Result<()> {
        if !is_machine_name(&self.id) {
            return Err(RdfGraphError::Config(format!(
                "Invalid bundle machine name: '{}'",
                self.id
            )));
        }

        let Some(settings) = self.third_party_settings.get(SETTINGS_NAMESPACE) else {
            return Ok(());
        };
        for (key, value) in settings {
            let Some(name) = key.strip_prefix(GRAPH_KEY_PREFIX) else {
                continue;
            };
            match value {
                // Explicitly unset
                Value::Null | Value::Bool(false) => {}
                Value::String(uri) if uri.is_empty() => {}
                Value::String(uri) if sparql::is_valid_resource(uri) => {}
                other => {
                    return Err(RdfGraphError::InvalidResourceUri(format!(
                        "graph {} of bundle {}: {}",
                        name, self.id, other
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Storage of bundle configuration entities, keyed by bundle type.
pub trait BundleStorage: Send + Sync {
    /// Load one bundle, `None` if it does not exist.
    fn load(&self, bundle_type: &str, bundle_id: &str) -> Result<Option<BundleConfig>>;

    /// Load every bundle of a type, ordered by bundle id.
    fn load_multiple(&self, bundle_type: &str) -> Result<Vec<BundleConfig>>;

    /// Validate and persist a bundle, replacing any previous version.
    fn save(&self, bundle_type: &str, bundle: &BundleConfig) -> Result<()>;
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundle::{BundleStorage, SqliteBundleStorage, YamlBundleStorage};
use crate::graph::{is_machine_name, ConfiguredGraphs, GraphDefinition, GraphDefinitionRegistry, GraphHandler};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rdfgraph: RdfGraphConfig,
    #[serde(default)]
    pub graphs: GraphsConfig,
    pub storage: StorageConfig,
}

/// Entity type served and logging
#[derive(Debug, Clone, Deserialize)]
pub struct RdfGraphConfig {
    /// Entity type id the graph handler is built for
    pub entity_type: String,
    /// Bundle entity type key, e.g. `rdf_type`
    pub bundle_type: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Graphs contributed by configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphsConfig {
    /// Replaces the built-in `["default"]` enabled list when set
    #[serde(default)]
    pub enabled: Option<Vec<String>>,
    #[serde(default)]
    pub definitions: BTreeMap<String, GraphDefinitionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphDefinitionConfig {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Where bundle configuration entities are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory of exported `<bundle_type>.<id>.yml` files
    Yaml,
    /// SQLite database file
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RDFGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RDFGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !is_machine_name(&self.rdfgraph.entity_type) {
            anyhow::bail!("rdfgraph.entity_type must be a machine name: '{}'", self.rdfgraph.entity_type);
        }

        if !is_machine_name(&self.rdfgraph.bundle_type) {
            anyhow::bail!("rdfgraph.bundle_type must be a machine name: '{}'", self.rdfgraph.bundle_type);
        }

        if let Some(enabled) = &self.graphs.enabled {
            if enabled.is_empty() {
                anyhow::bail!("graphs.enabled must list at least one graph");
            }
            if let Some(name) = enabled.iter().find(|n| !is_machine_name(n)) {
                anyhow::bail!("graphs.enabled contains an invalid graph name: '{}'", name);
            }
        }

        if let Some(name) = self.graphs.definitions.keys().find(|n| !is_machine_name(n)) {
            anyhow::bail!("graphs.definitions contains an invalid graph name: '{}'", name);
        }

        if self.storage.backend == StorageBackend::Yaml && !self.storage.path.is_dir() {
            anyhow::bail!(
                "storage.path must be an existing directory for the yaml backend: {}",
                self.storage.path.display()
            );
        }

        Ok(())
    }

    /// Graph definition registry with the configured graphs registered
    pub fn registry(&self) -> GraphDefinitionRegistry {
        let definitions = self
            .graphs
            .definitions
            .iter()
            .map(|(name, def)| GraphDefinition::new(name.clone(), def.title.clone(), def.description.clone()))
            .collect();

        let mut registry = GraphDefinitionRegistry::new();
        registry.register(Box::new(ConfiguredGraphs::new(
            self.rdfgraph.entity_type.clone(),
            self.graphs.enabled.clone(),
            definitions,
        )));
        registry
    }

    /// Open the configured bundle storage
    pub fn open_storage(&self) -> Result<Arc<dyn BundleStorage>> {
        let storage: Arc<dyn BundleStorage> = match self.storage.backend {
            StorageBackend::Yaml => Arc::new(
                YamlBundleStorage::open(&self.storage.path)
                    .context("Failed to load bundle configuration files")?,
            ),
            StorageBackend::Sqlite => Arc::new(
                SqliteBundleStorage::open(&self.storage.path)
                    .context("Failed to open bundle database")?,
            ),
        };
        Ok(storage)
    }

    /// Build a graph handler for one request
    pub fn handler(&self, registry: Arc<GraphDefinitionRegistry>, storage: Arc<dyn BundleStorage>) -> Result<GraphHandler> {
        GraphHandler::new(self.rdfgraph.entity_type.clone(), registry, storage)
            .context("Failed to build graph handler")
    }

    pub fn entity_type(&self) -> &str {
        &self.rdfgraph.entity_type
    }

    pub fn bundle_type(&self) -> &str {
        &self.rdfgraph.bundle_type
    }
}

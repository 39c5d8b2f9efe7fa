//! Graph definitions and the alter hooks that contribute them.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The graph every entity type has.
pub const DEFAULT_GRAPH: &str = "default";

static MACHINE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("Invalid regex pattern"));

/// Whether `name` is usable as a graph or bundle machine name.
pub fn is_machine_name(name: &str) -> bool {
    MACHINE_NAME.is_match(name)
}

/// A named graph available to an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl GraphDefinition {
    pub fn new(name: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Graph definitions keyed by name. Inserting an existing name replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphDefinitions(BTreeMap<String, GraphDefinition>);

impl GraphDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: GraphDefinition) -> Option<GraphDefinition> {
        self.0.insert(definition.name.clone(), definition)
    }

    pub fn remove(&mut self, name: &str) -> Option<GraphDefinition> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&GraphDefinition> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GraphDefinition> {
        self.0.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphDefinition> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extension point for the graphs of an entity type.
///
/// Both methods default to no-ops so an implementation only overrides the
/// alteration it cares about.
pub trait GraphAlter: Send + Sync {
    /// Adjust the graphs enabled for `entity_type_id`.
    fn alter_enabled_graphs(&self, _entity_type_id: &str, _graphs: &mut Vec<String>) {}

    /// Add, change or remove graph definitions of `entity_type_id`.
    fn alter_graph_definitions(&self, _entity_type_id: &str, _definitions: &mut GraphDefinitions) {}
}

/// Produces graph definitions per entity type, running registered hooks in
/// registration order.
#[derive(Default)]
pub struct GraphDefinitionRegistry {
    alters: Vec<Box<dyn GraphAlter>>,
}

impl GraphDefinitionRegistry {
    /// Create a registry with no hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook
    pub fn register(&mut self, alter: Box<dyn GraphAlter>) {
        self.alters.push(alter);
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.alters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alters.is_empty()
    }

    /// Graph definitions of `entity_type_id`, always built fresh.
    ///
    /// The `default` graph is always defined before hooks run, since there has
    /// to be at least one graph for entities to be saved in.
    pub fn graph_definitions(&self, entity_type_id: &str) -> GraphDefinitions {
        let mut definitions = GraphDefinitions::new();
        definitions.insert(GraphDefinition::new(
            DEFAULT_GRAPH,
            "Default",
            "The default graph used to store entities of this type.",
        ));
        for alter in &self.alters {
            alter.alter_graph_definitions(entity_type_id, &mut definitions);
        }
        definitions
    }

    /// Graphs enabled for `entity_type_id`, starting from `["default"]`.
    ///
    /// The result is returned as the hooks left it; the handler enforces the
    /// non-empty invariant.
    pub fn enabled_graphs(&self, entity_type_id: &str) -> Vec<String> {
        let mut graphs = vec![DEFAULT_GRAPH.to_string()];
        for alter in &self.alters {
            alter.alter_enabled_graphs(entity_type_id, &mut graphs);
        }
        graphs
    }
}

/// Hook built from the `[graphs]` configuration section.
///
/// Applies only to the configured entity type: adds its definitions and, when
/// given, replaces the enabled graph list.
pub struct ConfiguredGraphs {
    entity_type_id: String,
    enabled: Option<Vec<String>>,
    definitions: Vec<GraphDefinition>,
}

impl ConfiguredGraphs {
    pub fn new(
        entity_type_id: impl Into<String>,
        enabled: Option<Vec<String>>,
        definitions: Vec<GraphDefinition>,
    ) -> Self {
        Self {
            entity_type_id: entity_type_id.into(),
            enabled,
            definitions,
        }
    }
}

impl GraphAlter for ConfiguredGraphs {
    fn alter_enabled_graphs(&self, entity_type_id: &str, graphs: &mut Vec<String>) {
        if entity_type_id != self.entity_type_id {
            return;
        }
        if let Some(enabled) = &self.enabled {
            *graphs = enabled.clone();
        }
    }

    fn alter_graph_definitions(&self, entity_type_id: &str, definitions: &mut GraphDefinitions) {
        if entity_type_id != self.entity_type_id {
            return;
        }
        for definition in &self.definitions {
            definitions.insert(definition.clone());
        }
    }
}

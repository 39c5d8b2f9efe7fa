//! Per-request graph resolution for one entity type.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::Serialize;

use super::definition::{GraphDefinitionRegistry, GraphDefinitions, DEFAULT_GRAPH};
use crate::bundle::{BundleConfig, BundleStorage};
use crate::error::{RdfGraphError, Result};

/// An entity as seen by the save path.
pub trait GraphEntity {
    fn id(&self) -> &str;

    fn bundle(&self) -> &str;

    /// First non-empty value of the entity's `graph` field.
    fn graph(&self) -> Option<&str>;
}

/// Plain [`GraphEntity`] implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entity {
    pub id: String,
    pub bundle: String,
    pub graph: Vec<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>, bundle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bundle: bundle.into(),
            graph: Vec::new(),
        }
    }

    pub fn with_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = vec![graph.into()];
        self
    }
}

impl GraphEntity for Entity {
    fn id(&self) -> &str {
        &self.id
    }

    fn bundle(&self) -> &str {
        &self.bundle
    }

    fn graph(&self) -> Option<&str> {
        self.graph.first().map(String::as_str).filter(|g| !g.is_empty())
    }
}

/// A graph name and the URI it resolves to for one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphUri {
    pub name: String,
    pub uri: String,
}

/// Resolved graph URIs of one bundle, in requested graph order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleGraphUris {
    pub bundle: String,
    pub graphs: Vec<GraphUri>,
}

/// Decides which graphs an entity type is read from and written to.
///
/// One handler serves one request. It holds the enabled graphs (fixed at
/// construction), per-entity read overrides and the target graph of the next
/// save. Handlers must not be shared between concurrent requests.
pub struct GraphHandler {
    entity_type_id: String,
    registry: Arc<GraphDefinitionRegistry>,
    bundles: Arc<dyn BundleStorage>,
    enabled_graphs: Vec<String>,
    request_graphs: HashMap<String, Vec<String>>,
    target_graph: Option<String>,
}

impl GraphHandler {
    /// Create a handler, letting the registry hooks alter the enabled graphs.
    pub fn new(
        entity_type_id: impl Into<String>,
        registry: Arc<GraphDefinitionRegistry>,
        bundles: Arc<dyn BundleStorage>,
    ) -> Result<Self> {
        let entity_type_id = entity_type_id.into();
        let enabled_graphs = dedup(registry.enabled_graphs(&entity_type_id));
        if enabled_graphs.is_empty() {
            log::warn!("Graph hooks left no enabled graph for {}", entity_type_id);
            return Err(RdfGraphError::EmptyGraphSet);
        }

        let definitions = registry.graph_definitions(&entity_type_id);
        for name in enabled_graphs.iter().filter(|name| !definitions.contains(name)) {
            log::warn!("Enabled graph {} of {} has no definition", name, entity_type_id);
        }

        Ok(Self {
            entity_type_id,
            registry,
            bundles,
            enabled_graphs,
            request_graphs: HashMap::new(),
            target_graph: None,
        })
    }

    pub fn entity_type_id(&self) -> &str {
        &self.entity_type_id
    }

    /// All graphs enabled for the entity type. Never empty.
    pub fn entity_type_enabled_graphs(&self) -> &[String] {
        &self.enabled_graphs
    }

    pub fn graph_definitions(&self, entity_type_id: &str) -> GraphDefinitions {
        self.registry.graph_definitions(entity_type_id)
    }

    /// URI of `graph_name` for one bundle.
    pub fn bundle_graph_uri(&self, bundle_type: &str, bundle_id: &str, graph_name: &str) -> Result<String> {
        let bundle = self.load_bundle(bundle_type, bundle_id)?;
        graph_uri_from_settings(&bundle, graph_name)
    }

    /// URIs of every bundle of `bundle_type` for `graph_names`, or for the
    /// enabled graphs when `graph_names` is empty.
    pub fn entity_type_graph_uris(&self, bundle_type: &str, graph_names: &[&str]) -> Result<Vec<BundleGraphUris>> {
        let names = self.names_or_enabled(graph_names);
        self.bundles
            .load_multiple(bundle_type)?
            .iter()
            .map(|bundle| resolve_bundle(bundle, &names))
            .collect()
    }

    /// Flattened [`GraphHandler::entity_type_graph_uris`]: bundle order first,
    /// then graph order. Duplicate URIs are kept.
    pub fn entity_type_graph_uris_list(&self, bundle_type: &str, graph_names: &[&str]) -> Result<Vec<String>> {
        Ok(self
            .entity_type_graph_uris(bundle_type, graph_names)?
            .into_iter()
            .flat_map(|bundle| bundle.graphs.into_iter().map(|graph| graph.uri))
            .collect())
    }

    /// Name of the enabled graph whose URI for `bundle_id` is `graph_uri`.
    pub fn bundle_graph_id(&self, bundle_type: &str, bundle_id: &str, graph_uri: &str) -> Result<Option<String>> {
        let bundle = self.load_bundle(bundle_type, bundle_id)?;
        let names = self.names_or_enabled(&[]);
        let resolved = resolve_bundle(&bundle, &names)?;
        Ok(resolved
            .graphs
            .into_iter()
            .find(|graph| graph.uri == graph_uri)
            .map(|graph| graph.name))
    }

    /// Forget every per-entity read override.
    pub fn reset_request_graphs(&mut self) {
        self.request_graphs.clear();
    }

    /// Graphs `entity_id` is read from. Defaults to the enabled graphs.
    pub fn request_graphs(&mut self, entity_id: &str) -> &[String] {
        let enabled = &self.enabled_graphs;
        self.request_graphs.entry(entity_id.to_string()).or_insert_with(|| {
            log::debug!("Request graphs of {} default to {:?}", entity_id, enabled);
            enabled.clone()
        })
    }

    /// Restrict the graphs `entity_id` is read from.
    ///
    /// Every name must be defined for `entity_type_id`. Duplicates are dropped,
    /// keeping first occurrence order, and any previous value is replaced.
    pub fn set_request_graphs(&mut self, entity_id: &str, entity_type_id: &str, graph_names: &[&str]) -> Result<()> {
        let definitions = self.graph_definitions(entity_type_id);
        if let Some(unknown) = graph_names.iter().find(|name| !definitions.contains(name)) {
            return Err(RdfGraphError::UnknownGraphName {
                name: unknown.to_string(),
            });
        }

        let graphs = dedup(graph_names.iter().map(|name| name.to_string()));
        if graphs.is_empty() {
            return Err(RdfGraphError::EmptyGraphSet);
        }
        self.request_graphs.insert(entity_id.to_string(), graphs);
        Ok(())
    }

    pub fn target_graph(&self) -> Option<&str> {
        self.target_graph.as_deref()
    }

    /// Force the next save into `graph_name`. Stays set until cleared.
    pub fn set_target_graph(&mut self, graph_name: &str) -> Result<()> {
        if !self.graph_definitions(&self.entity_type_id).contains(graph_name) {
            return Err(RdfGraphError::UnknownGraphName {
                name: graph_name.to_string(),
            });
        }
        self.target_graph = Some(graph_name.to_string());
        Ok(())
    }

    pub fn clear_target_graph(&mut self) {
        self.target_graph = None;
    }

    /// Graph the entity is saved in.
    ///
    /// In order: the explicit target graph, the entity's own graph value,
    /// `default` when enabled, the first enabled graph.
    pub fn target_graph_from_entity(&self, entity: &dyn GraphEntity) -> String {
        if let Some(target) = &self.target_graph {
            log::debug!("Saving {} into explicit target graph {}", entity.id(), target);
            return target.clone();
        }
        if let Some(graph) = entity.graph() {
            log::debug!("Saving {} into its own graph {}", entity.id(), graph);
            return graph.to_string();
        }
        if self.enabled_graphs.iter().any(|g| g == DEFAULT_GRAPH) {
            return DEFAULT_GRAPH.to_string();
        }
        self.enabled_graphs
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_GRAPH.to_string())
    }

    /// Borrow the handler for one top-level entity load.
    ///
    /// Request graph overrides made through the scope are reset when it is
    /// dropped, so they cannot leak into the next unrelated load.
    pub fn load_scope(&mut self) -> LoadScope<'_> {
        LoadScope { handler: self }
    }

    fn load_bundle(&self, bundle_type: &str, bundle_id: &str) -> Result<BundleConfig> {
        self.bundles
            .load(bundle_type, bundle_id)?
            .ok_or_else(|| RdfGraphError::BundleNotFound {
                bundle_type: bundle_type.to_string(),
                bundle: bundle_id.to_string(),
            })
    }

    fn names_or_enabled<'a>(&'a self, graph_names: &[&'a str]) -> Vec<&'a str> {
        if graph_names.is_empty() {
            self.enabled_graphs.iter().map(String::as_str).collect()
        } else {
            graph_names.to_vec()
        }
    }
}

/// Guard returned by [`GraphHandler::load_scope`].
pub struct LoadScope<'a> {
    handler: &'a mut GraphHandler,
}

impl Deref for LoadScope<'_> {
    type Target = GraphHandler;

    fn deref(&self) -> &GraphHandler {
        &*self.handler
    }
}

impl DerefMut for LoadScope<'_> {
    fn deref_mut(&mut self) -> &mut GraphHandler {
        &mut *self.handler
    }
}

impl Drop for LoadScope<'_> {
    fn drop(&mut self) {
        self.handler.reset_request_graphs();
    }
}

fn graph_uri_from_settings(bundle: &BundleConfig, graph_name: &str) -> Result<String> {
    bundle
        .graph_uri(graph_name)
        .map(str::to_string)
        .ok_or_else(|| RdfGraphError::MissingBundleGraphConfiguration {
            graph: graph_name.to_string(),
            bundle: bundle.id.clone(),
        })
}

fn resolve_bundle(bundle: &BundleConfig, graph_names: &[&str]) -> Result<BundleGraphUris> {
    let graphs = graph_names
        .iter()
        .map(|name| {
            Ok(GraphUri {
                name: name.to_string(),
                uri: graph_uri_from_settings(bundle, name)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(BundleGraphUris {
        bundle: bundle.id.clone(),
        graphs,
    })
}

/// Drop repeated names, keeping the first occurrence.
fn dedup<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::MemoryBundleStorage;
    use crate::graph::{ConfiguredGraphs, GraphAlter, GraphDefinition};

    const ENTITY_TYPE: &str = "rdf_entity";
    const BUNDLE_TYPE: &str = "rdf_type";

    fn definitions() -> Vec<GraphDefinition> {
        vec![
            GraphDefinition::new("draft", "Draft", ""),
            GraphDefinition::new("g1", "G1", ""),
            GraphDefinition::new("g2", "G2", ""),
        ]
    }

    fn registry(enabled: Option<Vec<&str>>) -> Arc<GraphDefinitionRegistry> {
        let mut registry = GraphDefinitionRegistry::new();
        registry.register(Box::new(ConfiguredGraphs::new(
            ENTITY_TYPE,
            enabled.map(|names| names.iter().map(|n| n.to_string()).collect()),
            definitions(),
        )));
        Arc::new(registry)
    }

    fn storage() -> Arc<dyn BundleStorage> {
        let bundles = vec![
            BundleConfig::new("news", "News")
                .with_graph_uri("default", "http://example.org/shared")
                .with_graph_uri("draft", "http://example.org/news/draft"),
            BundleConfig::new("article", "Article")
                .with_graph_uri("default", "http://example.org/shared")
                .with_graph_uri("draft", "http://example.org/article/draft"),
            BundleConfig::new("page", "Page")
                .with_graph_uri("default", "http://example.org/page"),
        ];
        Arc::new(MemoryBundleStorage::with_bundles(BUNDLE_TYPE, bundles).unwrap())
    }

    fn handler(enabled: Option<Vec<&str>>) -> GraphHandler {
        GraphHandler::new(ENTITY_TYPE, registry(enabled), storage()).unwrap()
    }

    #[test]
    fn test_enabled_graphs_default() {
        let handler = handler(None);
        assert_eq!(handler.entity_type_enabled_graphs(), ["default".to_string()]);
    }

    #[test]
    fn test_enabled_graphs_deduplicated() {
        let handler = handler(Some(vec!["draft", "default", "draft"]));
        assert_eq!(handler.entity_type_enabled_graphs(), ["draft".to_string(), "default".to_string()]);
    }

    #[test]
    fn test_empty_enabled_graphs_rejected() {
        let result = GraphHandler::new(ENTITY_TYPE, registry(Some(vec![])), storage());
        assert!(matches!(result, Err(RdfGraphError::EmptyGraphSet)));
    }

    #[test]
    fn test_hooks_run_without_registrations() {
        let handler = GraphHandler::new("node", Arc::new(GraphDefinitionRegistry::new()), storage()).unwrap();
        assert_eq!(handler.entity_type_enabled_graphs(), ["default".to_string()]);
        assert_eq!(handler.graph_definitions("node").len(), 1);
    }

    #[test]
    fn test_bundle_graph_uri() {
        let handler = handler(None);
        assert_eq!(
            handler.bundle_graph_uri(BUNDLE_TYPE, "news", "draft").unwrap(),
            "http://example.org/news/draft"
        );

        let err = handler.bundle_graph_uri(BUNDLE_TYPE, "page", "draft").unwrap_err();
        assert!(matches!(err, RdfGraphError::MissingBundleGraphConfiguration { .. }));
        let msg = err.to_string();
        assert!(msg.contains("draft") && msg.contains("page"));

        let err = handler.bundle_graph_uri(BUNDLE_TYPE, "missing", "default").unwrap_err();
        assert!(matches!(err, RdfGraphError::BundleNotFound { .. }));
    }

    #[test]
    fn test_entity_type_graph_uris_defaults_to_enabled() {
        let handler = handler(None);
        let uris = handler.entity_type_graph_uris(BUNDLE_TYPE, &[]).unwrap();
        let bundles: Vec<_> = uris.iter().map(|b| b.bundle.as_str()).collect();
        assert_eq!(bundles, vec!["article", "news", "page"]);
        assert!(uris.iter().all(|b| b.graphs.len() == 1 && b.graphs[0].name == "default"));
    }

    #[test]
    fn test_entity_type_graph_uris_propagates_missing() {
        let handler = handler(None);
        let err = handler.entity_type_graph_uris(BUNDLE_TYPE, &["default", "draft"]).unwrap_err();
        assert!(matches!(err, RdfGraphError::MissingBundleGraphConfiguration { ref bundle, .. } if bundle == "page"));
    }

    #[test]
    fn test_graph_uris_list_order_and_duplicates() {
        let storage: Arc<dyn BundleStorage> = Arc::new(
            MemoryBundleStorage::with_bundles(
                BUNDLE_TYPE,
                vec![
                    BundleConfig::new("article", "Article")
                        .with_graph_uri("default", "http://example.org/shared")
                        .with_graph_uri("draft", "http://example.org/article/draft"),
                    BundleConfig::new("news", "News")
                        .with_graph_uri("default", "http://example.org/shared")
                        .with_graph_uri("draft", "http://example.org/news/draft"),
                ],
            )
            .unwrap(),
        );
        let handler = GraphHandler::new(ENTITY_TYPE, registry(None), storage).unwrap();
        let list = handler
            .entity_type_graph_uris_list(BUNDLE_TYPE, &["draft", "default"])
            .unwrap();
        assert_eq!(
            list,
            vec![
                "http://example.org/article/draft",
                "http://example.org/shared",
                "http://example.org/news/draft",
                "http://example.org/shared",
            ]
        );
    }

    #[test]
    fn test_bundle_graph_id() {
        let handler = handler(Some(vec!["default", "draft"]));
        assert_eq!(
            handler
                .bundle_graph_id(BUNDLE_TYPE, "news", "http://example.org/news/draft")
                .unwrap(),
            Some("draft".to_string())
        );
        assert_eq!(
            handler
                .bundle_graph_id(BUNDLE_TYPE, "news", "http://example.org/nope")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_request_graphs_lazy_default() {
        let mut handler = handler(Some(vec!["default", "draft"]));
        assert_eq!(
            handler.request_graphs("http://example.org/e/1"),
            ["default".to_string(), "draft".to_string()]
        );
    }

    #[test]
    fn test_set_request_graphs_validation() {
        let mut handler = handler(None);
        let err = handler.set_request_graphs("e1", ENTITY_TYPE, &[]).unwrap_err();
        assert!(matches!(err, RdfGraphError::EmptyGraphSet));

        let err = handler.set_request_graphs("e1", ENTITY_TYPE, &["bogus"]).unwrap_err();
        assert!(matches!(err, RdfGraphError::UnknownGraphName { ref name } if name == "bogus"));

        // Unknown name anywhere fails the whole call
        let err = handler.set_request_graphs("e1", ENTITY_TYPE, &["g1", "bogus"]).unwrap_err();
        assert!(matches!(err, RdfGraphError::UnknownGraphName { .. }));
        assert_eq!(handler.request_graphs("e1"), ["default".to_string()]);
    }

    #[test]
    fn test_set_request_graphs_dedup_and_replace() {
        let mut handler = handler(None);
        handler.set_request_graphs("e1", ENTITY_TYPE, &["g1", "g2", "g1"]).unwrap();
        assert_eq!(handler.request_graphs("e1"), ["g1".to_string(), "g2".to_string()]);

        handler.set_request_graphs("e1", ENTITY_TYPE, &["draft"]).unwrap();
        assert_eq!(handler.request_graphs("e1"), ["draft".to_string()]);

        // Other entities are unaffected
        assert_eq!(handler.request_graphs("e2"), ["default".to_string()]);
    }

    #[test]
    fn test_reset_request_graphs() {
        let mut handler = handler(None);
        handler.set_request_graphs("e1", ENTITY_TYPE, &["g1"]).unwrap();
        handler.reset_request_graphs();
        assert_eq!(handler.request_graphs("e1"), ["default".to_string()]);
    }

    #[test]
    fn test_load_scope_resets_on_drop() {
        let mut handler = handler(None);
        {
            let mut scope = handler.load_scope();
            scope.set_request_graphs("e1", ENTITY_TYPE, &["draft"]).unwrap();
            assert_eq!(scope.request_graphs("e1"), ["draft".to_string()]);
        }
        assert_eq!(handler.request_graphs("e1"), ["default".to_string()]);
    }

    #[test]
    fn test_target_graph_slot() {
        let mut handler = handler(None);
        assert_eq!(handler.target_graph(), None);
        handler.set_target_graph("draft").unwrap();
        assert_eq!(handler.target_graph(), Some("draft"));
        assert!(matches!(
            handler.set_target_graph("bogus"),
            Err(RdfGraphError::UnknownGraphName { .. })
        ));
        assert_eq!(handler.target_graph(), Some("draft"));
        handler.clear_target_graph();
        assert_eq!(handler.target_graph(), None);
    }

    #[test]
    fn test_target_graph_priority() {
        let entity = Entity::new("e1", "news").with_graph("g2");

        let mut handler = handler(Some(vec!["g1", "default"]));
        handler.set_target_graph("g1").unwrap();
        assert_eq!(handler.target_graph_from_entity(&entity), "g1");

        handler.clear_target_graph();
        assert_eq!(handler.target_graph_from_entity(&entity), "g2");

        let bare = Entity::new("e2", "news");
        assert_eq!(handler.target_graph_from_entity(&bare), "default");

        let handler = self::handler(Some(vec!["g2", "g1"]));
        assert_eq!(handler.target_graph_from_entity(&bare), "g2");
    }

    #[test]
    fn test_empty_entity_graph_ignored() {
        let handler = handler(None);
        let entity = Entity::new("e1", "news").with_graph("");
        assert_eq!(handler.target_graph_from_entity(&entity), "default");
    }

    struct AddPublished;

    impl GraphAlter for AddPublished {
        fn alter_enabled_graphs(&self, _entity_type_id: &str, graphs: &mut Vec<String>) {
            graphs.push("published".to_string());
        }
    }

    #[test]
    fn test_enabled_graph_without_definition_is_kept() {
        let mut registry = GraphDefinitionRegistry::new();
        registry.register(Box::new(AddPublished));
        let handler = GraphHandler::new(ENTITY_TYPE, Arc::new(registry), storage()).unwrap();
        assert_eq!(
            handler.entity_type_enabled_graphs(),
            ["default".to_string(), "published".to_string()]
        );
    }
}

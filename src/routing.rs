//! Storage-side glue: turns graph handler decisions into graph URIs and the
//! dataset clauses a query or update is built with.

use crate::error::Result;
use crate::graph::{GraphEntity, GraphHandler};
use crate::sparql;

/// Routes the reads and writes of one bundle type through a [`GraphHandler`].
pub struct GraphRouter<'a> {
    handler: &'a mut GraphHandler,
    bundle_type: String,
}

impl<'a> GraphRouter<'a> {
    pub fn new(handler: &'a mut GraphHandler, bundle_type: impl Into<String>) -> Self {
        Self {
            handler,
            bundle_type: bundle_type.into(),
        }
    }

    pub fn handler(&mut self) -> &mut GraphHandler {
        &mut *self.handler
    }

    /// URIs of the graphs `entity_id` of `bundle` is read from.
    pub fn read_graph_uris(&mut self, entity_id: &str, bundle: &str) -> Result<Vec<String>> {
        let names = self.handler.request_graphs(entity_id).to_vec();
        names
            .iter()
            .map(|name| self.handler.bundle_graph_uri(&self.bundle_type, bundle, name))
            .collect()
    }

    /// URIs an entity query over every bundle runs against, without repeats.
    pub fn query_graph_uris(&self, graph_names: &[&str]) -> Result<Vec<String>> {
        let mut uris: Vec<String> = Vec::new();
        for uri in self
            .handler
            .entity_type_graph_uris_list(&self.bundle_type, graph_names)?
        {
            if !uris.contains(&uri) {
                uris.push(uri);
            }
        }
        Ok(uris)
    }

    /// URI of the graph `entity` is saved in.
    pub fn save_graph_uri(&self, entity: &dyn GraphEntity) -> Result<String> {
        let graph = self.handler.target_graph_from_entity(entity);
        self.handler
            .bundle_graph_uri(&self.bundle_type, entity.bundle(), &graph)
    }
}

/// One `FROM <uri>` line per graph.
pub fn from_clauses<I, S>(uris: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    sparql::to_resource_uris(uris)
        .into_iter()
        .map(|uri| format!("FROM {}", uri))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap `body` in a `GRAPH <uri> { ... }` block.
pub fn graph_clause(uri: &str, body: &str) -> String {
    format!("GRAPH {} {{\n{}\n}}", sparql::uri(uri), body)
}

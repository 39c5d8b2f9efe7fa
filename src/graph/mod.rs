//! Named graph resolution.
//!
//! Maps an entity type, a bundle and a graph name to the graph URI entities are
//! read from and written to, and tracks the per-request overrides of that
//! mapping.

mod definition;
mod handler;

pub use definition::{
    is_machine_name, ConfiguredGraphs, GraphAlter, GraphDefinition, GraphDefinitionRegistry,
    GraphDefinitions, DEFAULT_GRAPH,
};
pub use handler::{BundleGraphUris, Entity, GraphEntity, GraphHandler, GraphUri, LoadScope};

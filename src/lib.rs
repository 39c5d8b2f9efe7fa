pub mod config;
pub mod error;
pub mod bundle;
pub mod graph;
pub mod routing;
pub mod sparql;

pub use config::Config;
pub use error::{RdfGraphError, Result};
pub use bundle::{BundleConfig, BundleStorage};
pub use graph::{Entity, GraphDefinitionRegistry, GraphEntity, GraphHandler};
pub use routing::GraphRouter;

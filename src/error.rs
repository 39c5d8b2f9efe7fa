use thiserror::Error;

/// Main error type for RdfGraph
#[derive(Error, Debug)]
pub enum RdfGraphError {
    /// A request or target graph name has no graph definition
    #[error("Unknown graph type {name}")]
    UnknownGraphName { name: String },

    /// A graph set ended up empty after validation
    #[error("There must be at least one active graph")]
    EmptyGraphSet,

    /// No URI is configured for a bundle/graph pair
    #[error("Unable to determine graph {graph} for bundle {bundle}")]
    MissingBundleGraphConfiguration { graph: String, bundle: String },

    /// Bundle configuration entity does not exist
    #[error("Bundle {bundle} of type {bundle_type} not found")]
    BundleNotFound { bundle_type: String, bundle: String },

    /// Malformed URI where a well-formed absolute URI was required
    #[error("Invalid resource URI: {0}")]
    InvalidResourceUri(String),

    /// Malformed literal language tag
    #[error("Invalid language tag: {0}")]
    InvalidLanguageTag(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Exported bundle configuration could not be (de)serialized
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Stored setting value could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient Result type using RdfGraphError
pub type Result<T> = std::result::Result<T, RdfGraphError>;

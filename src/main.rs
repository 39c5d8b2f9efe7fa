use anyhow::Result;
use clap::{Parser, Subcommand};
use rdfgraph::sparql::{self, ValueFormat};
use rdfgraph::{BundleStorage, Config, GraphHandler};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "rdfgraph")]
#[command(about = "Inspect named graph configuration of RDF entity bundles")]
struct Args {
    /// Configuration file (defaults to RDFGRAPH_CONFIG or ./config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List enabled graphs and graph definitions
    Graphs,
    /// Print the graph URIs of every bundle
    Uris {
        /// Graph name to resolve (repeatable, defaults to the enabled graphs)
        #[arg(short, long = "graph")]
        graphs: Vec<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Find the graph name a bundle maps to a URI
    Lookup { bundle: String, uri: String },
    /// Print a value escaped as a SPARQL argument
    Escape {
        value: String,
        /// Serialize as a URI instead of a literal
        #[arg(long, conflicts_with = "lang")]
        uri: bool,
        /// Language tag of the literal
        #[arg(long)]
        lang: Option<String>,
    },
    /// Validate every stored bundle against the enabled graphs
    Check,
}

/// Everything a configured command needs
struct Session {
    config: Config,
    storage: Arc<dyn BundleStorage>,
    handler: GraphHandler,
}

fn open_session(config_path: Option<&Path>) -> Result<Session> {
    let config = match config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.rdfgraph.log_level.as_str())
    ).init();
    log::debug!("Entity type: {}, bundle type: {}", config.entity_type(), config.bundle_type());

    let registry = Arc::new(config.registry());
    let storage = config.open_storage()?;
    let handler = config.handler(registry, storage.clone())?;
    Ok(Session { config, storage, handler })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.as_deref();

    match args.command {
        Command::Escape { value, uri, lang } => {
            let format = if uri { ValueFormat::Uri } else { ValueFormat::Literal };
            println!("{}", sparql::serialize_value(&value, format, lang.as_deref())?);
        }
        Command::Graphs => {
            let Session { config, handler, .. } = open_session(config_path)?;
            println!("Entity type: {}", handler.entity_type_id());
            println!("Enabled graphs: {}", handler.entity_type_enabled_graphs().join(", "));
            println!("\n{:<20} {:<20} {}", "Name", "Title", "Description");
            println!("{:-<80}", "");
            for definition in handler.graph_definitions(config.entity_type()).iter() {
                println!("{:<20} {:<20} {}", definition.name, definition.title, definition.description);
            }
        }
        Command::Uris { graphs, json } => {
            let Session { config, handler, .. } = open_session(config_path)?;
            let names: Vec<&str> = graphs.iter().map(String::as_str).collect();
            let uris = handler.entity_type_graph_uris(config.bundle_type(), &names)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&uris)?);
            } else {
                println!("{:<20} {:<15} {}", "Bundle", "Graph", "URI");
                println!("{:-<80}", "");
                for bundle in &uris {
                    for graph in &bundle.graphs {
                        println!("{:<20} {:<15} {}", bundle.bundle, graph.name, graph.uri);
                    }
                }
            }
        }
        Command::Lookup { bundle, uri } => {
            let Session { config, handler, .. } = open_session(config_path)?;
            match handler.bundle_graph_id(config.bundle_type(), &bundle, &uri)? {
                Some(name) => println!("{}", name),
                None => anyhow::bail!("No enabled graph of bundle {} has URI {}", bundle, uri),
            }
        }
        Command::Check => {
            let Session { config, storage, handler } = open_session(config_path)?;
            let bundles = storage.load_multiple(config.bundle_type())?;
            let mut problems = 0;
            for bundle in &bundles {
                if let Err(e) = bundle.validate() {
                    log::error!("{}", e);
                    problems += 1;
                    continue;
                }
                for graph in handler.entity_type_enabled_graphs() {
                    if let Err(e) = handler.bundle_graph_uri(config.bundle_type(), &bundle.id, graph) {
                        log::error!("{}", e);
                        problems += 1;
                    }
                }
            }
            if problems > 0 {
                anyhow::bail!("{} problem(s) found in {} bundle(s)", problems, bundles.len());
            }
            log::info!("✓ {} bundle(s) configured for every enabled graph", bundles.len());
        }
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use tcmkg_core::{
    import, Attributes, GraphStore, PluginRegistry, Resource, StoreConfig, TermTableStandardizer,
    TrimStandardizer,
};
use tracing_subscriber::EnvFilter;

mod shell;

/// tcmkg - curate a traditional Chinese medicine knowledge graph
#[derive(Parser)]
#[command(name = "tcmkg")]
#[command(version)] // Auto-pull version from Cargo.toml
#[command(about = "Edit a JSON-backed knowledge graph of nodes and typed relationships", long_about = None)]
struct Cli {
    /// Graph file to open
    #[arg(short, long, env = "TCMKG_GRAPH", global = true)]
    graph: Option<PathBuf>,

    /// JSON config file (path, history_capacity, flush)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Undo/redo depth
    #[arg(long, global = true)]
    history: Option<usize>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Store(StoreCommand),
    /// Interactive session reading commands from stdin (supports undo/redo)
    Shell,
}

/// Commands shared by the one-shot CLI and the interactive shell
#[derive(Subcommand)]
pub(crate) enum StoreCommand {
    /// Node operations
    #[command(subcommand)]
    Node(NodeCommand),
    /// Relationship operations
    #[command(subcommand)]
    Rel(RelCommand),
    /// Print every node and relationship
    List {
        #[arg(long)]
        json: bool,
    },
    /// Size, connectivity, and per-node degrees
    Stats,
    /// Weakly connected components
    Components,
    /// Write the JSON-LD projection of the graph
    ExportJsonld { out: PathBuf },
    /// Import a graph JSON file, or every JSON file under a directory
    Import { path: PathBuf },
    /// Standardize node names (trim, or map through a term table)
    Standardize {
        /// JSON object of {"alias": "canonical"}
        #[arg(long)]
        terms: Option<PathBuf>,
    },
    /// Plugin operations
    #[command(subcommand)]
    Plugin(PluginCommand),
}

#[derive(Args)]
pub(crate) struct AttrArgs {
    /// Attributes as a JSON object
    #[arg(long)]
    attrs: Option<String>,
    /// Single attribute as key=value (value parsed as JSON when possible)
    #[arg(short = 'a', long = "attr")]
    attr: Vec<String>,
}

#[derive(Subcommand)]
pub(crate) enum NodeCommand {
    /// Add a node, or update type and attributes of an existing one
    Add {
        name: String,
        #[arg(short = 't', long = "type")]
        node_type: String,
        #[command(flatten)]
        attrs: AttrArgs,
    },
    /// Replace type and attributes of an existing node
    Edit {
        name: String,
        #[arg(short = 't', long = "type")]
        node_type: String,
        #[command(flatten)]
        attrs: AttrArgs,
    },
    /// Delete a node and its relationships
    Delete { name: String },
    /// Show one node with its degree and neighbours
    Show { name: String },
    /// Rename a node, keeping its relationships
    Rename { old: String, new: String },
    /// Attach a resource (image, document, ...)
    Attach {
        name: String,
        path: String,
        #[arg(long, default_value = "Image")]
        kind: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum RelCommand {
    /// Link two existing nodes
    Add {
        source: String,
        target: String,
        relation_type: String,
    },
    /// Change the relation type of an existing relationship
    Edit {
        source: String,
        target: String,
        relation_type: String,
    },
    /// Remove a relationship
    Delete { source: String, target: String },
    /// Attach a resource to a relationship
    Attach {
        source: String,
        target: String,
        path: String,
        #[arg(long, default_value = "Image")]
        kind: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum PluginCommand {
    /// List registered plugins
    List,
    /// Run a plugin by name
    Run { name: String },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(graph) = &cli.graph {
        config.path = graph.clone();
    }
    if let Some(history) = cli.history {
        config.history_capacity = history;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(&cli)?;
    let mut store = GraphStore::open_with(config);
    let mut plugins = PluginRegistry::with_builtins();

    match cli.command {
        Command::Store(command) => execute(&mut store, &mut plugins, command)?,
        Command::Shell => shell::run(&mut store, &mut plugins)?,
    }

    // read-only commands leave no file behind
    if store.is_dirty() {
        store.close().context("saving graph on exit")?;
    }
    Ok(())
}

pub(crate) fn parse_attributes(args: &AttrArgs) -> anyhow::Result<Attributes> {
    let mut attributes = match &args.attrs {
        Some(text) => serde_json::from_str(text).context("--attrs must be a JSON object")?,
        None => Attributes::new(),
    };
    for pair in &args.attr {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("attribute '{pair}' is not key=value");
        };
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        attributes.insert(key.trim().to_string(), value);
    }
    Ok(attributes)
}

/// Run one store command, printing its result to stdout
pub(crate) fn execute(
    store: &mut GraphStore,
    plugins: &mut PluginRegistry,
    command: StoreCommand,
) -> anyhow::Result<()> {
    match command {
        StoreCommand::Node(cmd) => execute_node(store, cmd)?,
        StoreCommand::Rel(cmd) => execute_rel(store, cmd)?,
        StoreCommand::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&store.get_graph_data())?);
            } else {
                for node in store.get_all_nodes() {
                    println!(
                        "{} [{}] {}",
                        node.name,
                        node.node_type,
                        serde_json::Value::Object(node.attributes)
                    );
                }
                for rel in store.get_all_relationships() {
                    println!("{} -[{}]-> {}", rel.source, rel.relation_type, rel.target);
                }
            }
        }
        StoreCommand::Stats => {
            let stats = store.stats();
            println!(
                "{} nodes, {} relationships, {} components ({} isolated)",
                stats.nodes, stats.edges, stats.components, stats.isolated
            );
            for (name, degree) in store.degree_distribution() {
                println!(
                    "  {name}: in {} out {} total {}",
                    degree.in_degree, degree.out_degree, degree.total
                );
            }
        }
        StoreCommand::Components => {
            for (i, group) in store.weakly_connected_components().iter().enumerate() {
                println!("{}: {}", i + 1, group.join(", "));
            }
        }
        StoreCommand::ExportJsonld { out } => {
            store.export_jsonld(&out)?;
            println!("wrote {}", out.display());
        }
        StoreCommand::Import { path } => {
            let report = if path.is_dir() {
                import::import_directory(store, &path)?
            } else {
                import::import_file(store, &path)?
            };
            println!(
                "imported {} file(s): {} nodes, {} relationships, {} resources",
                report.files, report.nodes, report.relationships, report.resources
            );
            for skipped in &report.skipped_relationships {
                println!("  skipped relationship {skipped}");
            }
            for (file, reason) in &report.failed_files {
                println!("  failed {}: {reason}", file.display());
            }
        }
        StoreCommand::Standardize { terms } => {
            let renamed = match terms {
                Some(path) => store.auto_standardize(&TermTableStandardizer::from_file(&path)?)?,
                None => store.auto_standardize(&TrimStandardizer)?,
            };
            for (old, new) in &renamed {
                println!("{old:?} -> {new:?}");
            }
            println!("{} node(s) renamed", renamed.len());
        }
        StoreCommand::Plugin(PluginCommand::List) => {
            for info in plugins.list() {
                let state = if info.enabled { "enabled" } else { "disabled" };
                println!("{} ({state}) {}", info.name, info.description);
            }
        }
        StoreCommand::Plugin(PluginCommand::Run { name }) => {
            println!("{}", plugins.run(&name, store)?);
        }
    }
    Ok(())
}

fn execute_node(store: &mut GraphStore, command: NodeCommand) -> anyhow::Result<()> {
    match command {
        NodeCommand::Add {
            name,
            node_type,
            attrs,
        } => {
            let attributes = parse_attributes(&attrs)?;
            store.add_or_update_node(&name, &node_type, attributes)?;
        }
        NodeCommand::Edit {
            name,
            node_type,
            attrs,
        } => {
            let attributes = parse_attributes(&attrs)?;
            store.edit_node(&name, &node_type, attributes)?;
        }
        NodeCommand::Delete { name } => store.delete_node(&name)?,
        NodeCommand::Show { name } => {
            let Some(node) = store.get_node(&name) else {
                bail!("node '{name}' does not exist");
            };
            println!("{}", serde_json::to_string_pretty(&node)?);
            if let Some(degree) = store.node_degree(&name) {
                println!(
                    "degree: in {} out {} total {}",
                    degree.in_degree, degree.out_degree, degree.total
                );
            }
            if let Some(neighbors) = store.connected_nodes(&name) {
                println!("predecessors: {}", neighbors.predecessors.join(", "));
                println!("successors: {}", neighbors.successors.join(", "));
            }
        }
        NodeCommand::Rename { old, new } => store.rename_node(&old, &new)?,
        NodeCommand::Attach { name, path, kind } => {
            store.attach_node_resource(&name, Resource::new(path, kind))?
        }
    }
    Ok(())
}

fn execute_rel(store: &mut GraphStore, command: RelCommand) -> anyhow::Result<()> {
    match command {
        RelCommand::Add {
            source,
            target,
            relation_type,
        } => store.add_relationship(&source, &target, &relation_type)?,
        RelCommand::Edit {
            source,
            target,
            relation_type,
        } => store.edit_relationship(&source, &target, &relation_type)?,
        RelCommand::Delete { source, target } => store.delete_relationship(&source, &target)?,
        RelCommand::Attach {
            source,
            target,
            path,
            kind,
        } => store.attach_relationship_resource(&source, &target, Resource::new(path, kind))?,
    }
    Ok(())
}

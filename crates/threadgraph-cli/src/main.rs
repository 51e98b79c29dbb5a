//! Threadgraph CLI - thread-aware knowledge graph memory

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use threadgraph_core::application::requests::{
    BulkUpdateItem, EntityInput, ObservationAddition, ObservationDeletion, PruneOptions,
    QueryFilters, RelationSpec, UpdateObservationParams,
};
use threadgraph_core::application::services::{
    CollaborationService, KnowledgeGraphManager, PruneService, QueryService,
};
use threadgraph_core::config::Config;
use threadgraph_core::domain::relations::RelationInverter;
use threadgraph_core::storage::{JsonlStorage, StorageAdapter};
use tracing::debug;

#[derive(Parser)]
#[command(name = "threadgraph")]
#[command(author, version, about = "Thread-aware knowledge graph memory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Memory directory (overrides config and THREADGRAPH_MEMORY_DIR)
    #[arg(long, global = true)]
    memory_dir: Option<PathBuf>,

    /// Thread the command acts in
    #[arg(short, long, global = true, default_value = "default")]
    thread: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and save entities with their relations (JSON array, or - for stdin)
    Save { payload: String },

    /// Append observations to entities of the thread
    AddObservations { payload: String },

    /// Delete entities of the thread and every relation touching them
    DeleteEntities {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Delete observations by content or id
    DeleteObservations { payload: String },

    /// Supersede an observation with new content
    UpdateObservation { payload: String },

    /// Create relations between existing entities
    CreateRelations { payload: String },

    /// Delete relations of the thread, or of every thread with --global
    DeleteRelations {
        payload: String,
        #[arg(long)]
        global: bool,
    },

    /// Case-insensitive search over names, types and observations
    Search { query: String },

    /// Open entities by exact name
    Open {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Filter by timestamp, confidence and importance ranges
    Query {
        #[arg(default_value = "{}")]
        payload: String,
    },

    /// Read the thread's graph above an importance floor
    Read {
        #[arg(long)]
        min_importance: Option<f64>,
    },

    /// Prune old or unimportant entities
    Prune {
        /// Drop entities last touched before this RFC 3339 timestamp
        #[arg(long)]
        older_than: Option<String>,
        /// Drop entities with importance below this
        #[arg(long)]
        importance_less_than: Option<f64>,
        /// Never keep fewer entities than this
        #[arg(long)]
        keep_min_entities: Option<usize>,
    },

    /// Update several entities of the thread at once
    BulkUpdate { payload: String },

    /// Flag an entity for review
    Flag { entity: String, reason: String },

    /// List entities flagged for review
    Flagged {
        /// Include every thread
        #[arg(long)]
        all: bool,
    },

    /// Summarize every thread
    Conversations,

    /// Show the version history of an observation
    History {
        entity: String,
        observation_id: String,
    },

    /// Show graph statistics
    Stats,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

/// Services wired over one memory directory
struct Services {
    manager: Arc<KnowledgeGraphManager>,
    query: QueryService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("threadgraph=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<threadgraph_core::Error>() {
            Some(core) => {
                eprintln!("Error [{}]: {}", core.code(), core);
                if let Some(suggestion) = core.suggestion() {
                    eprintln!("  Try: {}", suggestion);
                }
            }
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = match cli.command {
        Commands::Config { action } => return cmd_config(action),
        command => command,
    };

    let config = Config::load()?;
    let services = connect(&config, cli.memory_dir).await?;
    let thread = cli.thread.as_str();

    match command {
        Commands::Save { payload } => {
            let entities: Vec<EntityInput> = parse_payload(&payload, "entities")?;
            let response = services.manager.save_memory(thread, entities).await?;
            print_json(&response)?;
            if !response.success {
                return Err(anyhow!(
                    "save request failed validation with {} error(s)",
                    response.errors.len()
                ));
            }
        }

        Commands::AddObservations { payload } => {
            let additions: Vec<ObservationAddition> = parse_payload(&payload, "observations")?;
            print_json(&services.manager.add_observations(thread, additions).await?)?;
        }

        Commands::DeleteEntities { names } => {
            let deleted = services.manager.delete_entities(thread, &names).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }

        Commands::DeleteObservations { payload } => {
            let deletions: Vec<ObservationDeletion> = parse_payload(&payload, "deletions")?;
            let deleted = services.manager.delete_observations(thread, deletions).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }

        Commands::UpdateObservation { payload } => {
            let params: UpdateObservationParams = parse_payload(&payload, "update")?;
            print_json(&services.manager.update_observation(params).await?)?;
        }

        Commands::CreateRelations { payload } => {
            let relations: Vec<RelationSpec> = parse_payload(&payload, "relations")?;
            print_json(&services.manager.create_relations(thread, relations).await?)?;
        }

        Commands::DeleteRelations { payload, global } => {
            let relations: Vec<RelationSpec> = parse_payload(&payload, "relations")?;
            let deleted = if global {
                services.manager.delete_relations_global(&relations).await?
            } else {
                services
                    .manager
                    .delete_relations_in_thread(thread, &relations)
                    .await?
            };
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }

        Commands::Search { query } => {
            print_json(&services.query.search_nodes(&query).await?)?;
        }

        Commands::Open { names } => {
            print_json(&services.query.open_nodes(&names).await?)?;
        }

        Commands::Query { payload } => {
            let filters: QueryFilters = parse_payload(&payload, "filters")?;
            print_json(&services.query.query_nodes(&filters).await?)?;
        }

        Commands::Read { min_importance } => {
            print_json(&services.query.read_graph(thread, min_importance).await?)?;
        }

        Commands::Prune {
            older_than,
            importance_less_than,
            keep_min_entities,
        } => {
            let options = PruneOptions {
                older_than,
                importance_less_than,
                keep_min_entities,
            };
            let prune = PruneService::new(services.manager.clone());
            print_json(&prune.prune_memory(&options).await?)?;
        }

        Commands::BulkUpdate { payload } => {
            let items: Vec<BulkUpdateItem> = parse_payload(&payload, "updates")?;
            print_json(&services.manager.bulk_update(thread, items).await?)?;
        }

        Commands::Flag { entity, reason } => {
            let collaboration = CollaborationService::new(services.manager.clone());
            let flagged = collaboration.flag_for_review(thread, &entity, &reason).await?;
            print_json(&serde_json::json!({ "entity": entity, "flagged": flagged }))?;
        }

        Commands::Flagged { all } => {
            let collaboration = CollaborationService::new(services.manager.clone());
            let scope = (!all).then_some(thread);
            print_json(&collaboration.get_flagged_entities(scope).await?)?;
        }

        Commands::Conversations => {
            let collaboration = CollaborationService::new(services.manager.clone());
            print_json(&collaboration.list_conversations().await?)?;
        }

        Commands::History {
            entity,
            observation_id,
        } => {
            print_json(
                &services
                    .manager
                    .observation_history(&entity, &observation_id)
                    .await?,
            )?;
        }

        Commands::Stats => {
            print_json(&services.manager.load().await?.stats())?;
        }

        Commands::Config { action } => cmd_config(action)?,
    }

    Ok(())
}

async fn connect(config: &Config, memory_dir: Option<PathBuf>) -> anyhow::Result<Services> {
    let dir = match memory_dir {
        Some(dir) => dir,
        None => config.memory_dir()?,
    };
    debug!(memory_dir = %dir.display(), "Opening memory directory");

    let storage: Arc<dyn StorageAdapter> = Arc::new(JsonlStorage::new(dir.clone()));
    storage
        .initialize()
        .await
        .with_context(|| format!("Failed to initialize memory directory: {}", dir.display()))?;

    let manager = Arc::new(KnowledgeGraphManager::from_config(
        storage.clone(),
        Arc::new(RelationInverter::new()),
        config,
    ));
    let query =
        QueryService::new(storage).with_default_min_importance(config.graph.default_min_importance);

    Ok(Services { manager, query })
}

/// Parse a JSON payload argument; `-` reads it from stdin
fn parse_payload<T: DeserializeOwned>(payload: &str, what: &str) -> anyhow::Result<T> {
    let text = if payload == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read payload from stdin")?;
        buffer
    } else {
        payload.to_string()
    };
    serde_json::from_str(&text).with_context(|| format!("Invalid {} payload", what))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            eprintln!("Set {} = {}", key, value);
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            eprintln!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

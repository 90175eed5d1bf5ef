//! spot - admin CLI for promotion slots.
//!
//! Usage:
//!   spot schedule <item-key> [--start T] [--hours N]   Create a slot
//!   spot reschedule <id> <start> [--hours N]           Move a slot
//!   spot cancel <id>                                    Cancel a slot
//!   spot clear --scope all|queue|history                Delete slots in bulk
//!   spot list [--status S]                              List slots
//!   spot projection                                     Active, upcoming and recently ended slots
//!   spot queue --catalog FILE                           Admin queue view
//!   spot promoted --catalog FILE                        Catalog items with promotion state

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use spotlight::{
    CatalogEntry, ClearScope, EntryId, EntryStatus, EventBus, GlobalConfig, LoggingHandler,
    SlotScheduler, Storage, StorageConfig, YamlLoader, open_storage,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Configuration file read when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "spotlight.yaml";

/// spot - schedule time-boxed promotion slots
#[derive(Parser)]
#[command(name = "spot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to spotlight.yaml
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use a SQLite database at this path, overriding the configured store
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a promotion slot
    Schedule {
        /// Catalog item to promote
        #[arg(value_name = "ITEM_KEY")]
        item_key: String,

        /// Start time, local (YYYY-MM-DDTHH:mm) or offset-qualified (default: now)
        #[arg(short, long)]
        start: Option<String>,

        /// Window length in hours (default: from config)
        #[arg(long)]
        hours: Option<f64>,

        /// Who is requesting the slot
        #[arg(long, default_value = "cli")]
        by: String,
    },

    /// Move an existing slot to a new start and duration
    Reschedule {
        /// Entry ID
        #[arg(value_name = "ID")]
        id: String,

        /// New start time
        #[arg(value_name = "START")]
        start: String,

        /// Window length in hours (default: from config)
        #[arg(long)]
        hours: Option<f64>,
    },

    /// Cancel a slot
    Cancel {
        /// Entry ID
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Delete slots in bulk
    Clear {
        /// Which slots to delete
        #[arg(long, value_enum)]
        scope: ScopeArg,
    },

    /// List slots
    List {
        /// Only show slots with this status (scheduled, cancelled, completed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show active, upcoming and recently ended slots
    Projection,

    /// Show the admin queue with display names and states
    Queue {
        /// YAML or JSON list of {key, name} catalog items
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,
    },

    /// Show catalog items annotated with promotion state
    Promoted {
        /// YAML or JSON list of {key, name} catalog items
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    All,
    Queue,
    History,
}

impl From<ScopeArg> for ClearScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::All => ClearScope::All,
            ScopeArg::Queue => ClearScope::Queue,
            ScopeArg::History => ClearScope::History,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.db.as_deref())?;

    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingHandler)).await;
    tracing::debug!(handlers = event_bus.handler_count().await, "Event bus ready");

    let storage: Arc<dyn Storage> = open_storage(&config).await?;
    let scheduler =
        SlotScheduler::with_storage(storage, config.slots.clone()).with_event_bus(event_bus);

    match cli.command {
        Commands::Schedule {
            item_key,
            start,
            hours,
            by,
        } => {
            let entry = scheduler
                .schedule(item_key, start.as_deref(), hours, &by)
                .await?;
            let normalizer = config.normalizer();
            info!(
                "Promoted from {} until {}",
                normalizer.format_display(entry.effective_start_at),
                normalizer.format_display(entry.effective_end_at)
            );
            print_json(&entry)?;
        }
        Commands::Reschedule { id, start, hours } => {
            let id: EntryId = id.parse()?;
            let updated = scheduler.reschedule(&id, &start, hours).await?;
            print_json(&serde_json::json!({ "id": id, "updated": updated }))?;
        }
        Commands::Cancel { id } => {
            let id: EntryId = id.parse()?;
            let cancelled = scheduler.cancel(&id).await?;
            print_json(&serde_json::json!({ "id": id, "cancelled": cancelled }))?;
        }
        Commands::Clear { scope } => {
            let scope = ClearScope::from(scope);
            let removed = scheduler.clear(scope).await?;
            print_json(&serde_json::json!({ "scope": scope, "removed": removed }))?;
        }
        Commands::List { status } => {
            let status = status
                .map(|s| s.parse::<EntryStatus>())
                .transpose()?;
            print_json(&scheduler.list(status).await?)?;
        }
        Commands::Projection => {
            print_json(&scheduler.projection().await?)?;
        }
        Commands::Queue { catalog } => {
            let items = load_catalog(&catalog)?;
            print_json(&scheduler.build_queue_view(&items).await?)?;
        }
        Commands::Promoted { catalog } => {
            let items = load_catalog(&catalog)?;
            print_json(&scheduler.apply_projection_to_items(items).await?)?;
        }
    }

    Ok(())
}

/// Load configuration from `--config`, or `spotlight.yaml` when present.
fn load_config(
    path: Option<&Path>,
    db: Option<&Path>,
) -> Result<GlobalConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => YamlLoader::load_global_config(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            YamlLoader::load_global_config(DEFAULT_CONFIG_FILE)?
        }
        None => GlobalConfig::default(),
    };

    if let Some(db) = db {
        let busy_timeout_ms = match &config.storage {
            Some(StorageConfig::Sqlite {
                busy_timeout_ms, ..
            }) => *busy_timeout_ms,
            _ => None,
        };
        config.storage = Some(StorageConfig::Sqlite {
            path: db.to_string_lossy().into_owned(),
            busy_timeout_ms,
        });
    }

    Ok(config)
}

/// Read a catalog snapshot. JSON files parse as YAML too.
fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

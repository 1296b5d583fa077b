use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roast_arena::api::state::AppState;
use roast_arena::api::{build_router, cors_layer};
use roast_arena::battle::BattleService;
use roast_arena::config::AppConfig;
use roast_arena::storage::{
    AccountStore, Journal, MemoryAccountStore, MemoryFollowStore, MemoryRoomStore, StorageConfig,
};

#[derive(Parser)]
#[command(name = "roast-arena")]
#[command(about = "Turn-based roast battle server")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides config)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the top players by wins
    Leaderboard {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

struct Stores {
    rooms: Arc<MemoryRoomStore>,
    accounts: Arc<MemoryAccountStore>,
    follows: Arc<MemoryFollowStore>,
}

fn open_stores(config: &AppConfig) -> Result<Stores> {
    if !config.persist {
        tracing::warn!("Persistence disabled, state is lost on exit");
        return Ok(Stores {
            rooms: Arc::new(MemoryRoomStore::new()),
            accounts: Arc::new(MemoryAccountStore::new()),
            follows: Arc::new(MemoryFollowStore::new()),
        });
    }

    let storage = StorageConfig::new(config.data_dir.clone());
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let rooms = MemoryRoomStore::open(Journal::at(storage.rooms_path()))?;
    let accounts = MemoryAccountStore::open(
        Journal::at(storage.accounts_path()),
        Journal::at(storage.settlements_path()),
    )?;
    let follows = MemoryFollowStore::open(Journal::at(storage.follows_path()))?;
    tracing::info!("Loaded state from {}", config.data_dir.display());

    Ok(Stores {
        rooms: Arc::new(rooms),
        accounts: Arc::new(accounts),
        follows: Arc::new(follows),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&PathBuf::from(&cli.config))
        .with_context(|| format!("loading config from {}", cli.config))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = PathBuf::from(dir);
    }
    let log_level = cli.log_level.unwrap_or_else(|| config.log_level.clone());

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting roast-arena v{}", env!("CARGO_PKG_VERSION"));

    let stores = open_stores(&config)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let battles = Arc::new(BattleService::new(
                stores.rooms.clone(),
                stores.accounts.clone(),
                config.battle.to_rules(),
            ));

            // Results committed to a room but never recorded on the accounts
            if let Err(e) = battles.settle_completed().await {
                tracing::error!("Startup settlement sweep failed: {}", e);
            }

            let interval = config
                .battle
                .settle_interval()
                .context("invalid settle_interval")?;
            let settler = battles.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = settler.settle_completed().await {
                        tracing::error!("Settlement sweep failed: {}", e);
                    }
                }
            });

            let state = AppState {
                accounts: stores.accounts,
                follows: stores.follows,
                battles,
            };
            let app = build_router(state).layer(cors_layer(&config.server.cors_origin));

            let addr = format!(
                "{}:{}",
                host.unwrap_or(config.server.host),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Leaderboard { limit } => {
            let top = stores.accounts.top_by_wins(limit).await?;
            if top.is_empty() {
                println!("No players yet.");
            }
            for (rank, account) in top.iter().enumerate() {
                println!(
                    "{:>3}. {:<32} {:>4} wins / {:>4} battles",
                    rank + 1,
                    account.username,
                    account.total_wins,
                    account.total_battles
                );
            }
        }
    }

    Ok(())
}

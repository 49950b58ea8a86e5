//! Fractal Ledger Node
//!
//! Main entry point for the Fractal Ledger.
//! `serve` runs the HTTP server over a persisted ledger; every other
//! subcommand loads the ledger, runs once and saves.
//! State is persisted to disk and survives restarts.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ledger_runtime::LedgerPersistence;
use rpc_server::{RpcServer, RpcServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::LedgerCommand;
use config::NodeConfig;

/// Fractal Ledger node
#[derive(Parser, Debug)]
#[command(name = "fractal-ledger")]
#[command(about = "Triangulated ledger with a recursive hash-committed tree", long_about = None)]
struct Args {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for persistent state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// HTTP bind address
        #[arg(long)]
        http_addr: Option<String>,

        /// Save state every N seconds (0 = only on shutdown)
        #[arg(long)]
        save_interval: Option<u64>,

        /// Log every request at info level
        #[arg(short, long)]
        verbose: bool,
    },
    /// Sign and submit a transfer from a custodial wallet
    AddTransaction {
        sender: String,
        receiver: String,
        amount: f64,
    },
    /// List the transactions touching a wallet
    QueryTransactions { wallet: String },
    /// Show a wallet's balance
    GetBalance { wallet: String },
    /// Recompute every node hash
    VerifyLedger,
    /// Print the tree
    VisualizeLedger,
    /// Write the ledger as JSON
    ExportLedger { path: PathBuf },
    /// Replace the ledger with a JSON export
    ImportLedger { path: PathBuf },
    /// Create an unfunded wallet
    CreateWallet,
    /// Create the foundational wallet and the genesis triad
    FounderOnboarding,
    /// Create and fund a new wallet
    StandardOnboarding,
}

impl Command {
    fn into_ledger_command(self) -> Option<LedgerCommand> {
        let command = match self {
            Command::Serve { .. } => return None,
            Command::AddTransaction {
                sender,
                receiver,
                amount,
            } => LedgerCommand::AddTransaction {
                sender,
                receiver,
                amount,
            },
            Command::QueryTransactions { wallet } => LedgerCommand::QueryTransactions { wallet },
            Command::GetBalance { wallet } => LedgerCommand::GetBalance { wallet },
            Command::VerifyLedger => LedgerCommand::VerifyLedger,
            Command::VisualizeLedger => LedgerCommand::VisualizeLedger,
            Command::ExportLedger { path } => LedgerCommand::ExportLedger { path },
            Command::ImportLedger { path } => LedgerCommand::ImportLedger { path },
            Command::CreateWallet => LedgerCommand::CreateWallet,
            Command::FounderOnboarding => LedgerCommand::FounderOnboarding,
            Command::StandardOnboarding => LedgerCommand::StandardOnboarding,
        };
        Some(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = NodeConfig::load(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    if let Command::Serve {
        http_addr,
        save_interval,
        verbose,
    } = &args.command
    {
        if let Some(http_addr) = http_addr {
            config.http_addr = http_addr.clone();
        }
        if let Some(save_interval) = save_interval {
            config.save_interval_secs = *save_interval;
        }
        config.verbose |= *verbose;
        return run_server(config).await;
    }

    if let Some(command) = args.command.into_ledger_command() {
        let output = commands::run(command, &config.data_dir, config.ledger)?;
        println!("{}", output);
    }
    Ok(())
}

/// Serve the persisted ledger over HTTP until Ctrl+C
async fn run_server(config: NodeConfig) -> Result<()> {
    tracing::info!("Starting Fractal Ledger");
    tracing::info!("  HTTP: {}", config.http_addr);
    tracing::info!("  Node capacity: {}", config.ledger.node_capacity);
    tracing::info!("  Data directory: {:?}", config.data_dir);
    tracing::info!("  Save interval: {}s", config.save_interval_secs);

    let (ledger, store) = commands::open_ledger(&config.data_dir, config.ledger)?;
    let ledger = Arc::new(ledger);
    let store = Arc::new(store);

    match ledger.foundational_wallet() {
        Some(wallet) => tracing::info!(
            "Ledger loaded: {} transactions, foundational wallet {}",
            ledger.history().len(),
            wallet
        ),
        None => tracing::info!("No founder yet; POST /founder-onboarding to start"),
    }

    // Periodic save to disk
    let save_handle = (config.save_interval_secs > 0).then(|| {
        let ledger = Arc::clone(&ledger);
        let store = Arc::clone(&store);
        let period = Duration::from_secs(config.save_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = ledger.save_to_disk(&store) {
                    tracing::error!("Failed to save ledger: {}", e);
                }
            }
        })
    });

    // Start HTTP server
    let server = RpcServer::new(RpcServerConfig {
        http_addr: config.http_addr.clone(),
        verbose: config.verbose,
    });
    let http_ledger = Arc::clone(&ledger);
    let http_server = tokio::spawn(async move {
        if let Err(e) = server.run(http_ledger).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!("Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");

    http_server.abort();
    if let Some(handle) = save_handle {
        handle.abort();
    }

    // Save state before exit
    match ledger.save_to_disk(&store) {
        Ok(count) => tracing::info!("Final state saved: {} transactions", count),
        Err(e) => tracing::error!("Failed to save final state: {}", e),
    }

    tracing::info!("Fractal Ledger stopped");

    Ok(())
}

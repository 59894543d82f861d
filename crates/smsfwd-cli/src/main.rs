//! CLI entry point for sms-forwarder.
//!
//! The `smsfwd` binary hosts the task and log store behind its method
//! channel. `serve` speaks the JSON-lines wire protocol on stdin/stdout for
//! a UI process; `call` and `status` are one-shot helpers for humans.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use smsfwd_bridge::{MethodCall, MethodChannel, StoreMethodHandler};
use smsfwd_store::{
    Database, MemoryPersistence, PreferencePersistence, Preferences, StoreOptions, TaskLogStore,
};

use crate::config::{AppConfig, Backend, DEFAULT_CONFIG_PATH};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Host for the sms-forwarder task and log store.
#[derive(Parser)]
#[command(name = "smsfwd", version, about = "sms-forwarder task and log store")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve method calls as JSON lines on stdin, one response per line on stdout.
    Serve,

    /// Make a single method call and print the response frame.
    Call {
        /// Method name, e.g. `getTasks` or `saveTask`.
        method: String,
        /// Arguments as a JSON document.
        arguments: Option<String>,
    },

    /// Show what the store currently holds.
    Status,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, found_config) = AppConfig::load(&cli.config)?;
    init_tracing(&config.logging.level);
    info!(
        path = %cli.config.display(),
        found = found_config,
        backend = %config.store.backend,
        "configuration loaded"
    );

    match cli.command {
        Commands::Serve => cmd_serve(&config).await,
        Commands::Call { method, arguments } => cmd_call(&config, method, arguments).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config: &AppConfig) -> Result<()> {
    let (channel, handler) = open_channel(config).await?;
    info!(channel = channel.name(), "serving method calls on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read request")? {
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }

        let answer = channel.invoke_frame(frame).await;
        stdout.write_all(answer.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    debug!("stdin closed");
    channel.clear_method_call_handler().await;
    handler.shutdown().await.context("failed to flush store")?;
    info!("shutting down");
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: call
// ---------------------------------------------------------------------------

async fn cmd_call(config: &AppConfig, method: String, arguments: Option<String>) -> Result<()> {
    let arguments: Option<serde_json::Value> = arguments
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .context("arguments must be a JSON document")?;

    let (channel, handler) = open_channel(config).await?;
    let response = channel.invoke(MethodCall::new(method, arguments)).await;
    println!("{}", response.to_frame());

    handler.shutdown().await.context("failed to flush store")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;

    println!();
    println!("  sms-forwarder status");
    println!("  ====================");
    println!();
    println!("  Backend:        {}", config.store.backend);
    if config.store.backend == Backend::Preferences {
        println!("  Database:       {}", config.store.database.display());
        println!("  Preferences:    {}", config.store.preferences_name);
    }
    println!("  Tasks:          {}", store.tasks().len());
    println!("  Next task id:   {}", store.next_task_id());
    println!("  Logs:           {}", store.logs(i64::MAX)?.len());
    println!("  Next log id:    {}", store.next_log_id());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn open_store(config: &AppConfig) -> Result<TaskLogStore> {
    let options = StoreOptions {
        id_policy: config.store.id_policy,
    };

    let store = match config.store.backend {
        Backend::Preferences => {
            let path = config.store.database.clone();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create data directory {}", parent.display())
                })?;
            }
            let db = Database::open_and_migrate(path)
                .await
                .context("failed to open preference database")?;
            let prefs = Preferences::new(db, config.store.preferences_name.clone());
            TaskLogStore::initialize(PreferencePersistence::new(prefs), options).await?
        }
        Backend::Memory => TaskLogStore::initialize(MemoryPersistence::new(), options).await?,
    };
    Ok(store)
}

async fn open_channel(config: &AppConfig) -> Result<(MethodChannel, Arc<StoreMethodHandler>)> {
    let store = open_store(config).await?;
    let handler = Arc::new(
        StoreMethodHandler::new(store).with_default_log_limit(config.bridge.default_log_limit),
    );

    let channel = MethodChannel::new(config.bridge.channel.clone());
    channel.set_method_call_handler(handler.clone()).await;
    Ok((channel, handler))
}

/// Initialize the tracing subscriber with the given default log level.
///
/// Logs go to stderr; stdout carries response frames.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

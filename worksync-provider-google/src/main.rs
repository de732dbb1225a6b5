//! worksync-google — operator CLI for the Google sync provider.
//!
//! Maintenance entry points matching the app's scheduled jobs: run a full
//! sync pass for one user from an exported item projection, and verify or
//! refresh stored tokens.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use worksync_core::{ConnectionStore, SchedulableItem};
use worksync_provider_google::{token, Config, FileConnectionStore, GoogleApi, SyncEngine};

#[derive(Parser)]
#[command(name = "worksync-google", about = "Google Calendar sync provider for worksync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full sync pass for one user
    Sync {
        user_id: i64,
        /// JSON file with the user's schedulable items
        #[arg(long)]
        items: PathBuf,
    },
    /// Check stored connections, refreshing expired tokens
    Verify {
        /// Limit to one user; checks every stored connection otherwise
        user_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load worksync configuration")?;
    let store = FileConnectionStore::new()?;

    match cli.command {
        Commands::Sync { user_id, items } => {
            let contents = std::fs::read_to_string(&items)
                .with_context(|| format!("failed to read {}", items.display()))?;
            let items: Vec<SchedulableItem> =
                serde_json::from_str(&contents).context("failed to parse items file")?;

            let connection = store.load(user_id)?;
            let engine = SyncEngine::from_config(&config, store)?;
            let stats = engine.sync(&connection, &items).await?;

            println!("Sync complete for user {user_id}: {stats}");
            if !stats.is_clean() {
                println!("Some items failed to sync; see logs for details.");
            }
        }
        Commands::Verify { user_id } => {
            let api = GoogleApi::new();
            let connections = match user_id {
                Some(id) => vec![store.load(id)?],
                None => store.list()?,
            };

            if connections.is_empty() {
                println!("No stored calendar connections found.");
                return Ok(());
            }

            for connection in connections {
                match token::ensure_valid_token(&api, &config.credentials, &connection).await {
                    Ok(valid) if valid.access_token != connection.access_token => {
                        store.save(&valid)?;
                        println!("user {}: token refreshed", valid.user_id);
                    }
                    Ok(_) => println!("user {}: token valid", connection.user_id),
                    Err(err) => println!("user {}: {err}", connection.user_id),
                }
            }
        }
    }

    Ok(())
}

//! playtrace CLI entry point

mod cli;

use crate::cli::{Cli, Commands, TokenCommands};
use anyhow::{Context, Result};
use clap::Parser;
use playtrace::auth::ingest;
use playtrace::server::{PlaytraceServer, ServerConfig};
use playtrace::storage::{MemoryStore, PostgresConfig, PostgresStore, TelemetryStore};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Secrets shorter than this get a startup warning
const MIN_SECRET_LEN: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database config is resolved lazily; token commands never need it
    let get_db_config = || -> Result<PostgresConfig> {
        if let Some(url) = &cli.database_url {
            PostgresConfig::from_url(url).context("Invalid DATABASE_URL")
        } else {
            PostgresConfig::from_env().context("DATABASE_URL not set")
        }
    };

    match cli.command {
        Commands::Serve { ref bind, ttl, memory } => {
            let secret = require_secret(cli.ingest_secret.as_deref())?;
            let store: Arc<dyn TelemetryStore> = if memory {
                warn!("Using in-memory store; data will be lost on exit");
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(PostgresStore::new(get_db_config()?).await?)
            };
            serve(store, bind, secret, ttl).await
        }
        Commands::Token { ref command } => token(command, cli.ingest_secret.as_deref()),
        Commands::Init => init(get_db_config()?).await,
        Commands::Status => status(get_db_config()?).await,
    }
}

fn require_secret(secret: Option<&str>) -> Result<Vec<u8>> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .context("PLAYTRACE_INGEST_SECRET or --ingest-secret required")?;

    if secret.len() < MIN_SECRET_LEN {
        warn!(
            length = secret.len(),
            "Ingest secret is short; generate one with `playtrace token secret`"
        );
    }

    Ok(secret.as_bytes().to_vec())
}

async fn serve(
    store: Arc<dyn TelemetryStore>,
    bind: &str,
    ingest_secret: Vec<u8>,
    ingest_ttl: u64,
) -> Result<()> {
    let bind_addr = bind.parse().context("Invalid bind address")?;

    let config = ServerConfig {
        bind_addr,
        ingest_secret,
        ingest_ttl,
    };

    let server = PlaytraceServer::new(config, store);

    info!(ttl = ingest_ttl, "Starting playtrace server...");
    server.run(shutdown_signal()).await
}

fn token(command: &TokenCommands, secret: Option<&str>) -> Result<()> {
    match command {
        TokenCommands::Secret => {
            println!("{}", ingest::generate_secret());
        }
        TokenCommands::Issue { session_id, ttl } => {
            let secret = require_secret(secret)?;
            let token = ingest::issue(&secret, session_id, *ttl)?;

            println!("{}", token);
            println!();
            println!("Session: {}", session_id);
            println!("Expires in: {}s", ttl);
        }
        TokenCommands::Verify { token } => {
            let secret = require_secret(secret)?;
            let claims = ingest::verify(&secret, token).context("Token rejected")?;

            println!("Session: {}", claims.sid);
            println!("Expires at: {} (in {}s)", claims.exp, claims.exp - ingest::unix_now());
        }
    }

    Ok(())
}

async fn init(db_config: PostgresConfig) -> Result<()> {
    let _store = PostgresStore::new(db_config).await?;
    println!("Database schema initialized successfully");
    Ok(())
}

async fn status(db_config: PostgresConfig) -> Result<()> {
    let store = PostgresStore::new(db_config).await?;
    let stats = store.stats().await?;

    println!("playtrace Status");
    println!("================");
    println!("Database: Connected");
    println!("Participants: {}", stats.participants);
    println!("Sessions: {}", stats.sessions);
    println!("Events: {}", stats.events);
    println!("Gameplays: {}", stats.gameplays);
    println!("Replays: {}", stats.replays);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}

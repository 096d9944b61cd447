use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use quill_backend_api::{build_router, AppState, CookieBinder};
use quill_backend_runtime::{shutdown_signal, telemetry, BackendServices};
use quill_config::load as load_config;
use quill_database::{initialize_database, SqliteAuthRepository};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "quill-backend")]
#[command(about = "Quill authentication backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Delete expired and revoked sessions
    PurgeSessions {
        /// Keep stale sessions that ended within this many days
        #[arg(long, default_value_t = 0)]
        keep_days: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Migrate => migrate().await,
        Commands::PurgeSessions { keep_days } => purge_sessions(keep_days).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting Quill backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let cookies = CookieBinder::new(&config.auth.cookie, services.sessions.session_ttl());
    let state = AppState::new(services.sessions.clone(), cookies);
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    services.db_pool.close().await;
    info!("backend shut down");
    Ok(())
}

async fn migrate() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let pool = initialize_database(&config.database)
        .await
        .context("failed to migrate database")?;
    pool.close().await;

    println!("database at {} is up to date", config.database.url);
    Ok(())
}

async fn purge_sessions(keep_days: u32) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let pool = initialize_database(&config.database)
        .await
        .context("failed to open database")?;

    let cutoff = Utc::now() - Duration::days(i64::from(keep_days));
    let removed = SqliteAuthRepository::new(pool.clone())
        .purge_expired(cutoff)
        .await
        .context("failed to purge sessions")?;
    pool.close().await;

    println!("removed {removed} stale sessions (ended before {cutoff})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["quill-backend"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn purge_sessions_accepts_retention_window() {
        let cli = Cli::try_parse_from(["quill-backend", "purge-sessions", "--keep-days", "7"])
            .unwrap();
        assert_eq!(cli.command, Some(Commands::PurgeSessions { keep_days: 7 }));
    }
}

use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracker::peers::ActivePeerTable;
use tracker::persistence::PersistenceGateway;
use tracker::rpc::Tracker;
use tracker::session_manager::SessionManager;
use tracker::{persistence, reaper};
use tracker::{Config, FileIndex};

/// Standalone peer-to-peer file tracker server.
#[derive(Parser)]
#[command(name = "tracker-server", about = "Centralized peer-to-peer file index and session tracker")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, short, default_value = "tracker.toml")]
    config: String,

    /// Override the RPC listener bind address from the config file.
    #[arg(long)]
    bind: Option<String>,
}

const STORAGE_PROBE_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, path = %args.config, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(bind) = args.bind {
        config.network.rpc_bind = bind;
    }

    let connect_options = match PgConnectOptions::from_str(&config.storage.storage_url) {
        Ok(opts) => opts
            .username(&config.storage.storage_user)
            .password(&config.storage.storage_password),
        Err(e) => {
            tracing::error!(error = %e, "invalid storage_url");
            return ExitCode::FAILURE;
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to establish storage connection");
            return ExitCode::FAILURE;
        }
    };

    let gateway = PersistenceGateway::new(pool);
    let peers = ActivePeerTable::new(config.limits.max_users as usize);
    let sessions = SessionManager::new(peers.clone(), gateway.clone());
    let files = FileIndex::new(gateway.clone(), peers.clone(), config.limits.max_files_per_user);
    let tracker = Tracker::new(sessions, files);

    let _health_probe = persistence::spawn_health_probe(gateway, STORAGE_PROBE_INTERVAL);
    let _reaper = reaper::spawn(peers);

    tracing::info!(addr = %config.network.rpc_bind, "starting tracker RPC listener");
    if let Err(e) = tracker::rpc::serve(&config.network.rpc_bind, tracker).await {
        tracing::error!(error = %e, "tracker RPC listener exited with error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

//! The `nimbuskv-server` binary: loads config, opens storage, bootstraps
//! identity defaults, and runs the network server (plus the replication
//! slave loop, if configured as a replica) until SIGINT/SIGTERM.
//!
//! Grounded on the teacher's binary entrypoint shape: `tracing_subscriber`
//! initialized from the config's logging section before anything else
//! logs, fatal config errors exit non-zero, a clean shutdown signal exits
//! zero after a final WAL flush.

use nimbuskv::config::{ReplicaType, ServerConfig};
use nimbuskv::executor::Executor;
use nimbuskv::identity::IdentityStore;
use nimbuskv::network::Server;
use nimbuskv::replication::{ReplicationMaster, ReplicationSlave};
use nimbuskv::session::SessionStore;
use nimbuskv::{storage, DbError};
use std::sync::Arc;

fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging_output.as_str() {
        "stderr" => subscriber.with_writer(std::io::stderr).init(),
        _ => subscriber.init(),
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .collect::<Vec<_>>()
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| w[1].clone())
        .unwrap_or_else(|| "nimbuskv.conf".to_string());

    let config = match ServerConfig::load(&config_path) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("fatal: failed to load config from {config_path}: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run(config: Arc<ServerConfig>) -> nimbuskv::Result<()> {
    let storage = storage::open(&config).await?;
    let identity = IdentityStore::new(storage.clone());
    identity.bootstrap_defaults(&config).await?;

    let sessions = Arc::new(SessionStore::new());
    let executor = Arc::new(Executor::new(storage.clone(), identity, sessions, config.clone()));
    let replication_master = Arc::new(ReplicationMaster::new(storage.wal().clone()));

    let slave_handle = if config.replication_replica_type == ReplicaType::Slave {
        let master_address = config
            .replication_master_address
            .clone()
            .ok_or_else(|| DbError::Configuration("replication.replica_type=slave requires replication.master_address".to_string()))?;
        let slave = Arc::new(ReplicationSlave::new(
            master_address,
            storage.wal().clone(),
            storage.clone(),
            config.replication_sync_interval,
            config.replication_sync_retry_num,
            config.replication_sync_retry_duration,
        )?);
        Some(slave.spawn())
    } else {
        None
    };

    let server = Server::new(executor, replication_master, config.clone());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server loop exited");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    if let Some(handle) = slave_handle {
        handle.abort();
    }
    storage.stop_cleanup_loop();
    storage.wal().close().await;
    Ok(())
}

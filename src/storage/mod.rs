//! Storage façade: composes the [`Engine`](crate::engine::Engine) and the
//! [`Wal`](crate::wal::Wal), rejects mutation on a non-master replica,
//! injects LSNs, tracks stats, and runs the master-only TTL cleanup
//! loop and the replica apply pump.
//!
//! Grounded on the teacher's `network/server.rs` subsystem-composition
//! pattern (a struct holding `Arc`s to its collaborators, handed to
//! connection handlers).

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::{DbError, Result};
use crate::idgen::IdGenerator;
use crate::wal::{LogEntry, Operation, Wal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

#[derive(Debug, Default)]
struct Counters {
    total_gets: AtomicU64,
    total_sets: AtomicU64,
    total_dels: AtomicU64,
    expired_keys: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub total_gets: u64,
    pub total_sets: u64,
    pub total_dels: u64,
    pub expired_keys: u64,
}

/// Cleanup loop parameters (spec §4.4): TTL keys are batched into DEL
/// write entries so expiry itself is WAL-durable and thus replicable.
const CLEANUP_PERIOD: Duration = Duration::from_millis(500);
const CLEANUP_BATCH_SIZE: usize = 64;

pub struct Storage {
    engine: Arc<Engine>,
    wal: Arc<Wal>,
    idgen: Arc<IdGenerator>,
    role: Role,
    counters: Counters,
    start_time: std::time::Instant,
    /// Sender side of the replication apply stream (master: unused;
    /// slave: fed by `replication::slave`, drained by the apply pump).
    apply_tx: mpsc::UnboundedSender<Vec<LogEntry>>,
    cleanup_shutdown: std::sync::Mutex<Option<oneshot::Sender<()>>>,
}

fn now_epoch_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// The function shared verbatim between `Wal::recover` and the
/// replication apply pump (spec §4.4: "guaranteeing recovery and
/// replication apply are semantically identical").
pub fn apply_entries(engine: &Engine, entries: &[LogEntry]) -> Result<()> {
    for entry in entries {
        match entry.operation {
            Operation::Set => {
                let key = entry.key().ok_or_else(|| DbError::Internal("set entry missing key".into()))?;
                let value = entry.value().unwrap_or("");
                engine.set(key, value, entry.ttl_abs_secs());
            }
            Operation::Del => {
                let key = entry.key().ok_or_else(|| DbError::Internal("del entry missing key".into()))?;
                // Idempotent: a duplicate DEL (at-least-once delivery,
                // spec §4.6) tolerates "already gone".
                let _ = engine.del(key);
            }
            Operation::Unknown => {}
        }
    }
    Ok(())
}

impl Storage {
    pub fn new(engine: Arc<Engine>, wal: Arc<Wal>, idgen: Arc<IdGenerator>, role: Role) -> Arc<Self> {
        let (apply_tx, apply_rx) = mpsc::unbounded_channel();
        let storage = Arc::new(Self {
            engine,
            wal,
            idgen,
            role,
            counters: Counters::default(),
            start_time: std::time::Instant::now(),
            apply_tx,
            cleanup_shutdown: std::sync::Mutex::new(None),
        });

        if role == Role::Slave {
            let engine = storage.engine.clone();
            tokio::spawn(apply_pump(engine, apply_rx));
        }

        storage
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn wal(&self) -> &Arc<Wal> {
        &self.wal
    }

    pub fn idgen(&self) -> &Arc<IdGenerator> {
        &self.idgen
    }

    /// Feeds a batch of replicated log entries into the apply stream.
    /// The caller (replication::slave) must already have called
    /// `wal.flush_now` on the same entries before pushing them here.
    pub fn push_replicated(&self, entries: Vec<LogEntry>) {
        let _ = self.apply_tx.send(entries);
    }

    /// Client-facing SET: counted toward `stat` (spec §4.5 `set`).
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.set_uncounted(key, value, ttl).await?;
        self.counters.total_sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Client-facing GET: counted toward `stat` (spec §4.5 `get`).
    pub async fn get(&self, key: &str) -> Result<String> {
        let value = self.get_uncounted(key).await;
        self.counters.total_gets.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Client-facing DEL: counted toward `stat` (spec §4.5 `del`).
    pub async fn del(&self, key: &str) -> Result<()> {
        self.del_uncounted(key).await?;
        self.counters.total_dels.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Same write path as [`Self::set`], without touching the `stat`
    /// counters — used by `IdentityStore` for user/role/namespace
    /// records, which are internal bookkeeping, not client KV traffic.
    pub async fn set_uncounted(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        if self.role == Role::Slave {
            return Err(DbError::MutableOperationOnSlave);
        }
        let lsn = self.idgen.next_id();
        let ttl_abs = ttl.map(|d| now_epoch_secs() + d.as_secs() as i64).unwrap_or(0);
        self.wal.set(lsn, key, value, ttl_abs).await?;
        self.engine.set(key, value, ttl_abs);
        Ok(())
    }

    /// Same read path as [`Self::get`], without touching the `stat`
    /// counters.
    pub async fn get_uncounted(&self, key: &str) -> Result<String> {
        self.engine.get(key).ok_or(DbError::KeyNotFound)
    }

    /// Same delete path as [`Self::del`], without touching the `stat`
    /// counters.
    pub async fn del_uncounted(&self, key: &str) -> Result<()> {
        if self.role == Role::Slave {
            return Err(DbError::MutableOperationOnSlave);
        }
        let lsn = self.idgen.next_id();
        self.wal.del(lsn, key).await?;
        self.engine.del(key)?;
        Ok(())
    }

    pub fn watch(&self, key: &str) -> tokio::sync::oneshot::Receiver<String> {
        self.engine.watch(key)
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            total_gets: self.counters.total_gets.load(Ordering::Relaxed),
            total_sets: self.counters.total_sets.load(Ordering::Relaxed),
            total_dels: self.counters.total_dels.load(Ordering::Relaxed),
            expired_keys: self.counters.expired_keys.load(Ordering::Relaxed),
        }
    }

    /// Starts the master-only TTL sweeper. A no-op on a slave (expiry
    /// there arrives via replicated DEL entries instead).
    pub fn spawn_cleanup_loop(self: &Arc<Self>) {
        if self.role != Role::Master {
            return;
        }
        let (tx, rx) = oneshot::channel();
        *self.cleanup_shutdown.lock().unwrap() = Some(tx);
        let storage = self.clone();
        tokio::spawn(cleanup_loop(storage, rx));
    }

    pub fn stop_cleanup_loop(&self) {
        if let Some(tx) = self.cleanup_shutdown.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

async fn apply_pump(engine: Arc<Engine>, mut rx: mpsc::UnboundedReceiver<Vec<LogEntry>>) {
    while let Some(entries) = rx.recv().await {
        if let Err(e) = apply_entries(&engine, &entries) {
            tracing::error!(error = %e, "replication apply failed");
        }
    }
}

async fn cleanup_loop(storage: Arc<Storage>, mut shutdown: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(CLEANUP_PERIOD);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cleanup_pass(&storage).await;
            }
            _ = &mut shutdown => {
                run_cleanup_pass(&storage).await;
                break;
            }
        }
    }
}

async fn run_cleanup_pass(storage: &Arc<Storage>) {
    let now = now_epoch_secs();
    let mut batch: Vec<String> = Vec::new();
    storage.engine.for_each_expired(now, |key| batch.push(key.to_string()));

    for chunk in batch.chunks(CLEANUP_BATCH_SIZE) {
        let entries: Vec<LogEntry> = chunk
            .iter()
            .map(|k| LogEntry::del(storage.idgen.next_id(), k.clone()))
            .collect();
        if let Err(e) = storage.wal.flush_now(&entries) {
            tracing::error!(error = %e, "cleanup flush failed");
            continue;
        }
        for key in chunk {
            if storage.engine.del(key).is_ok() {
                storage.counters.expired_keys.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Convenience constructor wiring up engine + WAL from server config.
pub async fn open(config: &ServerConfig) -> Result<Arc<Storage>> {
    let wal = Arc::new(crate::wal::Wal::open(
        &config.wal_data_directory,
        config.wal_flushing_batch_size,
        config.wal_flushing_batch_timeout,
        config.wal_max_segment_size,
        config.wal_compression,
    )?);
    let engine = Arc::new(Engine::new());
    let idgen = Arc::new(IdGenerator::new());

    let max_lsn = wal.recover(|entries| apply_entries(&engine, entries))?;
    idgen.restore(max_lsn);

    let role = match config.replication_replica_type {
        crate::config::ReplicaType::Master => Role::Master,
        crate::config::ReplicaType::Slave => Role::Slave,
    };

    let storage = Storage::new(engine, wal, idgen, role);
    storage.spawn_cleanup_loop();
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionKind;

    async fn test_storage(role: Role) -> (Arc<Storage>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let wal = Arc::new(
            Wal::open(dir.path(), 1, Duration::from_millis(10), 1024 * 1024, CompressionKind::None)
                .unwrap(),
        );
        let engine = Arc::new(Engine::new());
        let idgen = Arc::new(IdGenerator::new());
        (Storage::new(engine, wal, idgen, role), dir)
    }

    #[tokio::test]
    async fn round_trip_set_then_get() {
        let (storage, _dir) = test_storage(Role::Master).await;
        storage.set("t:foo", "bar", None).await.unwrap();
        assert_eq!(storage.get("t:foo").await.unwrap(), "bar");
    }

    #[tokio::test]
    async fn slave_rejects_mutation() {
        let (storage, _dir) = test_storage(Role::Slave).await;
        let err = storage.set("t:foo", "bar", None).await.unwrap_err();
        assert!(matches!(err, DbError::MutableOperationOnSlave));
    }

    #[tokio::test]
    async fn lsn_is_monotone_across_writes() {
        let (storage, _dir) = test_storage(Role::Master).await;
        let before = storage.idgen.next_id();
        storage.set("t:a", "1", None).await.unwrap();
        storage.set("t:b", "2", None).await.unwrap();
        let after = storage.idgen.next_id();
        assert!(before < after);
    }

    #[tokio::test]
    async fn cleanup_pass_removes_expired_keys_through_wal() {
        let (storage, _dir) = test_storage(Role::Master).await;
        storage.set("t:a", "1", Some(Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        run_cleanup_pass(&storage).await;
        assert!(matches!(storage.get("t:a").await, Err(DbError::KeyNotFound)));
        assert_eq!(storage.stats().expired_keys, 1);
    }

    #[tokio::test]
    async fn uncounted_operations_do_not_move_stat_counters() {
        let (storage, _dir) = test_storage(Role::Master).await;
        storage.set_uncounted("sys:user:alice", "{}", None).await.unwrap();
        storage.get_uncounted("sys:user:alice").await.unwrap();
        storage.del_uncounted("sys:user:alice").await.unwrap();

        let snapshot = storage.stats();
        assert_eq!(snapshot.total_sets, 0);
        assert_eq!(snapshot.total_gets, 0);
        assert_eq!(snapshot.total_dels, 0);
    }

    #[tokio::test]
    async fn replica_apply_mutates_engine_without_wal_role_check() {
        let (storage, _dir) = test_storage(Role::Slave).await;
        storage.push_replicated(vec![LogEntry::set(1, "t:a", "1", 0)]);
        // give the apply pump a tick to process the message
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(storage.get("t:a").await.unwrap(), "1");
    }
}

//! In-memory key/value map with a TTL index, one-shot `Watch` futures,
//! and an expired-key sweep. The engine never interprets the
//! `<namespace>:<name>` structure of a key (spec §3) — that composition
//! is entirely the executor's job.
//!
//! Grounded on the teacher's `session/session_manager.rs` (RwLock-guarded
//! shared state, doc-comment density) adapted to a flat KV map; `Watch`
//! is a `tokio::sync::oneshot` registered under the same write lock that
//! serializes `Set`, per spec §4.2's concurrency policy.

use crate::error::{DbError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::oneshot;

#[derive(Default)]
struct EngineState {
    map: HashMap<String, String>,
    /// key -> absolute expiry, seconds since epoch. 0 means "no TTL" and
    /// is never stored here.
    ttl: HashMap<String, i64>,
    watchers: HashMap<String, Vec<oneshot::Sender<String>>>,
}

#[derive(Default)]
pub struct Engine {
    state: RwLock<EngineState>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`. A non-zero `ttl_abs_secs` records the
    /// key in the TTL index; zero clears any previous TTL. Any watchers
    /// registered for this key are resolved with the new value.
    pub fn set(&self, key: &str, value: &str, ttl_abs_secs: i64) {
        let mut state = self.state.write();
        state.map.insert(key.to_string(), value.to_string());
        if ttl_abs_secs != 0 {
            state.ttl.insert(key.to_string(), ttl_abs_secs);
        } else {
            state.ttl.remove(key);
        }
        if let Some(senders) = state.watchers.remove(key) {
            for tx in senders {
                let _ = tx.send(value.to_string());
            }
        }
    }

    /// Does not proactively check expiry: a deliberately lock-cheap read
    /// path. An expired key is still visible until the sweeper removes
    /// it (spec §4.2).
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.read().map.get(key).cloned()
    }

    pub fn del(&self, key: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.map.remove(key).is_none() {
            return Err(DbError::KeyNotFound);
        }
        state.ttl.remove(key);
        Ok(())
    }

    /// Registers a one-shot future that resolves with the next value set
    /// for `key` after this call, or never resolves if no write follows.
    pub fn watch(&self, key: &str) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.write();
        state.watchers.entry(key.to_string()).or_default().push(tx);
        rx
    }

    /// Invokes `action` for every key whose absolute TTL is `<= now`.
    /// Does not delete the keys itself — the caller (the storage
    /// façade's cleanup loop) owns deletion so it can go through the WAL
    /// first, keeping expiry durable and replicable. Holding the write
    /// lock for the whole scan serializes the snapshot against `set`.
    pub fn for_each_expired(&self, now_abs_secs: i64, mut action: impl FnMut(&str)) {
        let state = self.state.write();
        for (key, _) in state.ttl.iter().filter(|(_, &expiry)| expiry <= now_abs_secs) {
            action(key);
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let engine = Engine::new();
        engine.set("ns:foo", "bar", 0);
        assert_eq!(engine.get("ns:foo"), Some("bar".to_string()));
    }

    #[test]
    fn del_missing_key_errors() {
        let engine = Engine::new();
        assert!(matches!(engine.del("ns:missing"), Err(DbError::KeyNotFound)));
    }

    #[test]
    fn get_does_not_check_expiry() {
        let engine = Engine::new();
        engine.set("ns:foo", "bar", 1); // already expired (epoch second 1)
        assert_eq!(engine.get("ns:foo"), Some("bar".to_string()));
    }

    #[test]
    fn for_each_expired_reports_only_expired_keys_without_deleting() {
        let engine = Engine::new();
        engine.set("ns:a", "1", 100);
        engine.set("ns:b", "2", 9_999_999_999);
        engine.set("ns:c", "3", 0);

        let mut swept = Vec::new();
        engine.for_each_expired(200, |k| swept.push(k.to_string()));

        assert_eq!(swept, vec!["ns:a".to_string()]);
        // for_each_expired only reports; deletion is the caller's job.
        assert_eq!(engine.get("ns:a"), Some("1".to_string()));
    }

    #[tokio::test]
    async fn watch_resolves_on_next_set() {
        let engine = Engine::new();
        let rx = engine.watch("ns:foo");
        engine.set("ns:foo", "bar", 0);
        assert_eq!(rx.await.unwrap(), "bar");
    }

    #[test]
    fn set_overwrites_previous_value_and_ttl() {
        let engine = Engine::new();
        engine.set("ns:foo", "v1", 100);
        engine.set("ns:foo", "v2", 0);
        let mut swept = Vec::new();
        engine.for_each_expired(i64::MAX, |k| swept.push(k.to_string()));
        assert!(swept.is_empty());
        assert_eq!(engine.get("ns:foo"), Some("v2".to_string()));
    }
}

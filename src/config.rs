//! Flat key/value server configuration.
//!
//! Grounded on the teacher's `Config`/`DatabaseConfig` pattern: a plain
//! struct with a `Default` impl, overridden field-by-field from a loaded
//! file rather than deserialized wholesale. The on-disk format is
//! deliberately not TOML/YAML — the spec describes the surface as flat
//! `section.key = value` pairs, so the loader is a small hand-rolled
//! reader instead of pulling in a config-format crate the teacher never
//! carried for this purpose.

use crate::error::{DbError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaType {
    Master,
    Slave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    None,
    Gzip,
    Zstd,
    Bzip2,
    Flate,
}

impl CompressionKind {
    pub fn extension(self) -> &'static str {
        match self {
            CompressionKind::None => "",
            CompressionKind::Gzip => "gz",
            CompressionKind::Zstd => "zst",
            CompressionKind::Bzip2 => "bz2",
            CompressionKind::Flate => "flate",
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "gz" => CompressionKind::Gzip,
            "zst" => CompressionKind::Zstd,
            "bz2" => CompressionKind::Bzip2,
            "flate" => CompressionKind::Flate,
            _ => CompressionKind::None,
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(CompressionKind::None),
            "gzip" | "gz" => Ok(CompressionKind::Gzip),
            "zstd" | "zst" => Ok(CompressionKind::Zstd),
            "bzip2" | "bz2" => Ok(CompressionKind::Bzip2),
            "flate" | "deflate" => Ok(CompressionKind::Flate),
            other => Err(DbError::Configuration(format!(
                "unknown wal.compression value: {other}"
            ))),
        }
    }
}

/// A role bootstrapped at startup: `name:perms:namespace`.
#[derive(Debug, Clone)]
pub struct DefaultRole {
    pub name: String,
    pub perms: String,
    pub namespace: String,
}

/// A user bootstrapped at startup: `username:password:role1,role2`.
#[derive(Debug, Clone)]
pub struct DefaultUser {
    pub username: String,
    pub password: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub engine_type: String,

    pub network_address: String,
    pub network_max_connections: usize,
    pub network_max_message_size: usize,
    pub network_idle_timeout: Duration,

    pub logging_level: String,
    pub logging_output: String,

    pub root_username: String,
    pub root_password: String,

    pub wal_flushing_batch_size: usize,
    pub wal_flushing_batch_timeout: Duration,
    pub wal_max_segment_size: u64,
    pub wal_compression: CompressionKind,
    pub wal_data_directory: String,

    pub replication_replica_type: ReplicaType,
    pub replication_master_address: Option<String>,
    pub replication_sync_interval: Duration,
    pub replication_sync_retry_num: u32,
    pub replication_sync_retry_duration: Duration,

    pub default_roles: Vec<DefaultRole>,
    pub default_namespaces: Vec<String>,
    pub default_users: Vec<DefaultUser>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            engine_type: "in_memory".to_string(),

            network_address: "127.0.0.1:6123".to_string(),
            network_max_connections: 1000,
            network_max_message_size: 4 * 1024,
            network_idle_timeout: Duration::from_secs(300),

            logging_level: "info".to_string(),
            logging_output: "stdout".to_string(),

            root_username: "root".to_string(),
            root_password: "root".to_string(),

            wal_flushing_batch_size: 100,
            wal_flushing_batch_timeout: Duration::from_millis(100),
            wal_max_segment_size: 16 * 1024 * 1024,
            wal_compression: CompressionKind::None,
            wal_data_directory: "./data/wal".to_string(),

            replication_replica_type: ReplicaType::Master,
            replication_master_address: None,
            replication_sync_interval: Duration::from_secs(2),
            replication_sync_retry_num: 5,
            replication_sync_retry_duration: Duration::from_secs(1),

            default_roles: Vec::new(),
            default_namespaces: vec!["default".to_string()],
            default_users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads config from a flat `key = value` file, falling back to
    /// defaults for any key not present. A missing file is not fatal
    /// (it is logged and defaults are used); a malformed value is.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut cfg = ServerConfig::default();
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!("config file {:?} not found, using defaults", path);
                return Ok(cfg);
            }
        };
        let map = parse_flat_kv(&text);
        cfg.apply(&map)?;
        Ok(cfg)
    }

    fn apply(&mut self, m: &HashMap<String, String>) -> Result<()> {
        if let Some(v) = m.get("engine.type") {
            self.engine_type = v.clone();
        }
        if let Some(v) = m.get("network.address") {
            self.network_address = v.clone();
        }
        if let Some(v) = m.get("network.max_connections") {
            self.network_max_connections = parse_usize(v)?;
        }
        if let Some(v) = m.get("network.max_message_size") {
            self.network_max_message_size = parse_size(v)?;
        }
        if let Some(v) = m.get("network.idle_timeout") {
            self.network_idle_timeout = parse_duration(v)?;
        }
        if let Some(v) = m.get("logging.level") {
            self.logging_level = v.clone();
        }
        if let Some(v) = m.get("logging.output") {
            self.logging_output = v.clone();
        }
        if let Some(v) = m.get("root.username") {
            self.root_username = v.clone();
        }
        if let Some(v) = m.get("root.password") {
            self.root_password = v.clone();
        }
        if let Some(v) = m.get("wal.flushing_batch_size") {
            self.wal_flushing_batch_size = parse_usize(v)?;
        }
        if let Some(v) = m.get("wal.flushing_batch_timeout") {
            self.wal_flushing_batch_timeout = parse_duration(v)?;
        }
        if let Some(v) = m.get("wal.max_segment_size") {
            self.wal_max_segment_size = parse_size(v)? as u64;
        }
        if let Some(v) = m.get("wal.compression") {
            self.wal_compression = CompressionKind::parse(v)?;
        }
        if let Some(v) = m.get("wal.data_directory") {
            self.wal_data_directory = v.clone();
        }
        if let Some(v) = m.get("replication.replica_type") {
            self.replication_replica_type = match v.to_ascii_lowercase().as_str() {
                "master" => ReplicaType::Master,
                "slave" => ReplicaType::Slave,
                other => {
                    return Err(DbError::Configuration(format!(
                        "unknown replication.replica_type: {other}"
                    )))
                }
            };
        }
        if let Some(v) = m.get("replication.master_address") {
            self.replication_master_address = Some(v.clone());
        }
        if let Some(v) = m.get("replication.sync_interval") {
            self.replication_sync_interval = parse_duration(v)?;
        }
        if let Some(v) = m.get("replication.sync_retry_num") {
            self.replication_sync_retry_num = parse_usize(v)? as u32;
        }
        if let Some(v) = m.get("default_roles") {
            self.default_roles = v
                .split(';')
                .filter(|s| !s.is_empty())
                .map(|entry| {
                    let mut parts = entry.splitn(3, ':');
                    let name = parts.next().unwrap_or_default().to_string();
                    let perms = parts.next().unwrap_or_default().to_string();
                    let namespace = parts.next().unwrap_or_default().to_string();
                    DefaultRole { name, perms, namespace }
                })
                .collect();
        }
        if let Some(v) = m.get("default_namespaces") {
            self.default_namespaces = v.split(';').filter(|s| !s.is_empty()).map(String::from).collect();
        }
        if let Some(v) = m.get("default_users") {
            self.default_users = v
                .split(';')
                .filter(|s| !s.is_empty())
                .map(|entry| {
                    let mut parts = entry.splitn(3, ':');
                    let username = parts.next().unwrap_or_default().to_string();
                    let password = parts.next().unwrap_or_default().to_string();
                    let roles = parts
                        .next()
                        .unwrap_or_default()
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                    DefaultUser { username, password, roles }
                })
                .collect();
        }
        Ok(())
    }
}

fn parse_flat_kv(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            out.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    out
}

fn parse_usize(s: &str) -> Result<usize> {
    s.parse::<usize>()
        .map_err(|_| DbError::Configuration(format!("expected integer, got {s}")))
}

/// Parses sizes with `k/K/KB/MB/GB` suffixes per spec §6.
pub fn parse_size(s: &str) -> Result<usize> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let (num, mult) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('K') {
        (n, 1024)
    } else {
        (upper.as_str(), 1)
    };
    let n: usize = num
        .trim()
        .parse()
        .map_err(|_| DbError::Configuration(format!("invalid size: {s}")))?;
    Ok(n * mult)
}

/// Parses Go-style duration strings: `100ms`, `2s`, `5m`, `1h`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (num, unit) = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .map(|i| s.split_at(i))
        .ok_or_else(|| DbError::Configuration(format!("invalid duration: {s}")))?;
    let n: f64 = num
        .parse()
        .map_err(|_| DbError::Configuration(format!("invalid duration: {s}")))?;
    let secs = match unit {
        "ns" => n / 1_000_000_000.0,
        "us" | "µs" => n / 1_000_000.0,
        "ms" => n / 1000.0,
        "s" => n,
        "m" => n * 60.0,
        "h" => n * 3600.0,
        other => {
            return Err(DbError::Configuration(format!(
                "unknown duration unit: {other}"
            )))
        }
    };
    Ok(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("4KB").unwrap(), 4096);
        assert_eq!(parse_size("1MB").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ServerConfig::load("/nonexistent/path/nimbuskv.conf").unwrap();
        assert_eq!(cfg.network_address, "127.0.0.1:6123");
    }

    #[test]
    fn applies_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nimbuskv.conf");
        std::fs::write(
            &path,
            "network.address = 0.0.0.0:9000\nwal.max_segment_size = 1MB\nreplication.replica_type = slave\n",
        )
        .unwrap();
        let cfg = ServerConfig::load(&path).unwrap();
        assert_eq!(cfg.network_address, "0.0.0.0:9000");
        assert_eq!(cfg.wal_max_segment_size, 1024 * 1024);
        assert_eq!(cfg.replication_replica_type, ReplicaType::Slave);
    }
}

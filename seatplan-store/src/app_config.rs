use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: "redis://127.0.0.1:6379".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_seating_prefix")]
    pub seating_prefix: String,
    #[serde(default = "default_lodging_prefix")]
    pub lodging_prefix: String,
    /// Snapshot after every successful mutation instead of only on explicit save.
    #[serde(default)]
    pub autosave: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            seating_prefix: default_seating_prefix(),
            lodging_prefix: default_lodging_prefix(),
            autosave: false,
        }
    }
}

fn default_backend() -> StorageBackend { StorageBackend::Redis }
fn default_seating_prefix() -> String { "seating_layout".to_string() }
fn default_lodging_prefix() -> String { "accommodation".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Interval between SSE keep-alive comments.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { keep_alive_seconds: default_keep_alive() }
    }
}

fn default_keep_alive() -> u64 { 15 }

/// Idle eviction of in-memory event sessions. Sessions with unsaved changes
/// or open change streams are never evicted.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_idle_seconds")]
    pub idle_seconds: u64,
    #[serde(default = "default_sweep_seconds")]
    pub sweep_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_seconds: default_idle_seconds(),
            sweep_seconds: default_sweep_seconds(),
        }
    }
}

fn default_idle_seconds() -> u64 { 1800 }
fn default_sweep_seconds() -> u64 { 60 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `SEATPLAN_PERSISTENCE__BACKEND=memory`
            .add_source(
                config::Environment::with_prefix("SEATPLAN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        s.try_deserialize()
    }
}

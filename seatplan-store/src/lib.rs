pub mod app_config;
pub mod redis_repo;
pub mod memory;
pub mod migrate;
pub mod persistence;

use std::sync::Arc;

use seatplan_core::{KeyValueStore, StorageError};

pub use memory::InMemoryStore;
pub use persistence::{LodgingSnapshot, SeatingSnapshot, SnapshotAdapter, SnapshotError};
pub use redis_repo::RedisClient;

use crate::app_config::{Config, StorageBackend};

/// Open the key-value backend selected by `persistence.backend`.
pub async fn connect(config: &Config) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match config.persistence.backend {
        StorageBackend::Redis => {
            let client = RedisClient::new(&config.redis.url)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            tracing::info!("Using Redis snapshot storage at {}", config.redis.url);
            Ok(Arc::new(client))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory snapshot storage, snapshots do not survive restarts");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

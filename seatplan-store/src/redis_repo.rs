use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use seatplan_core::{KeyValueStore, StorageError};
use tracing::debug;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn get_value(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    pub async fn set_value(&self, key: &str, value: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        debug!("Stored {} bytes under {}", value.len(), key);
        Ok(())
    }

    pub async fn del_key(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl KeyValueStore for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.get_value(key).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_value(key, value).await.map_err(backend)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.del_key(key).await.map_err(backend)
    }
}

fn backend(err: redis::RedisError) -> StorageError {
    StorageError::Backend(err.to_string())
}

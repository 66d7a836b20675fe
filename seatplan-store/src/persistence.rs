use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use seatplan_core::{Guest, KeyValueStore, StorageError};
use seatplan_lodging::{Room, RoomAssignment};
use seatplan_seating::Table;
use tracing::{debug, error, info, warn};

use crate::app_config::PersistenceConfig;
use crate::migrate::{self, MigrationError, CURRENT_SCHEMA_VERSION};

/// Persisted seating state for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatingSnapshot {
    pub schema_version: u32,
    pub tables: Vec<Table>,
    pub guests: Vec<Guest>,
    pub saved_at: DateTime<Utc>,
}

/// Persisted accommodation state for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LodgingSnapshot {
    pub schema_version: u32,
    pub rooms: Vec<Room>,
    pub assignments: Vec<RoomAssignment>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SeatingSnapshotRef<'a> {
    schema_version: u32,
    tables: &'a [Table],
    guests: &'a [Guest],
    saved_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LodgingSnapshotRef<'a> {
    schema_version: u32,
    rooms: &'a [Room],
    assignments: &'a [RoomAssignment],
    saved_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("No snapshot stored under {0}")]
    NotFound(String),

    #[error("Snapshot under {key} is corrupt: {reason}")]
    CorruptData { key: String, reason: String },

    #[error("Snapshot under {key} has schema version {found}, newest supported is {supported}")]
    UnsupportedVersion { key: String, found: u64, supported: u32 },

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Saves and restores one seating and one lodging snapshot per event id.
///
/// Each save fully overwrites the previous snapshot under
/// `<prefix>_<event_id>`. Callers must serialize their own saves for a given
/// event; the adapter does no locking.
#[derive(Clone)]
pub struct SnapshotAdapter {
    store: Arc<dyn KeyValueStore>,
    seating_prefix: String,
    lodging_prefix: String,
}

impl SnapshotAdapter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        seating_prefix: impl Into<String>,
        lodging_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            seating_prefix: seating_prefix.into(),
            lodging_prefix: lodging_prefix.into(),
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &PersistenceConfig) -> Self {
        Self::new(store, &config.seating_prefix, &config.lodging_prefix)
    }

    pub fn seating_key(&self, event_id: &str) -> String {
        format!("{}_{}", self.seating_prefix, event_id)
    }

    pub fn lodging_key(&self, event_id: &str) -> String {
        format!("{}_{}", self.lodging_prefix, event_id)
    }

    // ------------------------------------------------------------------
    // Seating
    // ------------------------------------------------------------------

    pub async fn try_save(
        &self,
        event_id: &str,
        tables: &[Table],
        guests: &[Guest],
    ) -> Result<DateTime<Utc>, SnapshotError> {
        let saved_at = Utc::now();
        let payload = serde_json::to_string(&SeatingSnapshotRef {
            schema_version: CURRENT_SCHEMA_VERSION,
            tables,
            guests,
            saved_at,
        })?;

        let key = self.seating_key(event_id);
        self.store.set(&key, &payload).await?;
        info!("Saved seating snapshot {} ({} tables, {} guests)", key, tables.len(), guests.len());
        Ok(saved_at)
    }

    /// Returns `false` instead of an error; the failure is logged.
    pub async fn save(&self, event_id: &str, tables: &[Table], guests: &[Guest]) -> bool {
        match self.try_save(event_id, tables, guests).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to save seating snapshot for event {}: {}", event_id, e);
                false
            }
        }
    }

    pub async fn try_load(&self, event_id: &str) -> Result<SeatingSnapshot, SnapshotError> {
        let key = self.seating_key(event_id);
        let raw = self.read(&key).await?;
        decode(&key, &raw, migrate::migrate_seating)
    }

    /// Tables and guests of the stored snapshot; `None` when absent or
    /// unreadable.
    pub async fn load(&self, event_id: &str) -> Option<(Vec<Table>, Vec<Guest>)> {
        collapse(event_id, self.try_load(event_id).await).map(|s| (s.tables, s.guests))
    }

    pub async fn clear(&self, event_id: &str) -> bool {
        self.remove(&self.seating_key(event_id)).await
    }

    // ------------------------------------------------------------------
    // Lodging
    // ------------------------------------------------------------------

    pub async fn try_save_lodging(
        &self,
        event_id: &str,
        rooms: &[Room],
        assignments: &[RoomAssignment],
    ) -> Result<DateTime<Utc>, SnapshotError> {
        let saved_at = Utc::now();
        let payload = serde_json::to_string(&LodgingSnapshotRef {
            schema_version: CURRENT_SCHEMA_VERSION,
            rooms,
            assignments,
            saved_at,
        })?;

        let key = self.lodging_key(event_id);
        self.store.set(&key, &payload).await?;
        info!("Saved lodging snapshot {} ({} rooms, {} stays)", key, rooms.len(), assignments.len());
        Ok(saved_at)
    }

    pub async fn save_lodging(
        &self,
        event_id: &str,
        rooms: &[Room],
        assignments: &[RoomAssignment],
    ) -> bool {
        match self.try_save_lodging(event_id, rooms, assignments).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to save lodging snapshot for event {}: {}", event_id, e);
                false
            }
        }
    }

    pub async fn try_load_lodging(&self, event_id: &str) -> Result<LodgingSnapshot, SnapshotError> {
        let key = self.lodging_key(event_id);
        let raw = self.read(&key).await?;
        decode(&key, &raw, migrate::migrate_lodging)
    }

    pub async fn load_lodging(&self, event_id: &str) -> Option<(Vec<Room>, Vec<RoomAssignment>)> {
        collapse(event_id, self.try_load_lodging(event_id).await).map(|s| (s.rooms, s.assignments))
    }

    pub async fn clear_lodging(&self, event_id: &str) -> bool {
        self.remove(&self.lodging_key(event_id)).await
    }

    async fn read(&self, key: &str) -> Result<String, SnapshotError> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| SnapshotError::NotFound(key.to_string()))
    }

    async fn remove(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(existed) => {
                info!("Cleared snapshot {} (existed: {})", key, existed);
                true
            }
            Err(e) => {
                error!("Failed to clear snapshot {}: {}", key, e);
                false
            }
        }
    }
}

fn decode<T, M>(key: &str, raw: &str, migrate: M) -> Result<T, SnapshotError>
where
    T: DeserializeOwned,
    M: FnOnce(&mut Value) -> Result<(), MigrationError>,
{
    let mut value: Value = serde_json::from_str(raw).map_err(|e| corrupt(key, e))?;

    migrate(&mut value).map_err(|e| match e {
        MigrationError::Unsupported(found) => SnapshotError::UnsupportedVersion {
            key: key.to_string(),
            found,
            supported: CURRENT_SCHEMA_VERSION,
        },
        other => corrupt(key, other),
    })?;

    serde_json::from_value(value).map_err(|e| corrupt(key, e))
}

fn corrupt(key: &str, reason: impl std::fmt::Display) -> SnapshotError {
    SnapshotError::CorruptData {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn collapse<T>(event_id: &str, result: Result<T, SnapshotError>) -> Option<T> {
    match result {
        Ok(snapshot) => Some(snapshot),
        Err(SnapshotError::NotFound(key)) => {
            debug!("No snapshot for event {} ({})", event_id, key);
            None
        }
        Err(e) => {
            warn!("Ignoring unreadable snapshot for event {}: {}", event_id, e);
            None
        }
    }
}

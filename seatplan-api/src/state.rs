use std::sync::Arc;
use std::time::Duration;

use seatplan_store::app_config::{PersistenceConfig, StreamConfig};
use seatplan_store::SnapshotAdapter;

use crate::session::EventRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EventRegistry>,
    pub snapshots: SnapshotAdapter,
    pub autosave: bool,
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(
        snapshots: SnapshotAdapter,
        persistence: &PersistenceConfig,
        stream: &StreamConfig,
    ) -> Self {
        Self {
            registry: Arc::new(EventRegistry::new(snapshots.clone())),
            snapshots,
            autosave: persistence.autosave,
            keep_alive: Duration::from_secs(stream.keep_alive_seconds),
        }
    }
}

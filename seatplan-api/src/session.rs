use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use seatplan_lodging::RoomStore;
use seatplan_seating::SeatingStore;
use seatplan_store::app_config::SessionConfig;
use seatplan_store::{SnapshotAdapter, SnapshotError};
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The two independently persisted halves of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Seating,
    Lodging,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layout::Seating => "seating",
            Layout::Lodging => "lodging",
        })
    }
}

/// A stored snapshot exists but could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Stored {layout} snapshot for event {event_id} is unreadable ({reason}); clear it to start over")]
pub struct UnreadableSnapshot {
    pub event_id: String,
    pub layout: Layout,
    pub reason: String,
}

/// In-memory state of one event. Always accessed through its mutex so a
/// mutation and the save that follows it run as one unit.
///
/// A layout whose stored snapshot was unreadable stays blocked until that
/// snapshot is cleared, and is never saved over.
pub struct EventSession {
    pub event_id: String,
    pub seating: SeatingStore,
    pub lodging: RoomStore,
    seating_fault: Option<String>,
    lodging_fault: Option<String>,
    seating_dirty: bool,
    lodging_dirty: bool,
}

impl EventSession {
    /// Restore both snapshots. A missing snapshot starts empty. Storage
    /// failures are returned so a transient outage never masks saved data.
    pub async fn restore(snapshots: &SnapshotAdapter, event_id: &str) -> Result<Self, SnapshotError> {
        let (seating, seating_fault) = match snapshots.try_load(event_id).await {
            Ok(snapshot) => match SeatingStore::new(snapshot.tables, snapshot.guests) {
                Ok(store) => (store, None),
                Err(e) => (SeatingStore::empty(), fault(event_id, Layout::Seating, e)),
            },
            Err(SnapshotError::NotFound(_)) => (SeatingStore::empty(), None),
            Err(SnapshotError::Storage(e)) => return Err(SnapshotError::Storage(e)),
            Err(e) => (SeatingStore::empty(), fault(event_id, Layout::Seating, e)),
        };

        let (lodging, lodging_fault) = match snapshots.try_load_lodging(event_id).await {
            Ok(snapshot) => match RoomStore::new(snapshot.rooms, snapshot.assignments) {
                Ok(store) => (store, None),
                Err(e) => (RoomStore::empty(), fault(event_id, Layout::Lodging, e)),
            },
            Err(SnapshotError::NotFound(_)) => (RoomStore::empty(), None),
            Err(SnapshotError::Storage(e)) => return Err(SnapshotError::Storage(e)),
            Err(e) => (RoomStore::empty(), fault(event_id, Layout::Lodging, e)),
        };

        info!(
            "Restored event {}: {} tables, {} guests, {} rooms",
            event_id,
            seating.tables().len(),
            seating.guests().len(),
            lodging.rooms().len()
        );

        Ok(Self {
            event_id: event_id.to_string(),
            seating,
            lodging,
            seating_fault,
            lodging_fault,
            seating_dirty: false,
            lodging_dirty: false,
        })
    }

    /// Fails while the layout's stored snapshot is unreadable.
    pub fn check(&self, layout: Layout) -> Result<(), UnreadableSnapshot> {
        match self.fault(layout) {
            Some(reason) => Err(UnreadableSnapshot {
                event_id: self.event_id.clone(),
                layout,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Record a mutation of `layout`. With `autosave` the layout is saved
    /// right away and the outcome returned.
    pub async fn changed(
        &mut self,
        layout: Layout,
        snapshots: &SnapshotAdapter,
        autosave: bool,
    ) -> Option<bool> {
        match layout {
            Layout::Seating => self.seating_dirty = true,
            Layout::Lodging => self.lodging_dirty = true,
        }
        if autosave {
            Some(self.save(layout, snapshots).await)
        } else {
            None
        }
    }

    pub async fn save(&mut self, layout: Layout, snapshots: &SnapshotAdapter) -> bool {
        if self.fault(layout).is_some() {
            warn!(
                "Not overwriting unreadable {} snapshot for event {}",
                layout, self.event_id
            );
            return false;
        }

        match layout {
            Layout::Seating => {
                let saved = snapshots
                    .save(&self.event_id, self.seating.tables(), self.seating.guests())
                    .await;
                self.seating_dirty &= !saved;
                saved
            }
            Layout::Lodging => {
                let saved = snapshots
                    .save_lodging(&self.event_id, self.lodging.rooms(), self.lodging.assignments())
                    .await;
                self.lodging_dirty &= !saved;
                saved
            }
        }
    }

    /// Delete the stored snapshot. Live state is kept; an unreadable-snapshot
    /// block on the layout is lifted.
    pub async fn clear(&mut self, layout: Layout, snapshots: &SnapshotAdapter) -> bool {
        let cleared = match layout {
            Layout::Seating => snapshots.clear(&self.event_id).await,
            Layout::Lodging => snapshots.clear_lodging(&self.event_id).await,
        };
        if cleared {
            let lifted = match layout {
                Layout::Seating => self.seating_fault.take(),
                Layout::Lodging => self.lodging_fault.take(),
            };
            if lifted.is_some() {
                info!("Unreadable {} snapshot for event {} cleared", layout, self.event_id);
            }
        }
        cleared
    }

    /// No unsaved changes and nobody watching the change stream.
    pub fn is_evictable(&self) -> bool {
        !self.seating_dirty
            && !self.lodging_dirty
            && self.seating.subscriber_count() == 0
            && self.lodging.subscriber_count() == 0
    }

    fn fault(&self, layout: Layout) -> Option<&str> {
        match layout {
            Layout::Seating => self.seating_fault.as_deref(),
            Layout::Lodging => self.lodging_fault.as_deref(),
        }
    }
}

fn fault(event_id: &str, layout: Layout, reason: impl fmt::Display) -> Option<String> {
    let reason = reason.to_string();
    warn!(
        "Stored {} snapshot for event {} is unreadable, blocking it until cleared: {}",
        layout, event_id, reason
    );
    Some(reason)
}

struct SessionSlot {
    session: OnceCell<Arc<Mutex<EventSession>>>,
    last_used_ms: AtomicU64,
}

/// One session per event id, restored lazily on first use and evicted once
/// idle.
pub struct EventRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionSlot>>>,
    snapshots: SnapshotAdapter,
    epoch: Instant,
}

impl EventRegistry {
    pub fn new(snapshots: SnapshotAdapter) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            snapshots,
            epoch: Instant::now(),
        }
    }

    pub async fn session(&self, event_id: &str) -> Result<Arc<Mutex<EventSession>>, SnapshotError> {
        let slot = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .entry(event_id.to_string())
                .or_insert_with(|| {
                    Arc::new(SessionSlot {
                        session: OnceCell::new(),
                        last_used_ms: AtomicU64::new(0),
                    })
                })
                .clone()
        };
        slot.last_used_ms.store(self.now_ms(), Ordering::Relaxed);

        // Concurrent first requests for one event wait on its slot only.
        let session = slot
            .session
            .get_or_try_init(|| async {
                let session = EventSession::restore(&self.snapshots, event_id).await?;
                Ok::<_, SnapshotError>(Arc::new(Mutex::new(session)))
            })
            .await?;
        Ok(session.clone())
    }

    /// Drop sessions unused for `idle` that nothing references and that
    /// hold no unsaved changes. Returns how many were dropped.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let now = self.now_ms();
        let idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX);

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|event_id, slot| {
            if Arc::strong_count(slot) > 1
                || now.saturating_sub(slot.last_used_ms.load(Ordering::Relaxed)) < idle_ms
            {
                return true;
            }
            let Some(session) = slot.session.get() else {
                // Restore failed earlier; nothing to keep.
                return false;
            };
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(session) if session.is_evictable() => {
                    debug!("Evicting idle session for event {}", event_id);
                    false
                }
                _ => true,
            }
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Periodically evict idle sessions.
pub fn spawn_idle_sweeper(registry: Arc<EventRegistry>, config: &SessionConfig) -> JoinHandle<()> {
    let idle = Duration::from_secs(config.idle_seconds);
    let period = Duration::from_secs(config.sweep_seconds.max(1));

    tokio::spawn(async move {
        info!("Session sweeper started (idle after {:?})", idle);
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_idle(idle).await;
            if evicted > 0 {
                info!("Evicted {} idle event session(s)", evicted);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatplan_core::{Guest, KeyValueStore, StorageError};
    use seatplan_seating::{Table, TableType};
    use seatplan_store::InMemoryStore;

    fn adapter(store: Arc<InMemoryStore>) -> SnapshotAdapter {
        SnapshotAdapter::new(store, "seating_layout", "accommodation")
    }

    fn table(id: &str) -> Table {
        Table::new(id, id, TableType::Rectangle, 2, 0.0, 0.0).unwrap()
    }

    #[tokio::test]
    async fn test_restore_uses_saved_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let snapshots = adapter(store.clone());
        let mut t1 = table("t1");
        t1.seats[0].guest_id = Some("g1".to_string());
        snapshots
            .save("evt-1", &[t1], &[Guest::new("g1", "Ana")])
            .await;

        let session = EventSession::restore(&snapshots, "evt-1").await.unwrap();

        assert_eq!(session.seating.get_seated_count("t1").unwrap(), 1);
        assert!(session.check(Layout::Seating).is_ok());
        assert!(session.lodging.rooms().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_blocks_layout() {
        let store = Arc::new(InMemoryStore::new());
        store.set("seating_layout_evt-1", "garbage").await.unwrap();

        let session = EventSession::restore(&adapter(store), "evt-1").await.unwrap();

        let err = session.check(Layout::Seating).unwrap_err();
        assert_eq!(err.layout, Layout::Seating);
        assert!(session.check(Layout::Lodging).is_ok());
    }

    #[tokio::test]
    async fn test_inconsistent_snapshot_is_never_overwritten() {
        let store = Arc::new(InMemoryStore::new());
        let snapshots = adapter(store.clone());
        let mut t1 = table("t1");
        t1.seats[0].guest_id = Some("g1".to_string());
        snapshots.save("evt-1", &[t1], &[]).await;
        let stored = store.get("seating_layout_evt-1").await.unwrap();

        let mut session = EventSession::restore(&snapshots, "evt-1").await.unwrap();
        assert!(session.check(Layout::Seating).is_err());
        session.seating.add_table(table("t2")).unwrap();

        assert!(!session.save(Layout::Seating, &snapshots).await);
        assert_eq!(session.changed(Layout::Seating, &snapshots, true).await, Some(false));
        assert_eq!(store.get("seating_layout_evt-1").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_clear_lifts_block() {
        let store = Arc::new(InMemoryStore::new());
        store.set("accommodation_evt-1", "{").await.unwrap();
        let snapshots = adapter(store.clone());

        let mut session = EventSession::restore(&snapshots, "evt-1").await.unwrap();
        assert!(session.check(Layout::Lodging).is_err());

        assert!(session.clear(Layout::Lodging, &snapshots).await);
        assert!(session.check(Layout::Lodging).is_ok());
        assert!(session.save(Layout::Lodging, &snapshots).await);
        assert!(store.get("accommodation_evt-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_registry_reuses_sessions() {
        let registry = EventRegistry::new(adapter(Arc::new(InMemoryStore::new())));

        let a = registry.session("evt-1").await.unwrap();
        let b = registry.session("evt-1").await.unwrap();
        registry.session("evt-2").await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len().await, 2);
    }

    /// Reads of keys for event "slow" wait until released.
    struct GatedStore {
        inner: InMemoryStore,
        gate: tokio::sync::Semaphore,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for GatedStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if key.ends_with("_slow") {
                self.gate.acquire().await.unwrap().forget();
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_slow_restore_does_not_block_other_events() {
        let store = Arc::new(GatedStore {
            inner: InMemoryStore::new(),
            gate: tokio::sync::Semaphore::new(0),
        });
        let snapshots = SnapshotAdapter::new(store.clone(), "seating_layout", "accommodation");
        let registry = Arc::new(EventRegistry::new(snapshots));

        let slow = tokio::spawn({
            let registry = registry.clone();
            async move { registry.session("slow").await.map(|_| ()) }
        });
        tokio::task::yield_now().await;

        let fast = tokio::time::timeout(Duration::from_secs(1), registry.session("fast")).await;
        assert!(fast.is_ok());
        assert!(!slow.is_finished());

        // One permit per snapshot read.
        store.gate.add_permits(2);
        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_busy_sessions() {
        let registry = EventRegistry::new(adapter(Arc::new(InMemoryStore::new())));

        // Unsaved change.
        let dirty = registry.session("dirty").await.unwrap();
        {
            let mut session = dirty.lock().await;
            session.seating.add_table(table("t1")).unwrap();
            session.changed(Layout::Seating, &registry.snapshots, false).await;
        }
        drop(dirty);

        // Open change stream.
        let watched = registry.session("watched").await.unwrap();
        let _rx = watched.lock().await.lodging.subscribe();
        drop(watched);

        // Still referenced by a request.
        let _held = registry.session("held").await.unwrap();

        registry.session("quiet").await.unwrap();

        assert_eq!(registry.evict_idle(Duration::ZERO).await, 1);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_evict_idle_respects_idle_window() {
        let registry = EventRegistry::new(adapter(Arc::new(InMemoryStore::new())));
        registry.session("evt-1").await.unwrap();

        assert_eq!(registry.evict_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.evict_idle(Duration::ZERO).await, 1);
        assert!(registry.is_empty().await);
    }
}

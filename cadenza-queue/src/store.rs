//! Shared queue state
//!
//! Thread-safe holder of the single current [`QueueSnapshot`], the source of
//! truth the presentation layer reads. All writes funnel through
//! [`QueueStore::replace`] (compare-and-swap, same queue only) or
//! [`QueueStore::install`] (wholesale replacement for create, resume, and
//! teardown); every accepted write bumps the store version and broadcasts
//! [`QueueEvent`]s.

use cadenza_common::events::{EventBus, QueueEvent};
use cadenza_common::model::{QueueId, QueueSnapshot};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Shared store for the current queue snapshot
///
/// Uses RwLock for concurrent read access with serialized writes. The
/// version counter lives inside the stored snapshot and never resets for
/// the lifetime of the store, so version comparisons stay meaningful across
/// queue replacements.
pub struct QueueStore {
    /// Current snapshot; replaced wholesale on every accepted write
    snapshot: RwLock<QueueSnapshot>,

    /// Event broadcaster for queue change notifications
    events: EventBus,
}

impl QueueStore {
    /// Create a store holding the empty snapshot
    pub fn new() -> Self {
        Self::with_event_capacity(100)
    }

    /// Create a store with a specific event channel capacity
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            snapshot: RwLock::new(QueueSnapshot::empty()),
            events: EventBus::new(capacity),
        }
    }

    /// Clone of the current snapshot
    pub async fn read(&self) -> QueueSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Current store version
    pub async fn version(&self) -> u64 {
        self.snapshot.read().await.version
    }

    /// Queue id of the current snapshot
    pub async fn queue_id(&self) -> QueueId {
        self.snapshot.read().await.queue_id
    }

    /// Subscribe to queue change events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Replace the snapshot for the active queue
    ///
    /// With `expected_version` set, the write only applies if the store is
    /// still at that version: a reconciliation arriving after a newer write
    /// is discarded here. Writes carrying a different `queue_id` than the
    /// stored one are always refused; cross-queue replacement goes through
    /// [`QueueStore::install`].
    ///
    /// Returns the new store version on success, `None` if the write was
    /// discarded.
    pub async fn replace(
        &self,
        mut next: QueueSnapshot,
        expected_version: Option<u64>,
    ) -> Option<u64> {
        let mut current = self.snapshot.write().await;

        if let Some(expected) = expected_version {
            if current.version != expected {
                debug!(
                    expected,
                    actual = current.version,
                    "Discarding stale write for queue {}",
                    next.queue_id
                );
                return None;
            }
        }
        if next.queue_id != current.queue_id {
            debug!(
                "Discarding write for superseded queue {} (active queue {})",
                next.queue_id, current.queue_id
            );
            return None;
        }

        let version = current.version + 1;
        next.version = version;
        let selection_changed = next.selected_item_id != current.selected_item_id;
        *current = next;

        // Emit while still holding the write lock so subscribers observe
        // events in write order.
        self.events.emit_lossy(QueueEvent::SnapshotChanged {
            queue_id: current.queue_id,
            version,
            timestamp: chrono::Utc::now(),
        });
        if selection_changed {
            self.events.emit_lossy(QueueEvent::NowPlayingChanged {
                queue_id: current.queue_id,
                item_id: current.selected_item_id,
                timestamp: chrono::Utc::now(),
            });
        }

        Some(version)
    }

    /// Install a snapshot unconditionally
    ///
    /// The path for queue creation, session resume, and explicit clear
    /// (installing the empty snapshot). Returns the new store version.
    pub async fn install(&self, mut next: QueueSnapshot) -> u64 {
        let mut current = self.snapshot.write().await;

        let version = current.version + 1;
        next.version = version;
        let old_queue_id = current.queue_id;
        let selection_changed = next.selected_item_id != current.selected_item_id;
        let cleared = next.queue_id.is_none() && next.items.is_empty();
        *current = next;

        if current.queue_id != old_queue_id {
            if cleared {
                self.events.emit_lossy(QueueEvent::QueueCleared {
                    timestamp: chrono::Utc::now(),
                });
            } else {
                self.events.emit_lossy(QueueEvent::QueueReplaced {
                    old_queue_id,
                    new_queue_id: current.queue_id,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
        self.events.emit_lossy(QueueEvent::SnapshotChanged {
            queue_id: current.queue_id,
            version,
            timestamp: chrono::Utc::now(),
        });
        if selection_changed {
            self.events.emit_lossy(QueueEvent::NowPlayingChanged {
                queue_id: current.queue_id,
                item_id: current.selected_item_id,
                timestamp: chrono::Utc::now(),
            });
        }

        version
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_common::model::{MediaRef, QueueItem, QueueItemId};

    fn snapshot(queue_id: i64, ids: &[i64], selected: Option<i64>) -> QueueSnapshot {
        QueueSnapshot {
            queue_id: QueueId(queue_id),
            items: ids
                .iter()
                .map(|id| {
                    QueueItem::new(QueueItemId(*id), MediaRef::new(format!("/library/tracks/{id}")))
                })
                .collect(),
            selected_item_id: selected.map(QueueItemId),
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_new_store_holds_empty_snapshot() {
        let store = QueueStore::new();
        let snap = store.read().await;
        assert!(snap.is_empty());
        assert_eq!(snap.queue_id, QueueId::NONE);
        assert_eq!(store.version().await, 0);
    }

    #[tokio::test]
    async fn test_install_bumps_version_and_emits() {
        let store = QueueStore::new();
        let mut rx = store.subscribe();

        let version = store.install(snapshot(7, &[1, 2], Some(1))).await;
        assert_eq!(version, 1);
        assert_eq!(store.queue_id().await, QueueId(7));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type(), "QueueReplaced");
        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type(), "SnapshotChanged");
        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type(), "NowPlayingChanged");
    }

    #[tokio::test]
    async fn test_replace_accepts_matching_version() {
        let store = QueueStore::new();
        let v1 = store.install(snapshot(7, &[1, 2], Some(1))).await;

        let v2 = store.replace(snapshot(7, &[1], Some(1)), Some(v1)).await;
        assert_eq!(v2, Some(2));
        assert_eq!(store.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_rejects_stale_version() {
        let store = QueueStore::new();
        let v1 = store.install(snapshot(7, &[1, 2], Some(1))).await;

        // A newer write lands first.
        store
            .replace(snapshot(7, &[1, 2, 3], Some(1)), None)
            .await
            .unwrap();

        // The write tagged with the old version must be discarded.
        let rejected = store.replace(snapshot(7, &[2], Some(2)), Some(v1)).await;
        assert_eq!(rejected, None);
        assert_eq!(store.read().await.len(), 3);
    }

    #[tokio::test]
    async fn test_replace_refuses_cross_queue_write() {
        let store = QueueStore::new();
        store.install(snapshot(7, &[1, 2], Some(1))).await;
        let version = store.version().await;

        // Response from a superseded queue, even with a matching version.
        let rejected = store.replace(snapshot(6, &[9], Some(9)), Some(version)).await;
        assert_eq!(rejected, None);
        assert_eq!(store.queue_id().await, QueueId(7));

        // Same without version guard.
        let rejected = store.replace(snapshot(6, &[9], Some(9)), None).await;
        assert_eq!(rejected, None);
    }

    #[tokio::test]
    async fn test_install_empty_emits_cleared() {
        let store = QueueStore::new();
        store.install(snapshot(7, &[1], Some(1))).await;

        let mut rx = store.subscribe();
        store.install(QueueSnapshot::empty()).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type(), "QueueCleared");
    }

    #[tokio::test]
    async fn test_version_monotonic_across_installs() {
        let store = QueueStore::new();
        let v1 = store.install(snapshot(7, &[1], Some(1))).await;
        let v2 = store.install(snapshot(8, &[5], Some(5))).await;
        let v3 = store.install(QueueSnapshot::empty()).await;
        assert!(v1 < v2 && v2 < v3);
        assert_eq!(store.read().await.version, v3);
    }

    #[tokio::test]
    async fn test_selection_change_emits_now_playing() {
        let store = QueueStore::new();
        store.install(snapshot(7, &[1, 2], Some(1))).await;

        let mut rx = store.subscribe();
        store.replace(snapshot(7, &[1, 2], Some(2)), None).await.unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type(), "SnapshotChanged");
        match rx.try_recv().unwrap() {
            QueueEvent::NowPlayingChanged { item_id, .. } => {
                assert_eq!(item_id, Some(QueueItemId(2)));
            }
            other => panic!("expected NowPlayingChanged, got {other:?}"),
        }
    }
}

//! Event types for the queue event system
//!
//! Provides shared event definitions and the EventBus used to notify the
//! presentation layer of queue state changes.

use crate::model::{QueueId, QueueItemId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Queue state change notifications
///
/// Events are broadcast by the queue store on every accepted write and can
/// be serialized for transmission to attached UIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// The current snapshot changed (any accepted write)
    ///
    /// Triggers:
    /// - UI: re-render the queue list
    SnapshotChanged {
        /// Queue the write applied to
        queue_id: QueueId,
        /// Store version after the write
        version: u64,
        /// When the write was accepted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The now-playing item changed
    ///
    /// Emitted alongside `SnapshotChanged` whenever a write moves the
    /// selection.
    ///
    /// Triggers:
    /// - UI: update the now-playing highlight
    /// - Telemetry: report the transition
    NowPlayingChanged {
        /// Queue the selection belongs to
        queue_id: QueueId,
        /// New selection (None when the queue emptied)
        item_id: Option<QueueItemId>,
        /// When the selection changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A brand-new queue replaced the previous one
    ///
    /// In-flight work tagged with the old queue id is void from this point.
    ///
    /// Triggers:
    /// - UI: reset scroll position, drop item-level animation state
    QueueReplaced {
        /// Previously active queue (`QueueId::NONE` if none)
        old_queue_id: QueueId,
        /// Newly active queue
        new_queue_id: QueueId,
        /// When the replacement was installed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The queue was torn down at session end
    ///
    /// Triggers:
    /// - UI: show the empty-queue state
    QueueCleared {
        /// When the queue was cleared
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl QueueEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            QueueEvent::SnapshotChanged { .. } => "SnapshotChanged",
            QueueEvent::NowPlayingChanged { .. } => "NowPlayingChanged",
            QueueEvent::QueueReplaced { .. } => "QueueReplaced",
            QueueEvent::QueueCleared { .. } => "QueueCleared",
        }
    }
}

/// Central event distribution bus for queue events
///
/// Wraps tokio::broadcast, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// Subscribers that fall more than `capacity` events behind observe a lag
/// and miss the oldest events; the producer is never blocked.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<QueueEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: QueueEvent) -> Result<usize, broadcast::error::SendError<QueueEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// Used for every store notification: a headless engine (tests, probe
    /// tool) runs without subscribers.
    pub fn emit_lossy(&self, event: QueueEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Wire types for the server queue API
//!
//! The server speaks camelCase JSON; these types are the only place that
//! convention appears. Every structural operation returns the same queue
//! envelope, converted into a model [`QueueSnapshot`] at this boundary.

use cadenza_common::model::{
    MediaRef, MoveAnchor, Placement, PlayerState, QueueId, QueueItem, QueueItemId, QueueSnapshot,
    QueueSource,
};
use serde::{Deserialize, Serialize};

/// Queue envelope returned by every structural queue operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEnvelope {
    pub queue_id: QueueId,
    pub items: Vec<EnvelopeItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_item_id: Option<QueueItemId>,
}

/// One queue entry as the server serializes it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeItem {
    pub id: QueueItemId,
    pub media: MediaRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl QueueEnvelope {
    /// Convert into a model snapshot
    ///
    /// The version is left at zero; the store stamps it when the snapshot
    /// is accepted.
    pub fn into_snapshot(self) -> QueueSnapshot {
        QueueSnapshot {
            queue_id: self.queue_id,
            items: self
                .items
                .into_iter()
                .map(|item| QueueItem {
                    id: item.id,
                    media: item.media,
                    duration_ms: item.duration_ms,
                    title: item.title,
                })
                .collect(),
            selected_item_id: self.selected_item_id,
            version: 0,
        }
    }

    /// Build an envelope from a snapshot (used by in-process test servers)
    pub fn from_snapshot(snapshot: &QueueSnapshot) -> Self {
        Self {
            queue_id: snapshot.queue_id,
            items: snapshot
                .items
                .iter()
                .map(|item| EnvelopeItem {
                    id: item.id,
                    media: item.media.clone(),
                    duration_ms: item.duration_ms,
                    title: item.title.clone(),
                })
                .collect(),
            selected_item_id: snapshot.selected_item_id,
        }
    }
}

/// Body of `POST /queues`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueueRequest {
    pub source: QueueSource,
    pub shuffle: bool,
    pub window: u32,
}

/// Body of `POST /queues/{id}/items`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRequest {
    pub media: Vec<MediaRef>,
    pub placement: Placement,
}

/// Body of `POST /queues/{id}/items/move`
///
/// The anchor flattens into the request, so a move after item 41 reads
/// `{"items":[..],"position":"after","item":41}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub items: Vec<QueueItemId>,
    #[serde(flatten)]
    pub anchor: MoveAnchor,
}

/// Body of `POST /queues/{id}/timeline`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    /// The queue entry being played
    pub item: QueueItemId,
    /// Playback position within the item
    pub position_ms: u64,
    /// Track duration, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Transport state at report time
    pub state: PlayerState,
}

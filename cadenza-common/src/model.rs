//! Queue data model
//!
//! Core types shared by the queue store, engine, and remote client:
//! - Identifier newtypes (`QueueId`, `QueueItemId`, `MediaRef`)
//! - `QueueItem` / `QueueSnapshot` immutable queue state
//! - Mutation vocabulary (`QueueSource`, `Placement`, `MoveAnchor`)
//! - `PlayerState` for telemetry reporting

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identifier of a remote queue resource
///
/// Assigned by the server when a queue is created. `QueueId::NONE` (zero)
/// means "no queue exists yet".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct QueueId(pub i64);

impl QueueId {
    /// Sentinel for "no queue"
    pub const NONE: QueueId = QueueId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn is_some(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one entry within a queue
///
/// Assigned by the server; unique within a queue instance. The client never
/// invents real item ids, but optimistic placeholder items carry negative
/// values until the next server snapshot replaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueItemId(pub i64);

impl QueueItemId {
    /// True for client-side placeholder ids awaiting server assignment
    pub fn is_placeholder(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a playable piece of media
///
/// The engine never inspects the contents; it is minted by the library
/// browser and round-trips through the server unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry in a play queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Identity within the queue (not the media identity; the same track
    /// queued twice yields two items with distinct ids)
    pub id: QueueItemId,
    /// The underlying playable media
    pub media: MediaRef,
    /// Track duration, when the server supplied it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Display label for diagnostics and UI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl QueueItem {
    pub fn new(id: QueueItemId, media: MediaRef) -> Self {
        Self {
            id,
            media,
            duration_ms: None,
            title: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Immutable view of a queue at one instant
///
/// The order of `items` IS the play order; there is no separate position
/// field. Snapshots are never mutated in place: every change produces a new
/// snapshot, and the store stamps `version` on each accepted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Remote queue resource this snapshot mirrors (`QueueId::NONE` = empty)
    pub queue_id: QueueId,
    /// Ordered entries; duplicates of the same media are legal
    pub items: Vec<QueueItem>,
    /// The "now playing" entry; present whenever `items` is non-empty
    pub selected_item_id: Option<QueueItemId>,
    /// Store-assigned monotonic write counter, used for stale-response
    /// detection; zero until the store first accepts the snapshot
    #[serde(default)]
    pub version: u64,
}

impl QueueSnapshot {
    /// The no-queue snapshot
    pub fn empty() -> Self {
        Self {
            queue_id: QueueId::NONE,
            items: Vec::new(),
            selected_item_id: None,
            version: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Index of an item within the play order
    pub fn position_of(&self, id: QueueItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn contains(&self, id: QueueItemId) -> bool {
        self.position_of(id).is_some()
    }

    /// Index of the now-playing item
    pub fn selected_index(&self) -> Option<usize> {
        self.selected_item_id.and_then(|id| self.position_of(id))
    }

    pub fn selected_item(&self) -> Option<&QueueItem> {
        self.selected_index().map(|idx| &self.items[idx])
    }

    /// Item ids in play order
    pub fn item_ids(&self) -> impl Iterator<Item = QueueItemId> + '_ {
        self.items.iter().map(|item| item.id)
    }

    /// Check the snapshot invariants
    ///
    /// - no two entries share an id
    /// - the selection, when present, resolves to an entry
    /// - a non-empty queue always has a selection
    ///
    /// A server payload failing this check is a [`Error::Desync`]: the
    /// engine discards it and re-fetches truth.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for id in self.item_ids() {
            if !seen.insert(id) {
                return Err(Error::Desync(format!("duplicate item id {id}")));
            }
        }
        match self.selected_item_id {
            Some(id) if !seen.contains(&id) => Err(Error::Desync(format!(
                "selected item {id} not present in queue {}",
                self.queue_id
            ))),
            None if !self.items.is_empty() => Err(Error::Desync(format!(
                "non-empty queue {} with no selected item",
                self.queue_id
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Seed for creating a new queue on the server
///
/// Collection sources (album, artist, playlist, genre) expand server-side;
/// `Tracks` queues an explicit selection in the given order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueSource {
    Album { media: MediaRef },
    Artist { media: MediaRef },
    Playlist { media: MediaRef },
    Genre { media: MediaRef },
    Tracks { media: Vec<MediaRef> },
}

impl fmt::Display for QueueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueSource::Album { media } => write!(f, "album {media}"),
            QueueSource::Artist { media } => write!(f, "artist {media}"),
            QueueSource::Playlist { media } => write!(f, "playlist {media}"),
            QueueSource::Genre { media } => write!(f, "genre {media}"),
            QueueSource::Tracks { media } => write!(f, "{} track(s)", media.len()),
        }
    }
}

/// Where inserted media lands relative to the current play position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Immediately after the now-playing item
    Next,
    /// At the tail of the queue
    End,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Next => f.write_str("next"),
            Placement::End => f.write_str("end"),
        }
    }
}

/// Destination of a move operation
///
/// `End` is a first-class anchor rather than "after the last item" so a
/// move-to-tail stays correct while the queue is being appended to
/// concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "position", rename_all = "snake_case")]
pub enum MoveAnchor {
    /// Head of the queue
    First,
    /// Directly after the given item
    After { item: QueueItemId },
    /// Tail of the queue
    End,
}

impl fmt::Display for MoveAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveAnchor::First => f.write_str("first"),
            MoveAnchor::After { item } => write!(f, "after {item}"),
            MoveAnchor::End => f.write_str("end"),
        }
    }
}

/// Player transport state, as reported to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Playing,
    Paused,
    Stopped,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Playing => f.write_str("playing"),
            PlayerState::Paused => f.write_str("paused"),
            PlayerState::Stopped => f.write_str("stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64) -> QueueItem {
        QueueItem::new(QueueItemId(id), MediaRef::new(format!("/library/tracks/{id}")))
    }

    fn snapshot(ids: &[i64], selected: Option<i64>) -> QueueSnapshot {
        QueueSnapshot {
            queue_id: QueueId(7),
            items: ids.iter().copied().map(item).collect(),
            selected_item_id: selected.map(QueueItemId),
            version: 0,
        }
    }

    #[test]
    fn test_queue_id_none_sentinel() {
        assert!(QueueId::NONE.is_none());
        assert!(!QueueId(42).is_none());
        assert!(QueueId(42).is_some());
        assert_eq!(QueueId::default(), QueueId::NONE);
    }

    #[test]
    fn test_item_id_placeholder_range() {
        assert!(QueueItemId(-1).is_placeholder());
        assert!(QueueItemId(-500).is_placeholder());
        assert!(!QueueItemId(0).is_placeholder());
        assert!(!QueueItemId(1201).is_placeholder());
    }

    #[test]
    fn test_id_newtypes_serialize_transparent() {
        let json = serde_json::to_string(&QueueId(99)).unwrap();
        assert_eq!(json, "99");
        let json = serde_json::to_string(&QueueItemId(-3)).unwrap();
        assert_eq!(json, "-3");
        let json = serde_json::to_string(&MediaRef::new("/library/tracks/5")).unwrap();
        assert_eq!(json, "\"/library/tracks/5\"");
    }

    #[test]
    fn test_snapshot_lookup_helpers() {
        let snap = snapshot(&[10, 20, 30], Some(20));
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.position_of(QueueItemId(30)), Some(2));
        assert_eq!(snap.position_of(QueueItemId(99)), None);
        assert_eq!(snap.selected_index(), Some(1));
        assert_eq!(snap.selected_item().unwrap().id, QueueItemId(20));
        assert!(snap.contains(QueueItemId(10)));
    }

    #[test]
    fn test_item_ids_follow_play_order() {
        let snap = snapshot(&[30, 10, 20], Some(10));
        let ids: Vec<QueueItemId> = snap.item_ids().collect();
        assert_eq!(ids, vec![QueueItemId(30), QueueItemId(10), QueueItemId(20)]);
        assert!(QueueSnapshot::empty().item_ids().next().is_none());
    }

    #[test]
    fn test_validate_accepts_well_formed_snapshot() {
        assert!(snapshot(&[1, 2, 3], Some(1)).validate().is_ok());
        assert!(QueueSnapshot::empty().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let snap = snapshot(&[1, 2, 1], Some(2));
        let err = snap.validate().unwrap_err();
        assert!(matches!(err, Error::Desync(_)), "got {err:?}");
    }

    #[test]
    fn test_validate_rejects_dangling_selection() {
        let snap = snapshot(&[1, 2, 3], Some(9));
        assert!(matches!(snap.validate(), Err(Error::Desync(_))));
    }

    #[test]
    fn test_validate_rejects_missing_selection() {
        let snap = snapshot(&[1, 2, 3], None);
        assert!(matches!(snap.validate(), Err(Error::Desync(_))));
    }

    #[test]
    fn test_queue_source_serializes_tagged() {
        let source = QueueSource::Album {
            media: MediaRef::new("/library/albums/12"),
        };
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"kind\":\"album\""));
        assert!(json.contains("/library/albums/12"));

        let source = QueueSource::Tracks {
            media: vec![MediaRef::new("/library/tracks/1"), MediaRef::new("/library/tracks/2")],
        };
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"kind\":\"tracks\""));

        let back: QueueSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, source);
    }

    #[test]
    fn test_move_anchor_serializes_tagged() {
        let json = serde_json::to_string(&MoveAnchor::After {
            item: QueueItemId(41),
        })
        .unwrap();
        assert!(json.contains("\"position\":\"after\""));
        assert!(json.contains("\"item\":41"));

        let json = serde_json::to_string(&MoveAnchor::End).unwrap();
        assert_eq!(json, "{\"position\":\"end\"}");
    }

    #[test]
    fn test_player_state_wire_names() {
        assert_eq!(serde_json::to_string(&PlayerState::Playing).unwrap(), "\"playing\"");
        assert_eq!(serde_json::to_string(&PlayerState::Paused).unwrap(), "\"paused\"");
        assert_eq!(serde_json::to_string(&PlayerState::Stopped).unwrap(), "\"stopped\"");
    }
}

//! Drag-and-drop gesture translation
//!
//! Pure mapping from a drop gesture (dragged entries plus drop target) to a
//! single engine intent. No I/O and no store access; the caller feeds the
//! result to [`QueueEngine::apply`](crate::engine::QueueEngine::apply).

use crate::engine::QueueIntent;
use cadenza_common::model::{MediaRef, MoveAnchor, Placement, QueueItemId};
use tracing::warn;

/// One dragged entry, tagged with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEntry {
    /// An item already in the queue
    QueueItem(QueueItemId),
    /// A library track, playlist entry, or anything else outside the queue
    Foreign(MediaRef),
}

/// Where the gesture dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Before the first entry
    First,
    /// Directly after a queue item
    After(QueueItemId),
    /// After the last entry
    Tail,
}

/// Translate a drop gesture into at most one intent
///
/// Queue members reorder; foreign entries insert. A tail drop of queue
/// members moves them to the end without naming the current last item as
/// anchor, so a concurrent append cannot land behind them. Mixed payloads
/// resolve to the member move and the foreign entries are dropped, since
/// real selections come from a single list.
pub fn resolve_drop(entries: &[DragEntry], target: DropTarget) -> Option<QueueIntent> {
    if entries.is_empty() {
        return None;
    }

    let mut items = Vec::new();
    let mut media = Vec::new();
    for entry in entries {
        match entry {
            DragEntry::QueueItem(id) => items.push(*id),
            DragEntry::Foreign(media_ref) => media.push(media_ref.clone()),
        }
    }

    if !items.is_empty() {
        if !media.is_empty() {
            warn!(
                dropped = media.len(),
                "Ignoring foreign entries in a queue reorder gesture"
            );
        }
        let anchor = match target {
            DropTarget::First => MoveAnchor::First,
            DropTarget::After(item) => MoveAnchor::After { item },
            DropTarget::Tail => MoveAnchor::End,
        };
        return Some(QueueIntent::Move { items, anchor });
    }

    // The remote contract only offers next/end placements, so any anchored
    // insert becomes "after the current item".
    let placement = match target {
        DropTarget::Tail => Placement::End,
        DropTarget::First | DropTarget::After(_) => Placement::Next,
    };
    Some(QueueIntent::Add { media, placement })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(n: u32) -> MediaRef {
        MediaRef::new(format!("/library/tracks/{n}"))
    }

    #[test]
    fn test_queue_members_resolve_to_move() {
        let entries = vec![
            DragEntry::QueueItem(QueueItemId(4)),
            DragEntry::QueueItem(QueueItemId(2)),
        ];
        let intent = resolve_drop(&entries, DropTarget::After(QueueItemId(9)));
        assert_eq!(
            intent,
            Some(QueueIntent::Move {
                items: vec![QueueItemId(4), QueueItemId(2)],
                anchor: MoveAnchor::After {
                    item: QueueItemId(9)
                },
            })
        );
    }

    #[test]
    fn test_tail_drop_of_members_uses_end_anchor() {
        let entries = vec![DragEntry::QueueItem(QueueItemId(1))];
        let intent = resolve_drop(&entries, DropTarget::Tail);
        assert_eq!(
            intent,
            Some(QueueIntent::Move {
                items: vec![QueueItemId(1)],
                anchor: MoveAnchor::End,
            })
        );
    }

    #[test]
    fn test_first_drop_of_members() {
        let entries = vec![DragEntry::QueueItem(QueueItemId(7))];
        let intent = resolve_drop(&entries, DropTarget::First);
        assert_eq!(
            intent,
            Some(QueueIntent::Move {
                items: vec![QueueItemId(7)],
                anchor: MoveAnchor::First,
            })
        );
    }

    #[test]
    fn test_foreign_entries_insert_next_when_anchored() {
        let entries = vec![DragEntry::Foreign(track(1)), DragEntry::Foreign(track(2))];

        let after = resolve_drop(&entries, DropTarget::After(QueueItemId(3)));
        assert_eq!(
            after,
            Some(QueueIntent::Add {
                media: vec![track(1), track(2)],
                placement: Placement::Next,
            })
        );

        let first = resolve_drop(&entries, DropTarget::First);
        assert_eq!(
            first,
            Some(QueueIntent::Add {
                media: vec![track(1), track(2)],
                placement: Placement::Next,
            })
        );
    }

    #[test]
    fn test_foreign_entries_insert_end_at_tail() {
        let entries = vec![DragEntry::Foreign(track(5))];
        let intent = resolve_drop(&entries, DropTarget::Tail);
        assert_eq!(
            intent,
            Some(QueueIntent::Add {
                media: vec![track(5)],
                placement: Placement::End,
            })
        );
    }

    #[test]
    fn test_mixed_payload_moves_members_and_drops_foreign() {
        let entries = vec![
            DragEntry::Foreign(track(1)),
            DragEntry::QueueItem(QueueItemId(2)),
            DragEntry::Foreign(track(3)),
            DragEntry::QueueItem(QueueItemId(4)),
        ];
        let intent = resolve_drop(&entries, DropTarget::First);
        assert_eq!(
            intent,
            Some(QueueIntent::Move {
                items: vec![QueueItemId(2), QueueItemId(4)],
                anchor: MoveAnchor::First,
            })
        );
    }

    #[test]
    fn test_empty_gesture_is_noop() {
        assert_eq!(resolve_drop(&[], DropTarget::Tail), None);
    }
}

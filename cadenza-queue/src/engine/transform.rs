//! Optimistic queue transforms
//!
//! Pure functions from a current snapshot plus one mutation intent to the
//! predicted next snapshot. Each is total: unknown item ids are skipped
//! rather than rejected, because the server snapshot folding in afterwards
//! is the authority on anything the prediction got wrong.

use cadenza_common::model::{MoveAnchor, Placement, QueueItem, QueueItemId, QueueSnapshot};
use std::collections::HashSet;

/// Insert items after the selected entry (`Next`) or at the tail (`End`)
///
/// Inserting into a queue with no selection (empty queue) selects the first
/// inserted item, mirroring what the server does when playback starts from
/// an insert.
pub fn insert(snapshot: &QueueSnapshot, new_items: Vec<QueueItem>, placement: Placement) -> QueueSnapshot {
    if new_items.is_empty() {
        return snapshot.clone();
    }
    let mut next = snapshot.clone();
    let first_new = new_items[0].id;
    let at = match placement {
        Placement::Next => next
            .selected_index()
            .map(|index| index + 1)
            .unwrap_or(next.items.len()),
        Placement::End => next.items.len(),
    };
    next.items.splice(at..at, new_items);
    if next.selected_item_id.is_none() {
        next.selected_item_id = Some(first_new);
    }
    next
}

/// Remove one item
///
/// Removing the selected item advances the selection to the entry that now
/// occupies its slot, falling back to the new tail, or to none when the
/// queue empties.
pub fn remove(snapshot: &QueueSnapshot, item: QueueItemId) -> QueueSnapshot {
    let Some(index) = snapshot.position_of(item) else {
        return snapshot.clone();
    };
    let mut next = snapshot.clone();
    next.items.remove(index);
    if next.selected_item_id == Some(item) {
        next.selected_item_id = if next.items.is_empty() {
            None
        } else if index < next.items.len() {
            Some(next.items[index].id)
        } else {
            Some(next.items[next.items.len() - 1].id)
        };
    }
    next
}

/// Relocate a set of items to the anchor as one contiguous block
///
/// The moved items keep their relative queue order regardless of the order
/// they were named in. An anchor that is itself part of the moved set has
/// no defined destination; the move is a no-op. The selection is untouched:
/// reordering never changes which item is playing.
pub fn move_items(
    snapshot: &QueueSnapshot,
    items: &[QueueItemId],
    anchor: MoveAnchor,
) -> QueueSnapshot {
    let moving: HashSet<QueueItemId> = items
        .iter()
        .copied()
        .filter(|id| snapshot.contains(*id))
        .collect();
    if moving.is_empty() {
        return snapshot.clone();
    }
    if let MoveAnchor::After { item } = anchor {
        if moving.contains(&item) {
            return snapshot.clone();
        }
    }

    let mut kept: Vec<QueueItem> = Vec::with_capacity(snapshot.items.len());
    let mut block: Vec<QueueItem> = Vec::with_capacity(moving.len());
    for entry in &snapshot.items {
        if moving.contains(&entry.id) {
            block.push(entry.clone());
        } else {
            kept.push(entry.clone());
        }
    }

    let at = match anchor {
        MoveAnchor::First => 0,
        // An anchor missing from the local window lands the block at the
        // tail; the server response corrects the guess if it knows better.
        MoveAnchor::After { item } => kept
            .iter()
            .position(|entry| entry.id == item)
            .map(|index| index + 1)
            .unwrap_or(kept.len()),
        MoveAnchor::End => kept.len(),
    };
    kept.splice(at..at, block);

    let mut next = snapshot.clone();
    next.items = kept;
    next
}

//! Remote queue access
//!
//! The engine reaches the server-side queue resource exclusively through
//! the [`RemoteQueue`] trait: a stateless translation layer that owns no
//! local copy of the queue. The production implementation is the HTTP/JSON
//! [`HttpQueueClient`]; tests substitute in-process fakes.

mod http;
mod wire;

pub use http::{HttpQueueClient, DEFAULT_WINDOW};
pub use wire::{
    CreateQueueRequest, EnvelopeItem, InsertRequest, MoveRequest, PositionReport, QueueEnvelope,
};

use async_trait::async_trait;
use cadenza_common::model::{
    MediaRef, MoveAnchor, Placement, QueueId, QueueItemId, QueueSnapshot, QueueSource,
};
use cadenza_common::Result;

/// Operations on the server-side queue resource
///
/// All structural operations return the server's authoritative snapshot of
/// the queue window after the change; the engine reconciles by folding that
/// snapshot back in, never by guessing at partial-failure state. Errors use
/// the shared taxonomy: transport failures and timeouts surface as
/// `RemoteUnavailable`, a rejected create source as `InvalidSource`, an
/// unknown queue as `NotFound`.
#[async_trait]
pub trait RemoteQueue: Send + Sync {
    /// Materialize a new queue seeded from a source, optionally pre-shuffled
    /// server-side
    async fn create(&self, source: &QueueSource, shuffle: bool) -> Result<QueueSnapshot>;

    /// Fetch a bounded window of items around a center point
    ///
    /// Without a center the server centers on its selected item.
    async fn fetch_window(
        &self,
        queue_id: QueueId,
        center: Option<QueueItemId>,
    ) -> Result<QueueSnapshot>;

    /// Insert media after the selected item (`Placement::Next`) or at the
    /// tail (`Placement::End`)
    async fn append_or_insert(
        &self,
        queue_id: QueueId,
        media: &[MediaRef],
        placement: Placement,
    ) -> Result<QueueSnapshot>;

    /// Remove one item from the queue
    async fn remove(&self, queue_id: QueueId, item: QueueItemId) -> Result<QueueSnapshot>;

    /// Relocate a block of items to the anchor, preserving their relative
    /// order
    async fn move_items(
        &self,
        queue_id: QueueId,
        items: &[QueueItemId],
        anchor: MoveAnchor,
    ) -> Result<QueueSnapshot>;

    /// Report playback position; best-effort, one attempt, no retry
    async fn report_position(&self, queue_id: QueueId, report: &PositionReport) -> Result<()>;
}

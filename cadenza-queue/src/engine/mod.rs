//! Queue synchronization engine
//!
//! State machine between the local [`QueueStore`] and the server queue
//! resource:
//! - applies every mutation intent optimistically under a per-engine intent
//!   lock, so intents return immediately and never compute divergent
//!   predictions from the same base
//! - issues the matching server call on a spawned task and folds the
//!   authoritative response back in by version compare-and-swap
//! - parks transport failures for one lazy retry after the next successful
//!   reconciliation on the same queue
//! - recovers from contract-violating payloads with an unconditional window
//!   re-fetch

pub mod transform;

use crate::remote::RemoteQueue;
use crate::store::QueueStore;
use cadenza_common::config::ConfigStore;
use cadenza_common::model::{
    MediaRef, MoveAnchor, Placement, QueueId, QueueItem, QueueItemId, QueueSnapshot, QueueSource,
};
use cadenza_common::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Engine lifecycle phase, derived for the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    /// No queue exists
    Empty,
    /// A queue is being created or resumed
    Loading,
    /// Snapshot present, nothing awaiting reconciliation
    Ready,
    /// At least one mutation is awaiting reconciliation
    Mutating,
}

/// One translated user intent, ready for [`QueueEngine::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueIntent {
    Add {
        media: Vec<MediaRef>,
        placement: Placement,
    },
    Remove {
        item: QueueItemId,
    },
    Move {
        items: Vec<QueueItemId>,
        anchor: MoveAnchor,
    },
}

/// A structural mutation, used both for the primary dispatch and for
/// parked retries
#[derive(Debug, Clone, PartialEq, Eq)]
enum QueueOp {
    Insert {
        media: Vec<MediaRef>,
        placement: Placement,
    },
    Remove {
        item: QueueItemId,
    },
    Move {
        items: Vec<QueueItemId>,
        anchor: MoveAnchor,
    },
}

impl QueueOp {
    fn describe(&self) -> &'static str {
        match self {
            QueueOp::Insert { .. } => "insert",
            QueueOp::Remove { .. } => "remove",
            QueueOp::Move { .. } => "move",
        }
    }
}

/// A mutation whose server call failed, awaiting one lazy retry
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParkedOp {
    queue_id: QueueId,
    op: QueueOp,
}

/// The queue synchronization engine
///
/// Cheap to clone; all clones share the same store, retry ledger, and
/// intent lock.
#[derive(Clone)]
pub struct QueueEngine {
    /// Source of truth for the current snapshot
    store: Arc<QueueStore>,

    /// Server-side queue access
    remote: Arc<dyn RemoteQueue>,

    /// Session persistence for the active queue id
    config: Arc<ConfigStore>,

    /// Serializes the read-transform-publish step of every intent
    intent_lock: Arc<Mutex<()>>,

    /// Operations parked after a transport failure
    retries: Arc<Mutex<Vec<ParkedOp>>>,

    /// Set while a create or resume flow is running
    loading: Arc<AtomicBool>,

    /// Reconciliations currently in flight
    in_flight: Arc<AtomicUsize>,

    /// Placeholder id source, counting down from -1; server-assigned ids
    /// are non-negative so the ranges never collide
    next_placeholder: Arc<AtomicI64>,
}

impl QueueEngine {
    pub fn new(
        store: Arc<QueueStore>,
        remote: Arc<dyn RemoteQueue>,
        config: Arc<ConfigStore>,
    ) -> Self {
        Self {
            store,
            remote,
            config,
            intent_lock: Arc::new(Mutex::new(())),
            retries: Arc::new(Mutex::new(Vec::new())),
            loading: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            next_placeholder: Arc::new(AtomicI64::new(-1)),
        }
    }

    /// The shared store this engine writes to
    pub fn store(&self) -> Arc<QueueStore> {
        Arc::clone(&self.store)
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> QueuePhase {
        if self.loading.load(Ordering::Relaxed) {
            return QueuePhase::Loading;
        }
        if self.store.queue_id().await.is_none() {
            return QueuePhase::Empty;
        }
        if self.in_flight.load(Ordering::Relaxed) > 0 {
            QueuePhase::Mutating
        } else {
            QueuePhase::Ready
        }
    }

    // ========================================
    // Mutation intents (optimistic, non-blocking)
    // ========================================

    /// Queue media after the current item or at the tail
    pub async fn add(&self, media: Vec<MediaRef>, placement: Placement) -> Result<()> {
        if media.is_empty() {
            return Ok(());
        }
        self.submit(QueueOp::Insert { media, placement }).await
    }

    /// Remove one item
    pub async fn remove(&self, item: QueueItemId) -> Result<()> {
        self.submit(QueueOp::Remove { item }).await
    }

    /// Move one item to the anchor
    pub async fn move_one(&self, item: QueueItemId, anchor: MoveAnchor) -> Result<()> {
        self.move_many(vec![item], anchor).await
    }

    /// Move a set of items to the anchor as one block, preserving their
    /// relative order
    pub async fn move_many(&self, items: Vec<QueueItemId>, anchor: MoveAnchor) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.submit(QueueOp::Move { items, anchor }).await
    }

    /// Move a set of items to the tail
    pub async fn move_many_to_end(&self, items: Vec<QueueItemId>) -> Result<()> {
        self.move_many(items, MoveAnchor::End).await
    }

    /// Apply a translated intent (the drag adapter output)
    pub async fn apply(&self, intent: QueueIntent) -> Result<()> {
        match intent {
            QueueIntent::Add { media, placement } => self.add(media, placement).await,
            QueueIntent::Remove { item } => self.remove(item).await,
            QueueIntent::Move { items, anchor } => self.move_many(items, anchor).await,
        }
    }

    // ========================================
    // Queue lifecycle
    // ========================================

    /// Create a new queue from a source, replacing any active queue
    ///
    /// The one blocking flow: there is no optimistic state to fall back on,
    /// so `InvalidSource` and transport failures surface to the caller.
    /// In-flight work for the previous queue is logically cancelled; its
    /// responses are dropped on arrival.
    pub async fn replace_queue(&self, source: &QueueSource, shuffle: bool) -> Result<QueueSnapshot> {
        self.loading.store(true, Ordering::Relaxed);
        let result = self.replace_queue_inner(source, shuffle).await;
        self.loading.store(false, Ordering::Relaxed);
        result
    }

    async fn replace_queue_inner(
        &self,
        source: &QueueSource,
        shuffle: bool,
    ) -> Result<QueueSnapshot> {
        let created = self.remote.create(source, shuffle).await?;
        created.validate()?;
        if created.queue_id.is_none() {
            return Err(Error::Desync("server created a queue with id 0".to_string()));
        }
        let queue_id = created.queue_id;

        if let Err(e) = self.config.set_queue_id(queue_id).await {
            warn!("Could not persist queue id {queue_id}: {e}");
        }

        let tag = {
            let _guard = self.intent_lock.lock().await;
            self.retries.lock().await.clear();
            self.store.install(created).await
        };
        info!(%queue_id, "Installed new queue from {source}");

        // The create response is a creation-time view; immediately re-read
        // a window centered on the selected item.
        match self.remote.fetch_window(queue_id, None).await {
            Ok(window) => {
                if let Err(e) = self.fold(queue_id, tag, window).await {
                    debug!(%queue_id, "Post-create window not folded: {e}");
                }
            }
            Err(e) => debug!(%queue_id, "Post-create window fetch failed: {e}"),
        }

        Ok(self.store.read().await)
    }

    /// Restore the persisted queue at application start
    ///
    /// Returns `Ok(true)` if a queue was restored, `Ok(false)` if none was
    /// persisted or the persisted one has expired server-side.
    pub async fn resume(&self) -> Result<bool> {
        let queue_id = self.config.queue_id().await;
        if queue_id.is_none() {
            return Ok(false);
        }
        self.loading.store(true, Ordering::Relaxed);
        let result = self.resume_inner(queue_id).await;
        self.loading.store(false, Ordering::Relaxed);
        result
    }

    async fn resume_inner(&self, queue_id: QueueId) -> Result<bool> {
        match self.remote.fetch_window(queue_id, None).await {
            Ok(window) => {
                check_payload(queue_id, &window)?;
                let _guard = self.intent_lock.lock().await;
                self.store.install(window).await;
                info!(%queue_id, "Resumed queue");
                Ok(true)
            }
            Err(Error::NotFound(_)) => {
                info!(%queue_id, "Persisted queue expired; starting empty");
                if let Err(e) = self.config.set_queue_id(QueueId::NONE).await {
                    warn!("Could not clear persisted queue id: {e}");
                }
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Fold a fresh window of authoritative truth into the store
    pub async fn refresh(&self) -> Result<()> {
        let snapshot = self.store.read().await;
        if snapshot.queue_id.is_none() {
            return Err(Error::NoQueue);
        }
        let queue_id = snapshot.queue_id;
        let window = self.remote.fetch_window(queue_id, None).await?;
        match self.fold(queue_id, snapshot.version, window).await {
            Ok(_) => Ok(()),
            // A newer write already landed; its own reconciliation owns truth.
            Err(Error::StaleReconciliation { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Session teardown: install the empty snapshot, forget parked retries,
    /// clear the persisted queue id
    pub async fn clear(&self) {
        let _guard = self.intent_lock.lock().await;
        self.retries.lock().await.clear();
        self.store.install(QueueSnapshot::empty()).await;
        if let Err(e) = self.config.set_queue_id(QueueId::NONE).await {
            warn!("Could not clear persisted queue id: {e}");
        }
    }

    // ========================================
    // Optimistic submit and reconciliation
    // ========================================

    /// Steps 1-2 of every mutation: predict, publish, then hand off to a
    /// reconciliation task
    async fn submit(&self, op: QueueOp) -> Result<()> {
        let guard = self.intent_lock.lock().await;
        let snapshot = self.store.read().await;
        if snapshot.queue_id.is_none() {
            return Err(Error::NoQueue);
        }
        let queue_id = snapshot.queue_id;
        let optimistic = self.predict(&snapshot, &op);
        let Some(tag) = self.store.replace(optimistic, None).await else {
            debug!(%queue_id, "Queue replaced mid-intent; dropping {}", op.describe());
            return Ok(());
        };
        drop(guard);

        debug!(%queue_id, tag, "Applied optimistic {}", op.describe());
        self.spawn_reconcile(queue_id, tag, op);
        Ok(())
    }

    fn predict(&self, snapshot: &QueueSnapshot, op: &QueueOp) -> QueueSnapshot {
        match op {
            QueueOp::Insert { media, placement } => {
                let placeholders = media
                    .iter()
                    .map(|media| QueueItem::new(self.mint_placeholder(), media.clone()))
                    .collect();
                transform::insert(snapshot, placeholders, *placement)
            }
            QueueOp::Remove { item } => transform::remove(snapshot, *item),
            QueueOp::Move { items, anchor } => transform::move_items(snapshot, items, *anchor),
        }
    }

    fn mint_placeholder(&self) -> QueueItemId {
        QueueItemId(self.next_placeholder.fetch_sub(1, Ordering::Relaxed))
    }

    fn spawn_reconcile(&self, queue_id: QueueId, tag: u64, op: QueueOp) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        let engine = self.clone();
        tokio::spawn(async move {
            engine.reconcile(queue_id, tag, op).await;
            engine.in_flight.fetch_sub(1, Ordering::Relaxed);
        });
    }

    /// Steps 3-5: issue the server call and fold or park the outcome
    async fn reconcile(&self, queue_id: QueueId, tag: u64, op: QueueOp) {
        match self.dispatch(queue_id, &op).await {
            Ok(server) => match self.fold(queue_id, tag, server).await {
                Ok(version) => {
                    debug!(%queue_id, version, "Reconciled {}", op.describe());
                    self.flush_retries(queue_id).await;
                }
                Err(Error::StaleReconciliation { expected, actual }) => {
                    debug!(%queue_id, expected, actual, "Discarded stale reconciliation");
                    // The server applied the mutation even though the local
                    // fold lost the race; parked work may proceed.
                    self.flush_retries(queue_id).await;
                }
                Err(e) => {
                    warn!(%queue_id, "Reconciliation rejected: {e}");
                    self.recover(queue_id).await;
                }
            },
            Err(e) if e.is_transient() => {
                debug!(%queue_id, "Parking {} after transport failure: {e}", op.describe());
                self.park(queue_id, op).await;
            }
            Err(Error::Desync(e)) => {
                warn!(%queue_id, "Unusable server response: {e}");
                self.recover(queue_id).await;
            }
            Err(e) => {
                warn!(%queue_id, "Dropping {}: {e}", op.describe());
            }
        }
    }

    async fn dispatch(&self, queue_id: QueueId, op: &QueueOp) -> Result<QueueSnapshot> {
        match op {
            QueueOp::Insert { media, placement } => {
                self.remote.append_or_insert(queue_id, media, *placement).await
            }
            QueueOp::Remove { item } => self.remote.remove(queue_id, *item).await,
            QueueOp::Move { items, anchor } => {
                self.remote.move_items(queue_id, items, *anchor).await
            }
        }
    }

    /// Step 4: fold an authoritative snapshot, guarded by the version tag
    async fn fold(&self, queue_id: QueueId, tag: u64, server: QueueSnapshot) -> Result<u64> {
        check_payload(queue_id, &server)?;
        match self.store.replace(server, Some(tag)).await {
            Some(version) => Ok(version),
            None => {
                let actual = self.store.version().await;
                Err(Error::StaleReconciliation {
                    expected: tag,
                    actual,
                })
            }
        }
    }

    async fn park(&self, queue_id: QueueId, op: QueueOp) {
        if self.store.queue_id().await != queue_id {
            debug!(%queue_id, "Not parking {} for a superseded queue", op.describe());
            return;
        }
        let parked = ParkedOp { queue_id, op };
        let mut retries = self.retries.lock().await;
        if !retries.contains(&parked) {
            retries.push(parked);
        }
    }

    /// Step 5 completion: after a successful server call, re-issue parked
    /// operations once each, then fold one window of truth
    async fn flush_retries(&self, queue_id: QueueId) {
        let parked: Vec<QueueOp> = {
            let mut retries = self.retries.lock().await;
            if retries.is_empty() {
                return;
            }
            let kept: Vec<ParkedOp> = retries
                .iter()
                .filter(|parked| parked.queue_id != queue_id)
                .cloned()
                .collect();
            let matching = retries
                .iter()
                .filter(|parked| parked.queue_id == queue_id)
                .map(|parked| parked.op.clone())
                .collect();
            *retries = kept;
            matching
        };
        if parked.is_empty() {
            return;
        }

        info!(%queue_id, count = parked.len(), "Re-issuing parked operations");
        let mut any_applied = false;
        for op in parked {
            match self.dispatch(queue_id, &op).await {
                // Individual responses are ignored; the trailing window
                // fetch folds truth once for the whole burst.
                Ok(_) => any_applied = true,
                Err(e) if e.is_transient() => {
                    debug!(%queue_id, "Re-parking {}: {e}", op.describe());
                    self.park(queue_id, op).await;
                }
                Err(e) => warn!(%queue_id, "Dropping parked {}: {e}", op.describe()),
            }
        }

        if any_applied {
            let tag = self.store.version().await;
            match self.remote.fetch_window(queue_id, None).await {
                Ok(window) => {
                    if let Err(e) = self.fold(queue_id, tag, window).await {
                        debug!(%queue_id, "Post-retry window not folded: {e}");
                    }
                }
                Err(e) => debug!(%queue_id, "Post-retry window fetch failed: {e}"),
            }
        }
    }

    /// Re-establish truth after a contract violation
    async fn recover(&self, queue_id: QueueId) {
        info!(%queue_id, "Re-fetching queue after desync");
        match self.remote.fetch_window(queue_id, None).await {
            Ok(window) => {
                if check_payload(queue_id, &window).is_err() {
                    error!(%queue_id, "Recovery fetch still inconsistent; keeping local snapshot");
                    return;
                }
                // Unconditional fold, under the intent lock so no intent
                // computes its prediction from a half-recovered base.
                let _guard = self.intent_lock.lock().await;
                if self.store.queue_id().await != queue_id {
                    return;
                }
                self.store.replace(window, None).await;
            }
            Err(e) => error!(%queue_id, "Recovery fetch failed: {e}"),
        }
    }
}

fn check_payload(queue_id: QueueId, snapshot: &QueueSnapshot) -> Result<()> {
    snapshot.validate()?;
    if snapshot.queue_id != queue_id {
        return Err(Error::Desync(format!(
            "server answered for queue {} instead of {}",
            snapshot.queue_id, queue_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadenza_common::config::ConfigStore;

    /// Remote that refuses every call; intents must not reach it for these
    /// scenarios to pass
    struct UnreachableRemote;

    #[async_trait]
    impl RemoteQueue for UnreachableRemote {
        async fn create(&self, _: &QueueSource, _: bool) -> Result<QueueSnapshot> {
            Err(Error::RemoteUnavailable("unreachable".to_string()))
        }
        async fn fetch_window(
            &self,
            _: QueueId,
            _: Option<QueueItemId>,
        ) -> Result<QueueSnapshot> {
            Err(Error::RemoteUnavailable("unreachable".to_string()))
        }
        async fn append_or_insert(
            &self,
            _: QueueId,
            _: &[MediaRef],
            _: Placement,
        ) -> Result<QueueSnapshot> {
            Err(Error::RemoteUnavailable("unreachable".to_string()))
        }
        async fn remove(&self, _: QueueId, _: QueueItemId) -> Result<QueueSnapshot> {
            Err(Error::RemoteUnavailable("unreachable".to_string()))
        }
        async fn move_items(
            &self,
            _: QueueId,
            _: &[QueueItemId],
            _: MoveAnchor,
        ) -> Result<QueueSnapshot> {
            Err(Error::RemoteUnavailable("unreachable".to_string()))
        }
        async fn report_position(
            &self,
            _: QueueId,
            _: &crate::remote::PositionReport,
        ) -> Result<()> {
            Err(Error::RemoteUnavailable("unreachable".to_string()))
        }
    }

    fn test_engine(dir: &tempfile::TempDir) -> QueueEngine {
        let store = Arc::new(QueueStore::new());
        let config = Arc::new(ConfigStore::open(dir.path().join("session.toml")));
        QueueEngine::new(store, Arc::new(UnreachableRemote), config)
    }

    #[tokio::test]
    async fn test_mutation_without_queue_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = test_engine(&dir);

        let result = engine
            .add(vec![MediaRef::new("/library/tracks/1")], Placement::End)
            .await;
        assert!(matches!(result, Err(Error::NoQueue)));

        let result = engine.remove(QueueItemId(1)).await;
        assert!(matches!(result, Err(Error::NoQueue)));

        let result = engine.refresh().await;
        assert!(matches!(result, Err(Error::NoQueue)));
    }

    #[tokio::test]
    async fn test_empty_intents_are_noops() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = test_engine(&dir);

        // No queue exists, but empty intents short-circuit before the check.
        assert!(engine.add(vec![], Placement::End).await.is_ok());
        assert!(engine.move_many(vec![], MoveAnchor::First).await.is_ok());
    }

    #[tokio::test]
    async fn test_phase_starts_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = test_engine(&dir);
        assert_eq!(engine.phase().await, QueuePhase::Empty);
    }

    #[tokio::test]
    async fn test_placeholder_ids_are_unique_and_negative() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = test_engine(&dir);

        let a = engine.mint_placeholder();
        let b = engine.mint_placeholder();
        let c = engine.mint_placeholder();
        assert!(a.is_placeholder() && b.is_placeholder() && c.is_placeholder());
        assert!(a != b && b != c);
    }

    #[tokio::test]
    async fn test_clear_resets_store_and_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = test_engine(&dir);

        engine.config.set_queue_id(QueueId(9)).await.unwrap();
        engine
            .store
            .install(QueueSnapshot {
                queue_id: QueueId(9),
                items: vec![QueueItem::new(
                    QueueItemId(1),
                    MediaRef::new("/library/tracks/1"),
                )],
                selected_item_id: Some(QueueItemId(1)),
                version: 0,
            })
            .await;

        engine.clear().await;
        assert!(engine.store.read().await.is_empty());
        assert_eq!(engine.config.queue_id().await, QueueId::NONE);
        assert_eq!(engine.phase().await, QueuePhase::Empty);
    }

    #[tokio::test]
    async fn test_resume_without_persisted_queue() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = test_engine(&dir);
        assert_eq!(engine.resume().await.unwrap(), false);
    }
}

//! Best-effort playback position telemetry
//!
//! Runs independently of the mutation path: a periodic report while the
//! player is playing, an immediate report on state transitions and seeks.
//! Reports are fire-and-forget; when a new trigger fires while a report is
//! still outstanding, the old report is aborted and replaced, since only
//! the latest position matters. Never retries, never writes the store.

use crate::remote::{PositionReport, RemoteQueue};
use crate::store::QueueStore;
use cadenza_common::model::PlayerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

/// Default gap between periodic reports while playing
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Last-known player position, fed through [`TelemetryHandle`]
#[derive(Debug, Clone, Copy)]
struct PlayerSignal {
    state: PlayerState,
    position_ms: u64,
    /// Whether this signal should be reported immediately rather than on
    /// the next periodic tick
    urgent: bool,
}

impl Default for PlayerSignal {
    fn default() -> Self {
        Self {
            state: PlayerState::Stopped,
            position_ms: 0,
            urgent: false,
        }
    }
}

/// Player-side handle for feeding progress to the reporter
///
/// Cheap to clone. Dropping every handle stops the reporter task.
#[derive(Clone)]
pub struct TelemetryHandle {
    tx: watch::Sender<PlayerSignal>,
}

impl TelemetryHandle {
    /// Routine progress while playing; refreshes the position the next
    /// periodic tick will report
    pub fn progress(&self, position_ms: u64) {
        self.send(false, None, position_ms);
    }

    /// Play/pause/stop transition; reported immediately
    pub fn state_changed(&self, state: PlayerState, position_ms: u64) {
        self.send(true, Some(state), position_ms);
    }

    /// Seek within the current item; reported immediately
    pub fn seeked(&self, position_ms: u64) {
        self.send(true, None, position_ms);
    }

    fn send(&self, urgent: bool, state: Option<PlayerState>, position_ms: u64) {
        self.tx.send_modify(|signal| {
            if let Some(state) = state {
                signal.state = state;
            }
            signal.position_ms = position_ms;
            signal.urgent = urgent;
        });
    }
}

/// Periodic and on-event position reporter
pub struct TelemetryReporter {
    /// Read at trigger time for the queue id and selected item
    store: Arc<QueueStore>,
    remote: Arc<dyn RemoteQueue>,
    interval: Duration,
    rx: watch::Receiver<PlayerSignal>,
    /// The report currently in flight, if any
    outstanding: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TelemetryReporter {
    /// Create a reporter and the player-side handle that feeds it
    pub fn new(store: Arc<QueueStore>, remote: Arc<dyn RemoteQueue>) -> (Self, TelemetryHandle) {
        let (tx, rx) = watch::channel(PlayerSignal::default());
        let reporter = Self {
            store,
            remote,
            interval: DEFAULT_REPORT_INTERVAL,
            rx,
            outstanding: Arc::new(Mutex::new(None)),
        };
        (reporter, TelemetryHandle { tx })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the reporter loop
    pub fn start(self) -> TelemetryTask {
        let outstanding = Arc::clone(&self.outstanding);
        let run = tokio::spawn(self.run());
        TelemetryTask { run, outstanding }
    }

    async fn run(mut self) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        info!(
            "Telemetry reporter started ({}ms interval)",
            self.interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let signal = *self.rx.borrow();
                    if signal.state == PlayerState::Playing {
                        self.report(signal).await;
                    }
                }
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        debug!("Player handle dropped; telemetry reporter exiting");
                        break;
                    }
                    let signal = *self.rx.borrow_and_update();
                    if signal.urgent {
                        self.report(signal).await;
                    }
                }
            }
        }
    }

    async fn report(&self, signal: PlayerSignal) {
        let snapshot = self.store.read().await;
        if snapshot.queue_id.is_none() {
            return;
        }
        let Some(item) = snapshot.selected_item() else {
            return;
        };
        // Placeholders are unknown server-side; the reconciled id goes out
        // on the next trigger instead.
        if item.id.is_placeholder() {
            return;
        }

        let queue_id = snapshot.queue_id;
        let report = PositionReport {
            item: item.id,
            position_ms: signal.position_ms,
            duration_ms: item.duration_ms,
            state: signal.state,
        };

        let mut outstanding = self.outstanding.lock().await;
        if let Some(previous) = outstanding.take() {
            if !previous.is_finished() {
                debug!("Superseding outstanding position report");
                previous.abort();
            }
        }

        let remote = Arc::clone(&self.remote);
        *outstanding = Some(tokio::spawn(async move {
            match remote.report_position(queue_id, &report).await {
                Ok(()) => {
                    debug!(%queue_id, position_ms = report.position_ms, "Reported position");
                }
                // Best effort: log and move on, the next trigger replaces it.
                Err(e) => debug!(%queue_id, "Position report failed: {e}"),
            }
        }));
    }
}

/// Running reporter loop; abort it explicitly at session end
pub struct TelemetryTask {
    run: JoinHandle<()>,
    outstanding: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TelemetryTask {
    pub async fn shutdown(self) {
        self.run.abort();
        if let Some(report) = self.outstanding.lock().await.take() {
            report.abort();
        }
        info!("Telemetry reporter stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_tracks_state_across_signals() {
        let (tx, rx) = watch::channel(PlayerSignal::default());
        let handle = TelemetryHandle { tx };

        handle.state_changed(PlayerState::Playing, 1_000);
        assert_eq!(rx.borrow().state, PlayerState::Playing);
        assert!(rx.borrow().urgent);

        // Routine progress keeps the playing state but is not urgent.
        handle.progress(2_000);
        let signal = *rx.borrow();
        assert_eq!(signal.state, PlayerState::Playing);
        assert_eq!(signal.position_ms, 2_000);
        assert!(!signal.urgent);

        handle.seeked(30_000);
        assert!(rx.borrow().urgent);
        assert_eq!(rx.borrow().state, PlayerState::Playing);
        assert_eq!(rx.borrow().position_ms, 30_000);
    }

    #[tokio::test]
    async fn test_every_signal_notifies_even_when_payload_repeats() {
        let (tx, mut rx) = watch::channel(PlayerSignal::default());
        let handle = TelemetryHandle { tx };

        handle.progress(500);
        assert!(rx.changed().await.is_ok());

        // An identical payload still wakes the reporter loop.
        handle.progress(500);
        assert!(rx.changed().await.is_ok());
    }
}

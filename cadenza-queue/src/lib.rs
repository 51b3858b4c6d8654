//! # Cadenza Queue
//!
//! Play queue synchronization for the Cadenza remote-library client:
//! - Versioned snapshot store with change events (QueueStore)
//! - Optimistic mutation engine with server reconciliation (QueueEngine)
//! - HTTP client for the server queue resource (HttpQueueClient)
//! - Best-effort playback position telemetry (TelemetryReporter)
//! - Drag-and-drop gesture translation (resolve_drop)

pub mod drag;
pub mod engine;
pub mod remote;
pub mod store;
pub mod telemetry;

pub use engine::{QueueEngine, QueueIntent, QueuePhase};
pub use remote::{HttpQueueClient, RemoteQueue};
pub use store::QueueStore;
pub use telemetry::{TelemetryHandle, TelemetryReporter};

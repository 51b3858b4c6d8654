//! # Cadenza Common Library
//!
//! Shared code for the Cadenza remote-library client:
//! - Queue data model (snapshots, ids, mutation vocabulary)
//! - Event types (QueueEvent enum and EventBus)
//! - Error taxonomy
//! - Session configuration persistence

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
pub use model::{QueueId, QueueItem, QueueItemId, QueueSnapshot};

//! Session configuration loading and persistence
//!
//! The client keeps one small TOML document under the platform config
//! directory: a stable client identifier, the server connection, and the
//! last active queue id so playback can resume after a restart.

use crate::model::QueueId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Persisted client session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable client identifier, generated on first run and sent with every
    /// server request
    pub client_id: Uuid,
    /// Base URL of the media server, e.g. "http://media.local:32600"
    pub server_url: Option<String>,
    /// Opaque session token issued by the server
    pub token: Option<String>,
    /// Last active queue (`QueueId::NONE` = none); read at startup to resume
    #[serde(default)]
    pub queue_id: QueueId,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            client_id: Uuid::new_v4(),
            server_url: None,
            token: None,
            queue_id: QueueId::NONE,
        }
    }
}

/// Durable store for the client session
///
/// Loading never fails: a missing or corrupt file degrades to a fresh
/// default session with a warning. Mutating helpers write through to disk.
pub struct ConfigStore {
    path: PathBuf,
    session: RwLock<Session>,
}

impl ConfigStore {
    /// Platform default location: `<config_dir>/cadenza/session.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("cadenza").join("session.toml"))
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))
    }

    /// Load the session from `path`, or start a fresh one
    ///
    /// A fresh session (first run, unreadable file, parse failure) is
    /// persisted immediately so the generated client id survives restarts.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (session, fresh) = match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<Session>(&text) {
                Ok(session) => (session, false),
                Err(e) => {
                    warn!("Corrupt session file {}, starting fresh: {}", path.display(), e);
                    (Session::default(), true)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Session::default(), true),
            Err(e) => {
                warn!("Could not read session file {}: {}", path.display(), e);
                (Session::default(), true)
            }
        };

        if fresh {
            if let Err(e) = write_session(&path, &session) {
                warn!("Could not persist new session to {}: {}", path.display(), e);
            }
        }

        Self {
            path,
            session: RwLock::new(session),
        }
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// The persisted queue id (`QueueId::NONE` when no queue is remembered)
    pub async fn queue_id(&self) -> QueueId {
        self.session.read().await.queue_id
    }

    /// Remember the active queue, writing through to disk
    pub async fn set_queue_id(&self, queue_id: QueueId) -> Result<()> {
        let mut session = self.session.write().await;
        if session.queue_id == queue_id {
            return Ok(());
        }
        session.queue_id = queue_id;
        write_session(&self.path, &session)
    }

    /// Update the server connection, writing through to disk
    pub async fn set_connection(
        &self,
        server_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<()> {
        let mut session = self.session.write().await;
        session.server_url = Some(server_url.into());
        session.token = token;
        write_session(&self.path, &session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(session)
        .map_err(|e| Error::Config(format!("could not serialize session: {e}")))?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session_path(dir: &TempDir) -> PathBuf {
        dir.path().join("cadenza").join("session.toml")
    }

    #[tokio::test]
    async fn test_fresh_session_persists_client_id() {
        let dir = TempDir::new().unwrap();
        let path = session_path(&dir);

        let store = ConfigStore::open(&path);
        let first = store.session().await;
        assert_eq!(first.queue_id, QueueId::NONE);
        assert!(path.exists(), "fresh session should be written to disk");

        // Reopening must yield the same client identity.
        let store = ConfigStore::open(&path);
        let second = store.session().await;
        assert_eq!(second.client_id, first.client_id);
    }

    #[tokio::test]
    async fn test_set_queue_id_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = session_path(&dir);

        let store = ConfigStore::open(&path);
        store.set_queue_id(QueueId(4711)).await.unwrap();

        let store = ConfigStore::open(&path);
        assert_eq!(store.queue_id().await, QueueId(4711));
    }

    #[tokio::test]
    async fn test_set_connection_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = session_path(&dir);

        let store = ConfigStore::open(&path);
        store
            .set_connection("http://media.local:32600", Some("tok-123".to_string()))
            .await
            .unwrap();

        let store = ConfigStore::open(&path);
        let session = store.session().await;
        assert_eq!(session.server_url.as_deref(), Some("http://media.local:32600"));
        assert_eq!(session.token.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_corrupt_file_degrades_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = session_path(&dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not [valid toml {{").unwrap();

        let store = ConfigStore::open(&path);
        let session = store.session().await;
        assert_eq!(session.queue_id, QueueId::NONE);
        assert!(session.server_url.is_none());
    }

    #[tokio::test]
    async fn test_missing_queue_id_field_defaults_to_none() {
        let dir = TempDir::new().unwrap();
        let path = session_path(&dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            format!("client_id = \"{}\"\n", Uuid::new_v4()),
        )
        .unwrap();

        let store = ConfigStore::open(&path);
        assert_eq!(store.queue_id().await, QueueId::NONE);
    }
}

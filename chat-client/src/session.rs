//! Durable storage for the session token.
//!
//! The token is the only piece of state that outlives the process: a later
//! start reads it once and tries to resume silently instead of asking for a
//! display name again.

use async_trait::async_trait;
use parley_chat_types::SessionToken;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Fixed storage key for the session token.
pub const SESSION_KEY: &str = "sessionID";

/// Session store errors.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Reading or writing the backing storage failed.
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data is not a usable token.
    #[error("stored session is corrupt: {0}")]
    Corrupt(String),
}

/// Where the session token lives between process runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the stored token, if any.
    async fn load(&self) -> Result<Option<SessionToken>, SessionStoreError>;

    /// Store a token, replacing any previous one.
    async fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError>;

    /// Forget the stored token. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), SessionStoreError>;
}

/// In-memory store; clones share the same slot.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<SessionToken>>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `token`.
    pub fn with_token(token: SessionToken) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token))),
        }
    }

    /// Current contents, for assertions.
    pub fn current(&self) -> Option<SessionToken> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionToken>, SessionStoreError> {
        Ok(self.current())
    }

    async fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}

/// Stores the token in a file named [`SESSION_KEY`] inside a data directory.
///
/// The file is written with 0600 permissions on Unix.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store the token under `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_KEY),
        }
    }

    /// Full path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionToken>, SessionStoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let token = contents.trim();
        if token.is_empty() {
            return Ok(None);
        }
        if token.chars().any(char::is_whitespace) {
            return Err(SessionStoreError::Corrupt(format!(
                "{} contains whitespace",
                self.path.display()
            )));
        }
        Ok(Some(SessionToken::new(token)))
    }

    async fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, token.expose()).await?;
        set_file_permissions_0600(&self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

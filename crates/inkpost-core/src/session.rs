//! Session state: the record of the currently signed-in user.
//!
//! The backend's sign-in response is kept verbatim as a [`SessionPayload`].
//! Stores publish every change on a `watch` channel so views can react to
//! sign-in without polling.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

/// Session payload returned by `POST /api/auth/google`.
///
/// Holds the backend's JSON object as received. Only a string `_id` is
/// required; known fields are read through accessors so a surprising value
/// never rejects the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct SessionPayload {
    fields: Map<String, Value>,
}

/// Why a response body was not accepted as a session payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadError(String);

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PayloadError {}

impl TryFrom<Map<String, Value>> for SessionPayload {
    type Error = PayloadError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get("_id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(Self { fields }),
            Some(_) => Err(PayloadError("session `_id` is not a string".to_string())),
            None => Err(PayloadError("session has no `_id`".to_string())),
        }
    }
}

impl From<SessionPayload> for Map<String, Value> {
    fn from(payload: SessionPayload) -> Self {
        payload.fields
    }
}

impl SessionPayload {
    /// Parses and validates a backend response body.
    ///
    /// # Errors
    /// Returns an error if the body is not JSON, not an object, or lacks a
    /// string `_id`.
    pub fn from_body(body: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| PayloadError(format!("response is not JSON: {e}")))?;
        match value {
            Value::Object(fields) => Self::try_from(fields),
            _ => Err(PayloadError("response is not a JSON object".to_string())),
        }
    }

    pub fn id(&self) -> &str {
        self.str_field("_id").unwrap_or_default()
    }

    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    pub fn username(&self) -> Option<&str> {
        self.str_field("username")
    }

    pub fn profile_picture(&self) -> Option<&str> {
        self.str_field("profilePicture")
    }

    /// Raw value of any field the backend sent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the payload exactly as received.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Best human-readable label for the signed-in user.
    pub fn label(&self) -> &str {
        self.username().or(self.email()).unwrap_or(self.id())
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Process-wide session state owner.
///
/// `commit_identity` is the only operation the sign-in flow uses. It replaces
/// the whole session at once; a failing commit leaves the previous state.
pub trait SessionStore {
    /// Replaces the current session with `payload`.
    ///
    /// # Errors
    /// Returns an error if the new state could not be recorded.
    fn commit_identity(&self, payload: SessionPayload) -> Result<()>;

    /// Returns the current session, if any.
    fn current(&self) -> Option<SessionPayload>;

    /// Subscribes to session changes.
    fn subscribe(&self) -> watch::Receiver<Option<SessionPayload>>;
}

/// In-memory session store.
#[derive(Debug)]
pub struct MemorySessionStore {
    tx: watch::Sender<Option<SessionPayload>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(None),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn commit_identity(&self, payload: SessionPayload) -> Result<()> {
        self.tx.send_replace(Some(payload));
        Ok(())
    }

    fn current(&self) -> Option<SessionPayload> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<SessionPayload>> {
        self.tx.subscribe()
    }
}

/// Session store persisted to `<home>/session.json` with mode 0600.
///
/// Writes go to a temp file that is renamed into place, so readers never see
/// a half-written session.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    tx: watch::Sender<Option<SessionPayload>>,
}

impl FileSessionStore {
    /// Opens the store at `path`, loading any existing session.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = Self::read(&path)?;
        Ok(Self {
            path,
            tx: watch::Sender::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the persisted session. Returns whether one existed.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        let existed = self.path.exists();
        if existed {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        self.tx.send_replace(None);
        Ok(existed)
    }

    fn read(path: &Path) -> Result<Option<SessionPayload>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session from {}", path.display()))?;
        let payload = SessionPayload::from_body(&contents)
            .with_context(|| format!("Failed to parse session from {}", path.display()))?;
        Ok(Some(payload))
    }

    fn write(&self, payload: &SessionPayload) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(payload).context("Failed to serialize session")?;
        let tmp_path = self.path.with_extension("json.tmp");

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&tmp_path)
                .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        }

        #[cfg(not(unix))]
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        }

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn commit_identity(&self, payload: SessionPayload) -> Result<()> {
        self.write(&payload)?;
        self.tx.send_replace(Some(payload));
        Ok(())
    }

    fn current(&self) -> Option<SessionPayload> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<SessionPayload>> {
        self.tx.subscribe()
    }
}

//! The durable per-user record and its codec.
//!
//! One JSON file per user (`user-record`) holding the bearer token, the job
//! state tag, the last render options used, and the last failure reason.
//! Saves go through a temp file plus rename so a reader never decodes a
//! torn write.

use std::fs;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::render::RenderOptions;
use crate::store::{JobState, UserDir};

/// Persisted state for one user. Exists on disk if and only if the user is
/// known to the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Opaque bearer token from the auth collaborator. One token maps to
    /// exactly one user; re-authentication with a different token string
    /// mints a new user rather than reusing this one.
    pub token: String,
    pub state: JobState,
    /// Options from the most recent submission, kept so an interrupted job
    /// can be resumed with the same configuration.
    #[serde(default)]
    pub options: Option<RenderOptions>,
    #[serde(default)]
    pub fail_reason: String,
}

impl UserRecord {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            state: JobState::Idle,
            options: None,
            fail_reason: String::new(),
        }
    }
}

/// Load a user's record. Any unreadable or undecodable file is `Corrupt`;
/// the caller's policy is to discard the directory, never to guess contents.
pub fn load_record(dir: &UserDir) -> Result<UserRecord, StoreError> {
    let path = dir.record_path();
    let contents = fs::read_to_string(&path)
        .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))
}

/// Persist a user's record atomically with respect to `load_record`.
pub fn save_record(dir: &UserDir, record: &UserRecord) -> Result<(), StoreError> {
    let contents = serde_json::to_string_pretty(record)
        .map_err(|err| StoreError::Persist(io::Error::other(err)))?;
    let temp = dir.record_temp_path();
    fs::write(&temp, contents)?;
    fs::rename(&temp, dir.record_path())?;
    Ok(())
}

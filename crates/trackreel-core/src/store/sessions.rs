//! The concurrent session store: tokens to users, users to live job state.
//!
//! All mutations happen under a single exclusive lock held for the whole
//! validate -> persist -> commit sequence, so readers never observe an
//! in-memory record whose durable copy does not match, and concurrent
//! `find_or_create` calls racing on one new token produce exactly one user.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::render::RenderOptions;
use crate::store::record::{save_record, UserRecord};
use crate::store::{JobState, UserDir};

/// Process-assigned numeric handle for one end user. Issued monotonically,
/// never reused while the user's directory exists.
pub type UserId = u64;

#[derive(Default)]
struct StoreState {
    users: HashMap<UserId, UserRecord>,
    tokens: HashMap<String, UserId>,
    last_id: UserId,
}

/// In-memory authority over all user and job state, backed by one directory
/// per user under `root`. Built once at startup (directly or through
/// [`recover`](crate::store::recover)) and shared behind an `Arc` for the
/// process lifetime.
pub struct SessionStore {
    root: PathBuf,
    state: RwLock<StoreState>,
}

impl SessionStore {
    /// Open a store over an empty or administrator-managed root directory
    /// without scanning it. Use [`recover`](crate::store::recover) to
    /// rehydrate existing users.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            state: RwLock::new(StoreState::default()),
        })
    }

    pub(crate) fn from_scan(
        root: PathBuf,
        users: HashMap<UserId, UserRecord>,
        tokens: HashMap<String, UserId>,
        last_id: UserId,
    ) -> Self {
        Self {
            root,
            state: RwLock::new(StoreState {
                users,
                tokens,
                last_id,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self, id: UserId) -> UserDir {
        UserDir::new(&self.root, id)
    }

    /// Resolve a token to its user. Read-only; never creates. Returns `None`
    /// for an unknown token, or if the resolved record's stored token no
    /// longer matches the index entry.
    pub async fn authenticate(&self, token: &str) -> Option<UserId> {
        let state = self.state.read().await;
        let id = *state.tokens.get(token)?;
        let record = state.users.get(&id)?;
        (record.token == token).then_some(id)
    }

    /// Check a `(user, token)` pair as presented by a returning client.
    pub async fn verify(&self, id: UserId, token: &str) -> bool {
        let state = self.state.read().await;
        state.tokens.get(token) == Some(&id)
    }

    /// Return the existing user for `token`, or mint the next user id,
    /// create its directory and initial record, and register it.
    ///
    /// Ids are strictly increasing for the process lifetime; an id vacated by
    /// an administrator is never re-issued below the high-water mark. On any
    /// I/O failure the partially-created directory is removed and the maps
    /// are left untouched.
    pub async fn find_or_create(&self, token: &str) -> Result<UserId, StoreError> {
        let mut state = self.state.write().await;
        if let Some(&id) = state.tokens.get(token) {
            return Ok(id);
        }

        let mut id = state.last_id + 1;
        while state.users.contains_key(&id) {
            id += 1;
        }

        let dir = self.user_dir(id);
        if dir.path().exists() {
            // Leftover disk state not owned by any known user.
            fs::remove_dir_all(dir.path())?;
        }
        fs::create_dir_all(dir.path())?;

        let record = UserRecord::new(token);
        if let Err(err) = save_record(&dir, &record) {
            let _ = fs::remove_dir_all(dir.path());
            return Err(err);
        }

        state.tokens.insert(token.to_string(), id);
        state.users.insert(id, record);
        state.last_id = id;
        debug!(user = id, "registered new user");
        Ok(id)
    }

    pub async fn job_state(&self, id: UserId) -> Result<JobState, StoreError> {
        let state = self.state.read().await;
        state
            .users
            .get(&id)
            .map(|record| record.state)
            .ok_or(StoreError::NotFound(id))
    }

    /// Last failure reason for the user's job, if any.
    pub async fn fail_reason(&self, id: UserId) -> Option<String> {
        let state = self.state.read().await;
        state
            .users
            .get(&id)
            .filter(|record| !record.fail_reason.is_empty())
            .map(|record| record.fail_reason.clone())
    }

    /// Options from the user's most recent submission.
    pub async fn options(&self, id: UserId) -> Result<Option<RenderOptions>, StoreError> {
        let state = self.state.read().await;
        state
            .users
            .get(&id)
            .map(|record| record.options.clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// Snapshot of the user's full record.
    pub async fn record(&self, id: UserId) -> Result<UserRecord, StoreError> {
        let state = self.state.read().await;
        state.users.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    /// Start a render job: validate the move to `Running`, run `stage` to
    /// write the job's input files, persist the record, and commit, all under
    /// the exclusive lock.
    ///
    /// `stage` runs only after the move is validated, with the output
    /// directory in place. Holding the lock across staging means a concurrent
    /// caller losing the race cannot overwrite the inputs of a job that just
    /// started; it gets `InvalidTransition` and writes nothing. A staging or
    /// persistence failure reverts the markers and leaves the in-memory view
    /// at its prior value.
    pub async fn begin_job<F>(
        &self,
        id: UserId,
        options: RenderOptions,
        stage: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(&UserDir) -> std::io::Result<()>,
    {
        let mut state = self.state.write().await;
        let current = state.users.get(&id).ok_or(StoreError::NotFound(id))?;
        let from = current.state;
        if !from.can_transition(JobState::Running) {
            return Err(StoreError::InvalidTransition {
                from,
                to: JobState::Running,
            });
        }

        let dir = self.user_dir(id);
        let prior_reason = current.fail_reason.clone();
        let mut updated = current.clone();
        updated.state = JobState::Running;
        updated.fail_reason = String::new();
        updated.options = Some(options);

        apply_markers(&dir, JobState::Running, "")?;
        let staged = stage(&dir)
            .map_err(StoreError::from)
            .and_then(|()| save_record(&dir, &updated));
        if let Err(err) = staged {
            let _ = apply_markers(&dir, from, &prior_reason);
            return Err(err);
        }

        state.users.insert(id, updated);
        debug!(user = id, from = %from, "job staged and running");
        Ok(())
    }

    /// Move a user's job to `next`, recording `options` (when given) and the
    /// failure `reason`.
    ///
    /// The move is validated against the lifecycle table, the markers and the
    /// durable record are written, and only then does the in-memory view
    /// change. A persistence failure leaves the in-memory state at its prior
    /// value, so a retry is safe and no reader sees a half-applied update.
    pub async fn transition(
        &self,
        id: UserId,
        next: JobState,
        options: Option<RenderOptions>,
        reason: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let current = state.users.get(&id).ok_or(StoreError::NotFound(id))?;
        let from = current.state;
        if !from.can_transition(next) {
            return Err(StoreError::InvalidTransition { from, to: next });
        }

        let dir = self.user_dir(id);
        if from == JobState::Running && next == JobState::Idle && !dir.has_artifact() {
            // Success without a published artifact is not a success.
            return Err(StoreError::InvalidTransition { from, to: next });
        }

        apply_markers(&dir, next, reason)?;

        let prior_reason = current.fail_reason.clone();
        let mut updated = current.clone();
        updated.state = next;
        updated.fail_reason = reason.to_string();
        if let Some(opts) = options {
            updated.options = Some(opts);
        }

        if let Err(err) = save_record(&dir, &updated) {
            // Put the markers back in line with the state we are keeping.
            let _ = apply_markers(&dir, from, &prior_reason);
            return Err(err);
        }

        state.users.insert(id, updated);
        debug!(user = id, from = %from, to = %next, "job transition");
        Ok(())
    }
}

/// Bring the marker files in line with `state`. Markers are the view the
/// presentation layer and the recovery scanner read, so they change in the
/// same locked section as the record.
fn apply_markers(dir: &UserDir, state: JobState, reason: &str) -> Result<(), StoreError> {
    match state {
        JobState::Running => {
            dir.clear_error_markers()?;
            dir.ensure_output()?;
        }
        JobState::Failed => {
            dir.write_error_marker(reason)?;
        }
        JobState::Idle => {
            dir.remove_output()?;
            dir.clear_error_markers()?;
        }
    }
    Ok(())
}

//! Startup recovery: rebuild the session store from disk and resume any job
//! a crash left running.
//!
//! Runs once, synchronously, before the store accepts traffic. The marker
//! files are the only truth that survives a crash, so the job state of each
//! recovered user comes from them rather than from the stored state tag.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::render::RenderOptions;
use crate::store::record::load_record;
use crate::store::sessions::SessionStore;
use crate::store::{JobState, UserDir, UserId};

/// Seam through which the scanner re-launches an interrupted render job.
/// The render service is the production implementation; tests substitute
/// a recorder.
pub trait JobLauncher: Send + Sync {
    /// Start the user's render job in the background, reusing the job
    /// configuration staged on disk before the crash. `options` is the
    /// persisted copy from the user's record, when one was recorded.
    fn launch(&self, store: Arc<SessionStore>, id: UserId, options: Option<RenderOptions>);
}

/// Scan `root`, rebuild the store, and hand every user still marked running
/// to `launcher` exactly once.
///
/// Subdirectories whose names do not parse as user ids, and directories whose
/// record cannot be decoded, are unrecoverable orphans: they are deleted so
/// they cannot block startup or shadow a future id. Failure to enumerate the
/// root itself is fatal; there is no partial-store mode.
pub fn recover(root: impl Into<PathBuf>, launcher: &dyn JobLauncher) -> Result<Arc<SessionStore>> {
    let root = root.into();
    fs::create_dir_all(&root)
        .with_context(|| format!("failed to create state root {}", root.display()))?;

    let mut users: HashMap<UserId, _> = HashMap::new();
    let mut tokens: HashMap<String, UserId> = HashMap::new();
    let mut last_id: UserId = 0;
    let mut resume: Vec<(UserId, Option<RenderOptions>)> = Vec::new();

    let entries = fs::read_dir(&root)
        .with_context(|| format!("failed to read state root {}", root.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read state root {}", root.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let id = match entry.file_name().to_str().and_then(|s| s.parse::<UserId>().ok()) {
            Some(id) => id,
            None => {
                warn!(path = %path.display(), "removing non-user directory from state root");
                remove_orphan(&path);
                continue;
            }
        };

        let dir = UserDir::new(&root, id);
        let mut record = match load_record(&dir) {
            Ok(record) => record,
            Err(err) => {
                warn!(user = id, error = %err, "discarding corrupt user directory");
                remove_orphan(&path);
                continue;
            }
        };

        // Markers survive a crash; the record's state tag may not have
        // caught up with the last moment before process death.
        record.state = dir.marker_state();
        if record.state == JobState::Running {
            resume.push((id, record.options.clone()));
        }

        if let Some(previous) = tokens.insert(record.token.clone(), id) {
            warn!(user = id, shadowed = previous, "duplicate token on disk; newest directory wins");
        }
        users.insert(id, record);
        last_id = last_id.max(id);
    }

    info!(users = users.len(), resuming = resume.len(), root = %root.display(), "session store recovered");

    let store = Arc::new(SessionStore::from_scan(root, users, tokens, last_id));
    for (id, options) in resume {
        info!(user = id, "resuming render job interrupted by restart");
        launcher.launch(Arc::clone(&store), id, options);
    }
    Ok(store)
}

fn remove_orphan(path: &std::path::Path) {
    if let Err(err) = fs::remove_dir_all(path) {
        warn!(path = %path.display(), error = %err, "failed to remove orphaned directory");
    }
}

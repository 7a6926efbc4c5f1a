//! On-disk layout of a single user's state directory.
//!
//! Each user owns `<root>/<decimal id>`. Besides the durable record file,
//! the directory carries marker files whose presence encodes job state, so
//! that state survives a crash and the presentation layer can answer
//! "is there a video?" with a plain existence check:
//!
//! - `output/` exists        => a render job is running (inputs are staged here)
//! - `error` or `output/error` => the last render failed
//! - `v.mp4`                 => the most recent successful artifact

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::store::{JobState, UserId};

/// Durable record file name inside a user directory.
pub const RECORD_FILE: &str = "user-record";

const OUTPUT_DIR: &str = "output";
const ERROR_MARKER: &str = "error";
const ARTIFACT_FILE: &str = "v.mp4";
const TRACK_FILE: &str = "g2v.gpx";
const CONFIG_FILE: &str = "config.ini";
const PHOTOS_DIR: &str = "photos";

/// Path helper for one user's directory under the state root.
#[derive(Debug, Clone)]
pub struct UserDir {
    path: PathBuf,
}

impl UserDir {
    pub fn new(root: &Path, id: UserId) -> Self {
        Self {
            path: root.join(id.to_string()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_path(&self) -> PathBuf {
        self.path.join(RECORD_FILE)
    }

    pub(crate) fn record_temp_path(&self) -> PathBuf {
        self.path.join(format!("{RECORD_FILE}.tmp"))
    }

    /// Working directory for a render job; its existence marks the job running.
    pub fn output_dir(&self) -> PathBuf {
        self.path.join(OUTPUT_DIR)
    }

    /// GPX track file staged for the renderer.
    pub fn track_path(&self) -> PathBuf {
        self.output_dir().join(TRACK_FILE)
    }

    /// Key/value config file staged for the renderer.
    pub fn config_path(&self) -> PathBuf {
        self.output_dir().join(CONFIG_FILE)
    }

    /// Where the renderer leaves the finished video.
    pub fn output_artifact_path(&self) -> PathBuf {
        self.output_dir().join(ARTIFACT_FILE)
    }

    /// Where a successful job's video is published for serving.
    pub fn artifact_path(&self) -> PathBuf {
        self.path.join(ARTIFACT_FILE)
    }

    pub fn error_marker(&self) -> PathBuf {
        self.path.join(ERROR_MARKER)
    }

    pub fn output_error_marker(&self) -> PathBuf {
        self.output_dir().join(ERROR_MARKER)
    }

    /// User-managed photo uploads.
    pub fn photos_dir(&self) -> PathBuf {
        self.path.join(PHOTOS_DIR)
    }

    /// Photos fetched into the job working directory.
    pub fn output_photos_dir(&self) -> PathBuf {
        self.output_dir().join(PHOTOS_DIR)
    }

    /// Derive the job state from marker presence alone.
    ///
    /// The error marker wins over a leftover `output/` directory, so a failed
    /// job reads as `Failed` until the next submission clears it. During
    /// recovery these markers are the only truth available; everywhere else
    /// they are a view kept in sync with the record.
    pub fn marker_state(&self) -> JobState {
        if self.error_marker().exists() || self.output_error_marker().exists() {
            JobState::Failed
        } else if self.output_dir().exists() {
            JobState::Running
        } else {
            JobState::Idle
        }
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact_path().exists()
    }

    pub fn ensure_output(&self) -> io::Result<()> {
        fs::create_dir_all(self.output_dir())
    }

    pub fn remove_output(&self) -> io::Result<()> {
        let dir = self.output_dir();
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Record a failure reason as the crash-survivable error marker.
    pub fn write_error_marker(&self, reason: &str) -> io::Result<()> {
        fs::write(self.error_marker(), reason)
    }

    pub fn clear_error_markers(&self) -> io::Result<()> {
        for marker in [self.error_marker(), self.output_error_marker()] {
            if marker.exists() {
                fs::remove_file(marker)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn user_dir(root: &TempDir) -> UserDir {
        let dir = UserDir::new(root.path(), 7);
        fs::create_dir_all(dir.path()).unwrap();
        dir
    }

    #[test]
    fn test_fresh_directory_is_idle() {
        let root = TempDir::new().unwrap();
        let dir = user_dir(&root);
        assert_eq!(dir.marker_state(), JobState::Idle);
        assert!(!dir.has_artifact());
    }

    #[test]
    fn test_output_directory_marks_running() {
        let root = TempDir::new().unwrap();
        let dir = user_dir(&root);
        dir.ensure_output().unwrap();
        assert_eq!(dir.marker_state(), JobState::Running);
    }

    #[test]
    fn test_error_marker_wins_over_output() {
        let root = TempDir::new().unwrap();
        let dir = user_dir(&root);
        dir.ensure_output().unwrap();
        dir.write_error_marker("renderer exploded").unwrap();
        assert_eq!(dir.marker_state(), JobState::Failed);

        dir.clear_error_markers().unwrap();
        assert_eq!(dir.marker_state(), JobState::Running);
        dir.remove_output().unwrap();
        assert_eq!(dir.marker_state(), JobState::Idle);
    }

    #[test]
    fn test_error_marker_inside_output_counts() {
        let root = TempDir::new().unwrap();
        let dir = user_dir(&root);
        dir.ensure_output().unwrap();
        fs::write(dir.output_error_marker(), "boom").unwrap();
        assert_eq!(dir.marker_state(), JobState::Failed);
    }

    #[test]
    fn test_artifact_detection() {
        let root = TempDir::new().unwrap();
        let dir = user_dir(&root);
        fs::write(dir.artifact_path(), b"video").unwrap();
        assert!(dir.has_artifact());
        assert_eq!(dir.marker_state(), JobState::Idle);
    }
}

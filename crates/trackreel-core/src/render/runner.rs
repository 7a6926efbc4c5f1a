//! Render job submission and the background task that drives the external
//! renderer.
//!
//! The renderer is an opaque subprocess: it reads the staged config file and
//! either leaves a video in the job's output directory or fails. Success is
//! detected by one sentinel string in its combined output; that sentinel is
//! part of the renderer's contract and must not change.

use std::fs;
use std::sync::Arc;

use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::StoreError;
use crate::render::options::{OptionsError, RenderOptions};
use crate::store::{JobLauncher, JobState, SessionStore, UserDir, UserId};
use crate::track::{self, TrackPoint};

/// The renderer prints this when, and only when, it produced a video.
pub const SUCCESS_MARKER: &str = "视频生成成功";

/// Combined renderer output is clipped to this much in failure reasons.
const MAX_REASON_OUTPUT: usize = 500;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Launches and supervises render jobs. Holds no job handles: once spawned,
/// a job's only contact with the rest of the system is the terminal
/// transition it reports through the store.
pub struct RenderService {
    config: Arc<Config>,
}

impl RenderService {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Validate, stage the job inputs, commit the `Running` transition, and
    /// start the render in the background.
    ///
    /// Staging and the transition happen inside one exclusive-lock section in
    /// the store, so a concurrent submission for the same user can never
    /// overwrite the inputs of a job that just started; the loser gets
    /// `InvalidTransition` and writes nothing. The track and config files are
    /// fully written before the transition commits, so a job resumed after a
    /// crash always sees consistent inputs.
    pub async fn submit(
        &self,
        store: &Arc<SessionStore>,
        id: UserId,
        options: RenderOptions,
        points: &[TrackPoint],
    ) -> Result<(), SubmitError> {
        options.validate()?;

        let gpx = track::write_gpx(points);
        let staged = options.clone();
        let config = Arc::clone(&self.config);
        store
            .begin_job(id, options, |dir| {
                fs::write(dir.track_path(), &gpx)?;
                fs::write(dir.config_path(), staged.config_file(&config, dir))
            })
            .await?;

        info!(user = id, "render job started");
        self.spawn_job(Arc::clone(store), id);
        Ok(())
    }

    /// Fire-and-forget: the spawned task reports back through
    /// `SessionStore::transition` and nothing else.
    fn spawn_job(&self, store: Arc<SessionStore>, id: UserId) {
        let config = Arc::clone(&self.config);
        tokio::spawn(async move {
            run_job(config, store, id).await;
        });
    }
}

impl JobLauncher for RenderService {
    fn launch(&self, store: Arc<SessionStore>, id: UserId, options: Option<RenderOptions>) {
        info!(
            user = id,
            track = options.as_ref().map(|o| o.track_id),
            "relaunching render job from staged inputs"
        );
        self.spawn_job(store, id);
    }
}

async fn run_job(config: Arc<Config>, store: Arc<SessionStore>, id: UserId) {
    let dir = store.user_dir(id);
    let (next, reason) = match run_renderer(&config, &dir).await {
        Ok(()) => (JobState::Idle, String::new()),
        Err(reason) => {
            warn!(user = id, reason = %reason, "render job failed");
            (JobState::Failed, reason)
        }
    };

    if let Err(err) = store.transition(id, next, None, &reason).await {
        // Nothing upstream to hand this to; the job is already finished.
        error!(user = id, error = %err, "failed to record render outcome");
    }
}

/// Run the external renderer to completion and publish the artifact.
/// The error value is the human-readable failure reason recorded with the
/// `Failed` state.
async fn run_renderer(config: &Config, dir: &UserDir) -> Result<(), String> {
    let output = Command::new(&config.renderer_command)
        .arg(&config.renderer_script)
        .arg(dir.config_path())
        .output()
        .await
        .map_err(|err| format!("failed to launch renderer: {err}"))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(format!(
            "renderer exited with {}: {}",
            output.status,
            clip(&combined)
        ));
    }
    if !combined.contains(SUCCESS_MARKER) {
        return Err(format!(
            "renderer did not report success: {}",
            clip(&combined)
        ));
    }

    // The artifact must be in place before the job is committed back to idle.
    fs::rename(dir.output_artifact_path(), dir.artifact_path())
        .map_err(|err| format!("failed to publish rendered video: {err}"))?;
    Ok(())
}

fn clip(output: &str) -> &str {
    let output = output.trim();
    if output.len() <= MAX_REASON_OUTPUT {
        return output;
    }
    let mut end = MAX_REASON_OUTPUT;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    &output[..end]
}

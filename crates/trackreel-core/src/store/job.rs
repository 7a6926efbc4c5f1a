//! Render job lifecycle states and the legal moves between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a user's render job. There is no terminal state; the machine
/// cycles for the life of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// No render in progress. A previous artifact may still exist.
    Idle,
    /// Exactly one render subprocess has been launched and has not reported back.
    Running,
    /// The last render reported a failure; the reason is recorded alongside.
    Failed,
}

impl JobState {
    /// Whether moving from `self` to `next` is a legal lifecycle step.
    ///
    /// Submission (`Idle`/`Failed` -> `Running`) is the only entry into a job,
    /// and a job that is already `Running` rejects it, which is what enforces
    /// at-most-one-job-per-user. Only a `Running` job can settle to `Idle`
    /// (success) or `Failed`.
    pub fn can_transition(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Idle, JobState::Running)
                | (JobState::Failed, JobState::Running)
                | (JobState::Running, JobState::Idle)
                | (JobState::Running, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_enters_running() {
        assert!(JobState::Idle.can_transition(JobState::Running));
        assert!(JobState::Failed.can_transition(JobState::Running));
    }

    #[test]
    fn test_running_settles_to_idle_or_failed() {
        assert!(JobState::Running.can_transition(JobState::Idle));
        assert!(JobState::Running.can_transition(JobState::Failed));
    }

    #[test]
    fn test_running_rejects_resubmission() {
        assert!(!JobState::Running.can_transition(JobState::Running));
    }

    #[test]
    fn test_no_other_moves() {
        assert!(!JobState::Idle.can_transition(JobState::Idle));
        assert!(!JobState::Idle.can_transition(JobState::Failed));
        assert!(!JobState::Failed.can_transition(JobState::Idle));
        assert!(!JobState::Failed.can_transition(JobState::Failed));
    }

    #[test]
    fn test_serialized_form_is_stable() {
        let json = serde_json::to_string(&JobState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let back: JobState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, JobState::Running);
    }
}

//! Durable job/session state for the render service.
//!
//! This module is the authority every other component calls through:
//!
//! - `SessionStore`: concurrent token-to-user index and per-user job state
//! - `JobState`: the render job lifecycle and its legal transitions
//! - `UserRecord` + codec: the per-user state persisted to disk
//! - `UserDir`: the on-disk directory layout and its state markers
//! - `recover`: the startup scan that rehydrates the store after a crash

pub mod job;
pub mod layout;
pub mod record;
pub mod recovery;
pub mod sessions;

pub use job::JobState;
pub use layout::UserDir;
pub use record::{load_record, save_record, UserRecord};
pub use recovery::{recover, JobLauncher};
pub use sessions::{SessionStore, UserId};

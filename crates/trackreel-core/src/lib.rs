//! trackreel core - durable job/session state for a GPS-track render service.
//!
//! An authenticated user submits a GPS track plus rendering options; a
//! long-running external renderer turns them into a video. This crate owns
//! the hard part of that service: the concurrent session store mapping
//! bearer tokens to stable user ids, the per-user state persisted to disk,
//! the render job lifecycle, and the crash recovery that resumes in-flight
//! jobs after a restart. HTTP routing, OAuth exchange, and the renderer's
//! internals live elsewhere.

pub mod config;
pub mod error;
pub mod render;
pub mod store;
pub mod track;

pub use config::Config;
pub use error::StoreError;
pub use render::{RenderOptions, RenderService};
pub use store::{recover, JobState, SessionStore};
pub use track::TrackPoint;

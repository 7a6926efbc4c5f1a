//! Integration with the external render collaborator.
//!
//! This module provides:
//! - `RenderOptions`: validated, persistable rendering parameters
//! - config file generation in the renderer's `[required]`/`[optional]` format
//! - `RenderService`: staging, submission, and the background job that runs
//!   the renderer subprocess and reports its outcome back to the store

pub mod options;
pub mod runner;

pub use options::{OptionsError, PhotoSource, RenderOptions, MAX_VIDEO_DIMENSION};
pub use runner::{RenderService, SubmitError, SUCCESS_MARKER};

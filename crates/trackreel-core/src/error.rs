use std::io;

use thiserror::Error;

use crate::store::JobState;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown user {0}")]
    NotFound(u64),

    #[error("illegal job transition from {from} to {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("corrupt user record: {0}")]
    Corrupt(String),

    #[error("failed to persist user state: {0}")]
    Persist(#[from] io::Error),
}

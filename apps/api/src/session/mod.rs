// Candidate session orchestration.
// The controller is the only writer; the store is passed in, never global.

pub mod controller;
pub mod handlers;
pub mod models;
pub mod pg_store;
pub mod store;
pub mod timer;

use thiserror::Error;

use crate::session::store::StoreError;

/// Error taxonomy for candidate-session actions.
///
/// `Validation` and `State` are raised before any mutation.
/// `Network` and `Parse` come from external boundaries (question fetch, submission).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid session state: {0}")]
    State(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

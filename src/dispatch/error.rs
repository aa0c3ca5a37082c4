//! Dispatch lifecycle errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn dispatch worker: {0}")]
    ThreadSpawn(String),

    #[error("no tokio runtime available for delivery: {0}")]
    NoRuntime(String),
}

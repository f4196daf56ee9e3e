//! Error type for simulation drivers.

use hazardwatch_core::SessionError;
use hazardwatch_env::SourceError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Source did not drain within {0:?}")]
    DrainTimeout(Duration),
}

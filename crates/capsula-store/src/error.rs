use std::path::PathBuf;

use capsula_core::{CaptureError, CodecError, ReconstructionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Opened for reading, but there is no container at this path.
    #[error("no container at {}", .0.display())]
    ContainerNotFound(PathBuf),

    #[error("group `{0}` not found")]
    GroupNotFound(String),

    #[error("slot `{slot}` not found in group `{group}`")]
    SlotNotFound { group: String, slot: String },

    /// The slot exists but does not hold a capsule.
    #[error("slot `{slot}` in group `{group}` is not a capsule")]
    NotACapsule { group: String, slot: String },

    #[error("stored literal is unreadable: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),
}

impl StoreError {
    /// True for a missing group or slot; callers may fall back to another slot.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::GroupNotFound(_) | StoreError::SlotNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

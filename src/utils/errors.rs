use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Title not found: {0}")]
    NotFound(String),

    #[error("Stream attachment failed: {0}")]
    Attachment(String),

    #[error("Progress could not be saved: {0}")]
    Persistence(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),
}

impl WatchError {
    /// Only a failed resume fetch is shown to the user; everything else is logged
    pub fn is_user_visible(&self) -> bool {
        matches!(self, WatchError::NotFound(_))
    }
}

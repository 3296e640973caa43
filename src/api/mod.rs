mod client;
mod errors;
mod progress;


pub use client::VideoflixApi;
pub use errors::ApiError;

use async_trait::async_trait;

use crate::models::{MovieSlug, ProgressRecord, ResumeRecord};

/// Backend operations the playback core depends on
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// `GET movie/progress/{slug}/`
    async fn fetch_progress(&self, slug: &MovieSlug) -> Result<ResumeRecord, ApiError>;

    /// `PATCH movie/progress/{slug}/`
    async fn update_progress(
        &self,
        slug: &MovieSlug,
        record: ProgressRecord,
    ) -> Result<(), ApiError>;
}

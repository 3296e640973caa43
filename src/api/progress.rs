use async_trait::async_trait;
use tracing::debug;

use super::ProgressApi;
use super::client::VideoflixApi;
use super::errors::ApiError;
use crate::models::{MovieSlug, ProgressRecord, ResumeRecord};

#[async_trait]
impl ProgressApi for VideoflixApi {
    async fn fetch_progress(&self, slug: &MovieSlug) -> Result<ResumeRecord, ApiError> {
        let url = self.progress_url(slug)?;
        debug!("Fetching resume record from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response
            .json::<ResumeRecord>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn update_progress(
        &self,
        slug: &MovieSlug,
        record: ProgressRecord,
    ) -> Result<(), ApiError> {
        let url = self.progress_url(slug)?;
        debug!(
            "Updating progress for {} - position: {}s, finished: {}",
            slug,
            record.position_seconds(),
            record.is_finished()
        );

        let response = self
            .client
            .patch(url)
            .json(&record)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        // Response body is ignored; only the status matters for logging
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }
}

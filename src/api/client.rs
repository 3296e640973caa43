use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::fmt;
use tracing::debug;
use url::Url;

use super::errors::ApiError;
use crate::config::ApiConfig;
use crate::constants::MOVIE_PROGRESS_ENDPOINT;
use crate::models::MovieSlug;

/// Characters escaped when a slug is used as a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// HTTP client for the Videoflix REST backend.
///
/// The underlying client keeps a cookie store so every call carries the
/// session credentials set at login.
#[derive(Clone)]
pub struct VideoflixApi {
    pub(super) client: reqwest::Client,
    base_url: Url,
}

impl fmt::Debug for VideoflixApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoflixApi")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl VideoflixApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ApiError::from_reqwest)?;

        let base_url = Self::parse_base_url(&config.base_url)?;
        debug!("Videoflix API client created for {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `Url::join` drops the last segment unless the base ends in a slash
    fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{}/", raw)
        };
        Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    pub(super) fn progress_url(&self, slug: &MovieSlug) -> Result<Url, ApiError> {
        if slug.is_empty() {
            return Err(ApiError::InvalidUrl("empty movie slug".to_string()));
        }
        let segment = utf8_percent_encode(slug.as_str(), PATH_SEGMENT);
        let path = format!("{}{}/", MOVIE_PROGRESS_ENDPOINT, segment);
        self.base_url
            .join(&path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    pub(super) async fn error_from_response(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, body)
    }
}

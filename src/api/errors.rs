use thiserror::Error;

/// Typed error enum for Videoflix REST calls
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Unknown slug (404) or a resource the user may not see
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session expired or credentials rejected (401, 403)
    #[error("Unauthorized: {message} (status: {status})")]
    Unauthorized { status: u16, message: String },

    /// Server error (500+)
    #[error("Server error: {message} (status: {status})")]
    Server { status: u16, message: String },

    /// Client error (400-499, excluding the cases above)
    #[error("Client error: {message} (status: {status})")]
    Client { status: u16, message: String },

    /// Network/connection errors (timeout, connection refused, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// JSON parsing errors
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Base URL or path could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Create an error from a reqwest error
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::Parse(error.to_string())
        } else if error.is_timeout() {
            ApiError::Network(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            ApiError::Network(format!("Connection failed: {}", error))
        } else {
            ApiError::Network(error.to_string())
        }
    }

    /// Create an error from an HTTP status code and response body
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => ApiError::NotFound(body),
            401 | 403 => ApiError::Unauthorized {
                status,
                message: body,
            },
            400..=499 => ApiError::Client {
                status,
                message: body,
            },
            _ => ApiError::Server {
                status,
                message: body,
            },
        }
    }
}

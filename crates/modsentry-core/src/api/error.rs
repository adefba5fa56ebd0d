use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other 4xx; the full body is kept for field-error extraction
    #[error("Request rejected (status {status}): {}", truncate_body(.body))]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncate_body(body)),
            404 => ApiError::NotFound(truncate_body(body)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncate_body(body)),
            code => ApiError::Rejected {
                status: code,
                body: body.to_string(),
            },
        }
    }

    /// Parsed JSON body of a rejected request, if it carried one
    pub fn body_json(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Rejected { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

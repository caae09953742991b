use thiserror::Error;

/// API gateway error taxonomy
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials rejected and refresh did not rescue the call
    #[error("{0}")]
    Unauthorized(String),

    /// Request was malformed or failed field validation (400/422)
    #[error("{0}")]
    Validation(String),

    /// Any other non-success status
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection, DNS, or timeout failure before a response arrived
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// User-displayable message, without status plumbing
    pub fn message(&self) -> String {
        match self {
            ApiError::Unauthorized(m) | ApiError::Validation(m) => m.clone(),
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Network(_) => "Network error, please try again".to_string(),
            ApiError::Decode(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// Build an error from a non-success response, pulling the backend's
    /// `detail` field out of the body when present
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = extract_detail(&body);

        match status {
            401 => ApiError::Unauthorized(message),
            400 | 422 => ApiError::Validation(message),
            _ => ApiError::Status { status, message },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Extract a clean message from a backend error body.
///
/// The backend reports errors as `{"detail": "..."}` or, for field
/// validation, `{"detail": [{"msg": "..."}, ...]}`.
pub fn extract_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(serde_json::Value::Array(items)) => {
                return items
                    .first()
                    .and_then(|item| item.get("msg"))
                    .and_then(|msg| msg.as_str())
                    .unwrap_or("Validation error")
                    .to_string();
            }
            _ => {}
        }
    }

    if body.trim().is_empty() {
        "An unexpected error occurred".to_string()
    } else {
        body.trim().to_string()
    }
}

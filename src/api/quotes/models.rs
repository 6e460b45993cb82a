use serde::{Deserialize, Serialize};

use crate::utils::errors::WatchError;

/// Error body some quote services return alongside a non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
    pub message: Option<String>,
}

/// 429 body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResponse {
    pub message: Option<String>,
    pub retry_after: Option<i64>,
}

/// Error type for HTTP collaborators (quote API and webhook)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 401 Unauthorized
    Unauthorized(String),
    /// 403 Forbidden
    Forbidden(String),
    /// 404 Not Found
    NotFound(String),
    /// 429 Too Many Requests
    RateLimited { retry_after: i64 },
    /// 5xx Server Error
    ServerError(u16, String),
    /// Other HTTP errors
    HttpError(u16, String),
    /// Network/request error
    RequestError(String),
    /// Body was not the expected JSON
    DeserializationError(String),
}

impl ApiError {
    /// Map a non-success status and its body text to an error
    pub fn from_status(status: u16, body_text: String) -> Self {
        let message = serde_json::from_str::<ErrorResponse>(&body_text)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or_else(|| body_text.clone());

        match status {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            429 => {
                let retry_after = serde_json::from_str::<RateLimitResponse>(&body_text)
                    .ok()
                    .and_then(|r| r.retry_after)
                    .unwrap_or(1000);
                ApiError::RateLimited { retry_after }
            }
            500..=599 => ApiError::ServerError(status, message),
            _ => ApiError::HttpError(status, message),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::RateLimited { retry_after } => {
                write!(f, "Rate Limited. Retry after {} ms", retry_after)
            }
            ApiError::ServerError(code, msg) => write!(f, "Server Error ({}): {}", code, msg),
            ApiError::HttpError(code, msg) => write!(f, "HTTP Error ({}): {}", code, msg),
            ApiError::RequestError(msg) => write!(f, "Request Error: {}", msg),
            ApiError::DeserializationError(msg) => write!(f, "Deserialization Error: {}", msg),
        }
    }
}

impl From<ApiError> for WatchError {
    fn from(err: ApiError) -> Self {
        WatchError::Fetch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from_status(404, r#"{"message":"no such itinerary"}"#.to_string()),
            ApiError::NotFound("no such itinerary".to_string())
        );
        assert_eq!(
            ApiError::from_status(503, "down".to_string()),
            ApiError::ServerError(503, "down".to_string())
        );
        assert_eq!(
            ApiError::from_status(429, r#"{"retry_after":250}"#.to_string()),
            ApiError::RateLimited { retry_after: 250 }
        );
    }

    #[test]
    fn test_converts_to_fetch_error() {
        let err: WatchError = ApiError::RequestError("timed out".to_string()).into();
        assert!(matches!(err, WatchError::Fetch(msg) if msg.contains("timed out")));
    }
}

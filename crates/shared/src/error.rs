use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    Validation,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            502..=504 => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

/// User-facing error payload. Rendered inline, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Body shape the backend uses for non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    pub fn extract(body: &str) -> String {
        match serde_json::from_str::<ErrorDetail>(body) {
            Ok(ErrorDetail {
                detail: serde_json::Value::String(detail),
            }) => detail,
            Ok(ErrorDetail { detail }) => detail.to_string(),
            Err(_) => body.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_detail_or_falls_back_to_body() {
        assert_eq!(ErrorDetail::extract(r#"{"detail": "Quiz not found"}"#), "Quiz not found");
        assert_eq!(ErrorDetail::extract("  bad gateway \n"), "bad gateway");
    }

    #[test]
    fn maps_status_codes() {
        assert_eq!(ErrorCode::from_status(404), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_status(403), ErrorCode::Unauthorized);
        assert_eq!(ErrorCode::from_status(503), ErrorCode::Unavailable);
        assert_eq!(ErrorCode::from_status(500), ErrorCode::Internal);
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geoshift_core::error::{ErrorKind, GeoshiftError};
use serde::Serialize;

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Validation failures carry their own reason; processing failures get a
/// generic message with the cause attached.
impl From<GeoshiftError> for ApiError {
    fn from(err: GeoshiftError) -> Self {
        match err.kind() {
            ErrorKind::Validation => Self::bad_request(err.to_string()),
            ErrorKind::NotFound => Self::not_found("Not found").with_details(err.to_string()),
            ErrorKind::Processing => Self::internal("Processing failed").with_details(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_error_kind() {
        let missing = GeoshiftError::MissingBundleFiles { missing: vec![".prj".to_string()] };
        let err = ApiError::from(missing);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Missing required files: .prj");

        let absent = ApiError::from(GeoshiftError::ArchiveNotFound { request_id: "x".to_string() });
        assert_eq!(absent.status, StatusCode::NOT_FOUND);

        let failed = ApiError::from(GeoshiftError::UndefinedCrs);
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(failed.details.unwrap().contains("undefined"));
    }
}

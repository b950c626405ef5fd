#[cfg(feature = "web")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Main error type for the application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding/encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 payloads that cannot be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upload errors
    #[error("Upload error: {0}")]
    UploadError(String),

    /// The reference catalog produced no usable entries
    #[error("동물 데이터베이스가 비어있습니다. 카탈로그 폴더에 이미지를 추가해주세요.")]
    EmptyCatalog,

    /// Embedding or classification model failures
    #[error("Model error: {0}")]
    Model(String),

    /// Face-match analysis failed; carries the underlying error text
    #[error("분석 중 오류: {0}")]
    Analysis(String),

    /// Internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Standard error response format
#[derive(Serialize)]
#[derive(Debug)]
pub struct ErrorResponse {
    /// Always `false` for errors
    pub success: bool,
    /// Error code (HTTP status code)
    pub code: u16,
    /// Error message
    pub error: String,
}

impl AppError {
    /// Wrap any displayable model/runtime failure.
    pub fn model<E: std::fmt::Display>(err: E) -> Self {
        AppError::Model(err.to_string())
    }

    #[cfg(feature = "web")]
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UploadError(_) => StatusCode::BAD_REQUEST,
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert the error to a JSON response
    pub fn to_json(&self) -> ErrorResponse {
        #[cfg(feature = "web")]
        let code = self.status_code().as_u16();
        #[cfg(not(feature = "web"))]
        let code = 500u16;

        ErrorResponse {
            success: false,
            code,
            error: self.to_string(),
        }
    }
}

#[cfg(feature = "web")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::debug!("Rejected request: {}", self);
        }
        let response = self.to_json();

        (status, Json(response)).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Task join error: {}", err))
    }
}

#[cfg(feature = "web")]
impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::UploadError(err.to_string())
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::Model(format!("ONNX runtime error: {}", err))
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Extension trait for working with Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context to an error if the result is an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| AppError::Internal(format!("{}: {}", context, e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            let context = f();
            AppError::Internal(format!("{}: {}", context, e))
        })
    }
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::EmptyCatalog.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Analysis("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_analysis_error_keeps_underlying_text() {
        let json = AppError::Analysis("model exploded".into()).to_json();
        assert!(!json.success);
        assert_eq!(json.code, 500);
        assert!(json.error.contains("model exploded"));
    }
}

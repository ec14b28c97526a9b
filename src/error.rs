#[cfg(feature = "api")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which input of a comparison an image plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    /// Trusted genuine image for the embedding check.
    Anchor,
    /// Image under test, for either check.
    Candidate,
    /// Trusted sharp crop for the sharpness check.
    Reference,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anchor => "anchor",
            Self::Candidate => "candidate",
            Self::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// Main error type for the application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The image path does not exist
    #[error("{role} image not found at {}", path.display())]
    ImageNotFound {
        /// Which input was missing.
        role: ImageRole,
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The image exists but could not be decoded into a pixel grid
    #[error("could not decode {role} image {origin}: {source}")]
    ImageDecode {
        /// Which input failed to decode.
        role: ImageRole,
        /// Path or upload name of the input.
        origin: String,
        /// Underlying decoder error.
        source: image::ImageError,
    },

    /// The embedding model is missing or cannot be loaded
    #[error("could not load embedding model {}: {reason}", path.display())]
    ModelLoad {
        /// Model artifact path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// An embedding had zero (or non-finite) norm and cannot be normalized
    #[error("{role} embedding has zero norm and cannot be normalized")]
    DegenerateVector {
        /// Which input produced the vector.
        role: ImageRole,
    },

    /// The reference image has no measurable sharpness
    #[error("reference sharpness score is zero (blank or flat reference image)")]
    ZeroReferenceScore,

    /// The model returned vectors of different lengths
    #[error("embedding dimensions differ: anchor {anchor}, candidate {candidate}")]
    DimensionMismatch {
        /// Anchor vector length.
        anchor: usize,
        /// Candidate vector length.
        candidate: usize,
    },

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Standard error response format
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Error code (HTTP status code)
    pub code: u16,
    /// Machine readable error kind
    pub kind: &'static str,
    /// Error message
    pub message: String,
    /// The input at fault, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ImageRole>,
}

impl AppError {
    /// Short identifier for the error kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ImageNotFound { .. } => "image_not_found",
            Self::ImageDecode { .. } => "image_decode",
            Self::ModelLoad { .. } => "model_load",
            Self::DegenerateVector { .. } => "degenerate_vector",
            Self::ZeroReferenceScore => "zero_reference_score",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Config(_) => "config",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    /// The input image responsible for the failure, if any.
    pub fn role(&self) -> Option<ImageRole> {
        match self {
            Self::ImageNotFound { role, .. }
            | Self::ImageDecode { role, .. }
            | Self::DegenerateVector { role } => Some(*role),
            Self::ZeroReferenceScore => Some(ImageRole::Reference),
            _ => None,
        }
    }

    #[cfg(feature = "api")]
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ImageNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ImageDecode { .. }
            | Self::DegenerateVector { .. }
            | Self::ZeroReferenceScore
            | Self::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ModelLoad { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert the error to a JSON response
    pub fn to_json(&self) -> ErrorResponse {
        #[cfg(feature = "api")]
        let code = self.status_code().as_u16();
        #[cfg(not(feature = "api"))]
        let code = 500u16;

        ErrorResponse {
            code,
            kind: self.kind(),
            message: self.to_string(),
            role: self.role(),
        }
    }
}

#[cfg(feature = "api")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        } else {
            log::warn!("request rejected: {}", self);
        }

        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(feature = "api")]
impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Task join error: {}", err))
    }
}

#[cfg(feature = "api")]
impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::InvalidInput(format!("malformed multipart body: {}", err))
    }
}

#[cfg(feature = "torch")]
impl From<tch::TchError> for AppError {
    fn from(err: tch::TchError) -> Self {
        AppError::Internal(format!("PyTorch error: {}", err))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_faulty_input() {
        let err = AppError::ImageNotFound {
            role: ImageRole::Candidate,
            path: PathBuf::from("missing.jpg"),
        };
        assert_eq!(err.role(), Some(ImageRole::Candidate));
        assert_eq!(err.kind(), "image_not_found");
        assert_eq!(err.to_string(), "candidate image not found at missing.jpg");

        assert_eq!(AppError::ZeroReferenceScore.role(), Some(ImageRole::Reference));
        assert_eq!(AppError::Config("x".into()).role(), None);
    }

    #[cfg(feature = "api")]
    #[test]
    fn test_status_codes() {
        let not_found = AppError::ImageNotFound {
            role: ImageRole::Anchor,
            path: PathBuf::from("a.jpg"),
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::DegenerateVector { role: ImageRole::Anchor }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::ModelLoad { path: PathBuf::from("m.pt"), reason: "missing".into() }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        let body = AppError::ZeroReferenceScore.to_json();
        assert_eq!(body.code, 422);
        assert_eq!(body.kind, "zero_reference_score");
        assert_eq!(body.role, Some(ImageRole::Reference));
    }

    #[test]
    fn test_json_error_conversion() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.kind(), "json");
        assert_eq!(err.role(), None);
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn test_result_ext_context() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = res.context("reading config").unwrap_err();
        assert_eq!(err.to_string(), "Internal error: reading config: boom");
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Envelope for successful API payloads
#[derive(Serialize, Debug)]
pub struct ApiResponse<T: Serialize> {
    /// Always `true`; failures are rendered from `AppError`
    pub success: bool,
    /// Response payload
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a payload
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

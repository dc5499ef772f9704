//! HTTP error mapping for `CampError`.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use camp_core::{CampError, FieldError, ValidationError};
use serde::Serialize;
use tracing::error;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable machine code (`"full"`, `"validation"`, ...)
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waitlist: Option<String>,
}

/// A `CampError` on its way to the client
#[derive(Debug)]
pub struct ApiError {
    pub error: CampError,
    pub status: StatusCode,
    pub waitlist: Option<String>,
}

impl ApiError {
    /// Answer with `status` instead of the error's own code
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_waitlist(mut self, message: Option<String>) -> Self {
        self.waitlist = message;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        CampError::Validation(ValidationError::new(message)).into()
    }
}

/// `Json` body extractor whose rejections answer in the API error shape
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        CampError::Validation(ValidationError::with_details(
            "Invalid request body",
            vec![FieldError::new("body", rejection.body_text())],
        ))
        .into()
    }
}

impl From<CampError> for ApiError {
    fn from(error: CampError) -> Self {
        let status = StatusCode::from_u16(error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            error,
            status,
            waitlist: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            error!(error = %self.error, "Request failed");
            "Internal server error".to_string()
        } else {
            self.error.to_string()
        };

        let details = match &self.error {
            CampError::Validation(v) if !v.details.is_empty() => Some(v.details.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.error.code().to_string(),
            message,
            details,
            waitlist: self.waitlist,
        };
        (self.status, Json(body)).into_response()
    }
}

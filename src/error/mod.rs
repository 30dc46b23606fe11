//! Error handling module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failures of the ubus client: input rejected before any request, or
/// transport/envelope failures raised while talking to the cloud.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Device serial number list is empty")]
    EmptyInput,

    #[error("Mode out of range: {0}")]
    InvalidMode(i64),

    #[error("Request timed out")]
    Timeout,

    #[error("Request failed: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("Unexpected HTTP status {status}, body: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Remote error code: {0}")]
    Remote(i64),
}

impl ApiError {
    /// Input errors are raised before any network call.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ApiError::EmptyInput | ApiError::InvalidMode(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Connection(err)
        }
    }
}

/// Outcome of a failed coordinator refresh. Shared by every caller that
/// joined the same in-flight refresh, hence `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Error communicating with API: {0}")]
    Api(String),

    #[error("Refresh task aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum HeaterError {
    #[error("Heater {0} is unavailable")]
    Unavailable(String),

    #[error("Field {field} is not a number: {value}")]
    Parse { field: &'static str, value: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        if err.is_input_error() {
            AppError::BadRequest(err.to_string())
        } else {
            AppError::UpstreamError(err.to_string())
        }
    }
}

impl From<HeaterError> for AppError {
    fn from(err: HeaterError) -> Self {
        match err {
            HeaterError::Unavailable(sn) => AppError::Unavailable(format!("heater {} unavailable", sn)),
            HeaterError::Parse { .. } => AppError::InternalError(err.to_string()),
            HeaterError::Api(e) => e.into(),
        }
    }
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        AppError::UpstreamError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::UpstreamError(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

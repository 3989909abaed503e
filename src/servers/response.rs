//! JSON response envelope and error-to-status mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;

use crate::PassgateError;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// `{success, message, data?, errors?, timestamp}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T = ()> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
            timestamp: Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            errors: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>, errors: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl PassgateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PassgateError::NotFound(_) => StatusCode::NOT_FOUND,
            PassgateError::Conflict(_)
            | PassgateError::Validation(_)
            | PassgateError::InvalidInput(_)
            | PassgateError::Expired(_) => StatusCode::BAD_REQUEST,
            PassgateError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PassgateError::Forbidden(_) => StatusCode::FORBIDDEN,
            PassgateError::Store(_)
            | PassgateError::Hashing(_)
            | PassgateError::Token(_)
            | PassgateError::Notification(_)
            | PassgateError::Io(_)
            | PassgateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PassgateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            log::error!("Request failed: {}", self);
            return (status, ApiResponse::error(INTERNAL_ERROR_MESSAGE, None)).into_response();
        }

        log::debug!("Request rejected ({}): {:?}", status, self);
        let message = self.to_string();
        let errors = match self {
            PassgateError::InvalidInput(errors) => Some(errors),
            _ => None,
        };
        (status, ApiResponse::error(message, errors)).into_response()
    }
}

/// Used by `CatchPanicLayer`; the panic payload is logged, never returned
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    log::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiResponse::error(INTERNAL_ERROR_MESSAGE, None),
    )
        .into_response()
}

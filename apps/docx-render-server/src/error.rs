//! Error types for the DOCX render server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docx_engine::{EngineError, TagError};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::fetch::FetchError;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Failed to fetch template from {url}: {message}")]
    FetchFailed {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Template is not a valid DOCX archive: {0}")]
    InvalidArchive(String),

    #[error("{message}")]
    RenderFailed {
        message: String,
        details: Vec<TagError>,
    },

    #[error("Render timeout after {0}ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Value of the `error` field on the wire
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "bad_request",
            ServerError::Unauthorized => "unauthorized",
            ServerError::FetchFailed { .. } => "failed_to_fetch_template",
            ServerError::InvalidArchive(_) => "invalid_docx_zip",
            ServerError::RenderFailed { .. } => "template_render_error",
            ServerError::Timeout(_) | ServerError::Internal(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Timeout(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<TagError>>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();

        match &self {
            ServerError::Timeout(_) | ServerError::Internal(_) => error!("{}", message),
            ServerError::BadRequest(_) | ServerError::Unauthorized => info!("{}", message),
            _ => warn!("{}", message),
        }

        let mut body = ErrorResponse {
            error: code,
            message,
            status: None,
            url: None,
            details: None,
        };

        match self {
            ServerError::FetchFailed { url, status, .. } => {
                body.status = status;
                body.url = Some(url);
            }
            ServerError::RenderFailed { details, .. } => body.details = Some(details),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::InvalidArchive(reason) => ServerError::InvalidArchive(reason),
            EngineError::Template(details) => ServerError::RenderFailed { message, details },
            EngineError::Serialize(reason) => ServerError::Internal(reason),
        }
    }
}

impl From<FetchError> for ServerError {
    fn from(err: FetchError) -> Self {
        let message = err.to_string();
        let status = err.status();
        ServerError::FetchFailed {
            url: err.into_url(),
            status,
            message,
        }
    }
}

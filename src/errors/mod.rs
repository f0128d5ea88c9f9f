/// Unified error handling module
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Classification of a failed outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind", content = "status")]
pub enum FetchErrorKind {
    Network,
    HttpStatus(u16),
    Parse,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Network => write!(f, "network"),
            FetchErrorKind::HttpStatus(code) => write!(f, "http {}", code),
            FetchErrorKind::Parse => write!(f, "parse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn http_status(code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::HttpStatus(code),
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Parse,
            message: message.into(),
        }
    }

    /// Message suitable for a pane or banner
    pub fn user_message(&self) -> String {
        match self.kind {
            FetchErrorKind::Network => format!("Network error: {}", self.message),
            FetchErrorKind::HttpStatus(401) => "Not authorized to access the fleet API".to_string(),
            FetchErrorKind::HttpStatus(404) => format!("Not found: {}", self.message),
            FetchErrorKind::HttpStatus(code) => format!("Request failed ({}): {}", code, self.message),
            FetchErrorKind::Parse => format!("Unexpected response: {}", self.message),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::http_status(status.as_u16(), err.to_string()),
            None if err.is_decode() => FetchError::parse(err.to_string()),
            None => FetchError::network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::parse(err.to_string())
    }
}

/// Result of an async continuation checked against the current target
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Err(FetchError),
    /// Superseded by a newer request for the same slot; never shown
    Stale,
}

impl<T> Outcome<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Outcome::Stale)
    }
}

/// Map surface failures are non-fatal to the rest of the view
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("map surface is not initialized")]
    NotReady,
    #[error("map backend error: {0}")]
    Backend(String),
}

/// Command-level rejections from the engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("machine {0} is not part of the current fleet")]
    UnknownMachine(String),
    #[error("no fleet is loaded")]
    NoFleet,
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Unified error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    InvalidInput(String),
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Engine(e) => write!(f, "Engine error: {}", e),
            ApiError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Engine(EngineError::UnknownMachine(id)) => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_MACHINE",
                format!("Machine {} is not in the current fleet", id),
            ),
            ApiError::Engine(EngineError::NoFleet) => {
                (StatusCode::CONFLICT, "NO_FLEET", "No fleet is loaded".to_string())
            }
            ApiError::Engine(EngineError::Fetch(e)) => {
                let code = match e.kind {
                    FetchErrorKind::HttpStatus(401) | FetchErrorKind::HttpStatus(403) => "UPSTREAM_AUTH",
                    FetchErrorKind::HttpStatus(404) => "UPSTREAM_404",
                    FetchErrorKind::HttpStatus(429) => "UPSTREAM_429",
                    FetchErrorKind::HttpStatus(500..=599) => "UPSTREAM_5XX",
                    FetchErrorKind::HttpStatus(_) => "UPSTREAM_ERROR",
                    FetchErrorKind::Network => "UPSTREAM_UNREACHABLE",
                    FetchErrorKind::Parse => "UPSTREAM_PARSE",
                };
                (StatusCode::BAD_GATEWAY, code, e.user_message())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone()),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let error_response = ErrorResponse {
            ok: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Type alias for shell handler results
pub type ApiResult<T> = Result<T, ApiError>;

//! Error types for querydeck-core

use thiserror::Error;

use crate::types::ChartId;

/// Main error type for the querydeck-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No stored token; the user has to log in first
    #[error("not logged in")]
    NotAuthenticated,

    /// Backend rejected the bearer token (401)
    #[error("authentication failed: session expired or invalid")]
    Unauthorized,

    /// Backend has no database connected for this session (503)
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other non-success response from the backend
    #[error("API error ({status}): {}", detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    /// Transport failure: connection refused, timeout, undecodable body
    #[error("request failed: {0}")]
    Request(String),

    /// Chart could not be built from the current result
    #[error("chart error: {0}")]
    Chart(String),

    /// Chart not found in the session
    #[error("chart not found: {0}")]
    ChartNotFound(ChartId),

    /// Rejected user input (blank question, blank title, bad index)
    #[error("{0}")]
    InvalidInput(String),

    /// The session has no database, so SQL cannot be re-executed
    #[error("no database selected for this session")]
    NoDatabase,
}

impl Error {
    /// Text to show the user for a failed action.
    ///
    /// Backend validation messages (`detail`) are surfaced verbatim; everything
    /// else collapses to the caller's generic `fallback` ("Query failed",
    /// "Failed to save dashboard", ...).
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Error::Api {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Error::ServiceUnavailable(detail) => detail.clone(),
            Error::Unauthorized | Error::NotAuthenticated => {
                "Not authenticated. Please log in again.".to_string()
            }
            Error::Chart(msg) | Error::InvalidInput(msg) => msg.clone(),
            Error::ChartNotFound(_) | Error::NoDatabase => self.to_string(),
            _ => fallback.to_string(),
        }
    }

    /// True when the user must log in again before retrying
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::Unauthorized | Error::NotAuthenticated)
    }
}

/// Result type alias for querydeck-core
pub type Result<T> = std::result::Result<T, Error>;

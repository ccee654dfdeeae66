// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Relay
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for Relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(String),

    /// Chat platform errors (message updates, event sends)
    #[error("Chat platform error: {0}")]
    Platform(String),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Result type alias for Relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Message shown to end users when this error ends a session.
    ///
    /// Backend-reported failures and session errors carry their own text;
    /// everything else uses the full display string.
    pub fn user_reason(&self) -> String {
        match self {
            RelayError::Api(ApiError::ServerError { message, .. }) => message.clone(),
            RelayError::Api(ApiError::StreamError(message)) => message.clone(),
            RelayError::Session(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

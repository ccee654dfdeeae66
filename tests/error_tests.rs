// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io;
use relay::error::{ApiError, RelayError};

#[test]
fn test_io_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let relay_error: RelayError = io_error.into();

    match relay_error {
        RelayError::Io(_) => {} // Expected
        _ => panic!("Expected Io error, got different error type"),
    }
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let relay_error: RelayError = json_error.into();
    assert!(relay_error.to_string().starts_with("JSON error:"));
}

#[test]
fn test_config_error_display() {
    let error = RelayError::Config("Missing API key".to_string());
    assert_eq!(error.to_string(), "Configuration error: Missing API key");
}

#[test]
fn test_tool_execution_error() {
    let error = RelayError::ToolExecution("Search failed".to_string());
    assert_eq!(error.to_string(), "Tool execution failed: Search failed");
}

#[test]
fn test_session_error_display() {
    let error = RelayError::Session("event stream ended before the run completed".to_string());
    assert_eq!(
        error.to_string(),
        "Session error: event stream ended before the run completed"
    );
}

#[test]
fn test_api_rate_limited_error() {
    let error = ApiError::RateLimited(30);
    assert_eq!(error.to_string(), "Rate limited: retry after 30 seconds");
}

#[test]
fn test_api_server_error_display() {
    let error = ApiError::ServerError {
        status: 409,
        message: "Run is not cancellable".to_string(),
    };
    assert_eq!(error.to_string(), "API error (409): Run is not cancellable");
}

#[test]
fn test_nested_api_error_display() {
    let error: RelayError = ApiError::AuthenticationFailed.into();
    assert_eq!(
        error.to_string(),
        "API error: Authentication failed: invalid API key"
    );
}

#[test]
fn test_user_reason_for_session_outcomes() {
    let stream = RelayError::Api(ApiError::StreamError("Internal server error".to_string()));
    assert_eq!(stream.user_reason(), "Internal server error");

    let timeout = RelayError::Api(ApiError::Timeout);
    assert_eq!(timeout.user_reason(), "API error: Request timed out");

    let session = RelayError::Session("no stream event within 30s".to_string());
    assert_eq!(session.user_reason(), "no stream event within 30s");
}

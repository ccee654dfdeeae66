// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Relay
//!
//! Handles loading and saving settings from ~/.relay/settings.json

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod io;
mod migration;
mod validation;

/// Main settings structure, stored in ~/.relay/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// OpenAI Assistants backend configuration
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Web search tool configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Generation session behaviour
    #[serde(default)]
    pub session: SessionSettings,
}

/// OpenAI-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    /// Base URL for API (for custom endpoints)
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Assistant used when opening new runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
}

/// Search backend configuration for the `web_search` tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Search endpoint
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Results requested per query
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Search depth passed through to the backend
    #[serde(default = "default_search_depth")]
    pub search_depth: String,

    /// Per-request timeout in seconds (0 = no timeout)
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

/// Generation session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Minimum interval between partial message writes while streaming
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Fail the session when no stream event arrives for this long (0 = disabled)
    #[serde(default)]
    pub idle_timeout_secs: u64,

    /// Answer unknown tool names with an error output instead of dropping them
    #[serde(default)]
    pub strict_tools: bool,

    /// How many times a run cancel request is attempted before giving up
    #[serde(default = "default_cancel_attempts")]
    pub cancel_attempts: u32,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_openai_api_key_env(),
            base_url: default_openai_base_url(),
            assistant_id: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_search_api_key_env(),
            base_url: default_search_base_url(),
            max_results: default_max_results(),
            search_depth: default_search_depth(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            idle_timeout_secs: 0,
            strict_tools: false,
            cancel_attempts: default_cancel_attempts(),
        }
    }
}

impl SearchConfig {
    /// Request timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl SessionSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Idle timeout, if one is configured.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl Settings {
    /// Get the API key for OpenAI, checking env var first.
    pub fn get_openai_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.openai.api_key_env)
            .ok()
            .or_else(|| self.openai.api_key.clone())
    }

    /// Get the API key for the search backend, checking env var first.
    pub fn get_search_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(&self.search.api_key_env)
            .ok()
            .or_else(|| self.search.api_key.clone())
    }
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_search_api_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_search_base_url() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_max_results() -> u32 {
    3
}

fn default_search_depth() -> String {
    "advanced".to_string()
}

fn default_search_timeout_secs() -> u64 {
    30
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_cancel_attempts() -> u32 {
    2
}

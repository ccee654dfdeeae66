// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Web search tool
//!
//! Queries a Tavily-compatible search API and hands the raw JSON response
//! back to the model.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::Settings;
use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{error_payload, SchemaBuilder, Tool, ToolResult};

const DEFAULT_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Tool for looking things up on the web
pub struct WebSearchTool {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    max_results: u32,
    search_depth: String,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: u32,
    include_answers: bool,
    safe_search: bool,
    include_raw_content: bool,
}

impl WebSearchTool {
    /// Create a tool with an explicit credential; `None` means unconfigured
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_SEARCH_URL.to_string(),
            max_results: 3,
            search_depth: "advanced".to_string(),
            timeout: None,
        }
    }

    /// Build from settings, resolving the credential once
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.get_search_api_key())
            .with_base_url(settings.search.base_url.clone())
            .with_max_results(settings.search.max_results)
            .with_search_depth(settings.search.search_depth.clone())
            .with_timeout(settings.search.timeout())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_search_depth(mut self, search_depth: impl Into<String>) -> Self {
        self.search_depth = search_depth.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn search(&self, tool_call_id: String, api_key: &str, query: &str) -> ToolResult {
        let body = SearchRequest {
            query,
            search_depth: &self.search_depth,
            max_results: self.max_results,
            include_answers: true,
            safe_search: true,
            include_raw_content: false,
        };

        let mut request = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(target: "relay.tools", query, error = %e, "web search request failed");
                return ToolResult::error(tool_call_id, error_payload("Error performing web search."));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                target: "relay.tools",
                query,
                status = status.as_u16(),
                "search API returned an error"
            );
            return ToolResult::error(
                tool_call_id,
                serde_json::json!({
                    "error": "Error from search API.",
                    "status": status.as_u16(),
                    "detail": detail,
                }),
            );
        }

        match response.json::<Value>().await {
            Ok(data) => {
                tracing::debug!(target: "relay.tools", query, "web search succeeded");
                ToolResult::success(tool_call_id, data.to_string())
            }
            Err(e) => {
                tracing::warn!(target: "relay.tools", query, error = %e, "search response was not JSON");
                ToolResult::error(tool_call_id, error_payload("Error performing web search."))
            }
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn definition(&self) -> ToolDefinition {
        SchemaBuilder::new()
            .string("query", "The search query to look up on the web", true)
            .into_definition(
                "web_search",
                "Search the web for current information. Returns the top results as JSON.",
            )
    }

    async fn execute(&self, tool_call_id: String, input: Value) -> Result<ToolResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(ToolResult::error(
                tool_call_id,
                error_payload("Search API key is not configured."),
            ));
        };

        let Some(query) = input["query"].as_str().filter(|q| !q.trim().is_empty()) else {
            return Ok(ToolResult::error(
                tool_call_id,
                error_payload("Missing required parameter: query"),
            ));
        };

        tracing::info!(target: "relay.tools", query, "performing web search");
        Ok(self.search(tool_call_id, api_key, query).await)
    }
}

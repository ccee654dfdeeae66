// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for Relay
//!
//! Provides the tools a run can call mid-generation. Tools report failures
//! as JSON payloads rather than errors so a failed call never ends the run;
//! [`ToolExecutor`] enforces that boundary for every call.

pub mod builtin;
pub mod definition;
pub mod executor;

pub use definition::*;
pub use executor::*;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::llm::provider::ToolDefinition;

/// Result of tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// The tool call this result answers
    pub tool_call_id: String,
    /// Serialized JSON output
    pub output: ToolPayload,
}

/// Output from a tool, always serialized JSON
#[derive(Debug, Clone)]
pub enum ToolPayload {
    /// The backing service's response
    Success(String),
    /// A `{ "error": ... }` object
    Error(String),
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: ToolPayload::Success(output.into()),
        }
    }

    /// Create an error result from an already-built error object
    pub fn error(tool_call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: ToolPayload::Error(payload.to_string()),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolPayload::Error(_))
    }

    /// Get the output JSON
    pub fn output_json(&self) -> &str {
        match &self.output {
            ToolPayload::Success(s) => s,
            ToolPayload::Error(s) => s,
        }
    }

    /// Consume the result and return the output JSON
    pub fn into_output_json(self) -> String {
        match self.output {
            ToolPayload::Success(s) | ToolPayload::Error(s) => s,
        }
    }
}

/// Build a `{ "error": message }` payload
pub fn error_payload(message: impl Into<String>) -> Value {
    serde_json::json!({ "error": message.into() })
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition for the model
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with parsed arguments.
    ///
    /// Failures the caller should see belong in [`ToolResult::error`]; an
    /// `Err` is reported as a generic tool failure.
    async fn execute(&self, tool_call_id: String, input: Value) -> Result<ToolResult>;

    /// Get the tool name
    fn name(&self) -> &str;
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with all built-in tools configured from settings
    pub fn with_builtins(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::WebSearchTool::from_settings(settings)));
        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Get all tool definitions
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// List all tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

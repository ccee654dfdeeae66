// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool execution engine
//!
//! Turns a tool call request into a JSON output string. Nothing raised by a
//! tool crosses this boundary: parse failures, tool errors and unknown tools
//! all become `{ "error": ... }` payloads.

use serde_json::Value;

use crate::config::Settings;
use crate::llm::provider::{ToolCallRequest, ToolDefinition, ToolOutput};

use super::{error_payload, ToolRegistry, ToolResult};

/// Generic message for a tool that failed without a payload of its own
pub const TOOL_FAILURE_MESSAGE: &str = "failed to call tool";

/// Tool executor that converts every outcome into a JSON output
pub struct ToolExecutor {
    registry: ToolRegistry,
    strict: bool,
}

impl ToolExecutor {
    /// Create an executor over a registry.
    ///
    /// In strict mode an unknown tool name yields an error output; otherwise
    /// the call is dropped and produces no output at all.
    pub fn new(registry: ToolRegistry, strict: bool) -> Self {
        Self { registry, strict }
    }

    /// Create an executor with the built-in tools configured from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ToolRegistry::with_builtins(settings),
            settings.session.strict_tools,
        )
    }

    /// Get tool definitions for the model
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Check whether a tool name is registered
    pub fn is_known(&self, tool_name: &str) -> bool {
        self.registry.get(tool_name).is_some()
    }

    /// Execute a tool by name with raw JSON arguments and return output JSON.
    ///
    /// Never fails; unknown tools are reported as an error payload here
    /// regardless of strict mode.
    pub async fn execute(&self, tool_name: &str, arguments_json: &str) -> String {
        self.run_tool("", tool_name, arguments_json)
            .await
            .into_output_json()
    }

    /// Execute one tool call request.
    ///
    /// Returns `None` only for an unknown tool outside strict mode.
    pub async fn execute_call(&self, call: &ToolCallRequest) -> Option<ToolOutput> {
        if !self.strict && !self.is_known(&call.tool_name) {
            tracing::warn!(
                target: "relay.tools",
                tool_call_id = %call.id,
                tool_name = %call.tool_name,
                "dropping call to unknown tool"
            );
            return None;
        }

        let result = self
            .run_tool(&call.id, &call.tool_name, &call.arguments_json)
            .await;
        Some(ToolOutput::new(call.id.clone(), result.into_output_json()))
    }

    /// Execute every call in order, collecting one output per kept call
    pub async fn execute_calls(&self, calls: &[ToolCallRequest]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            if let Some(output) = self.execute_call(call).await {
                outputs.push(output);
            }
        }
        outputs
    }

    async fn run_tool(&self, tool_call_id: &str, tool_name: &str, arguments_json: &str) -> ToolResult {
        let Some(tool) = self.registry.get(tool_name) else {
            return ToolResult::error(
                tool_call_id,
                error_payload(format!("Unknown tool: {}", tool_name)),
            );
        };

        let input: Value = match serde_json::from_str(arguments_json) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(
                    target: "relay.tools",
                    tool_call_id,
                    tool_name,
                    error = %e,
                    "tool arguments are not valid JSON"
                );
                return ToolResult::error(tool_call_id, error_payload(TOOL_FAILURE_MESSAGE));
            }
        };

        tracing::debug!(target: "relay.tools", tool_call_id, tool_name, "executing tool");

        match tool.execute(tool_call_id.to_string(), input).await {
            Ok(result) => {
                if result.is_error() {
                    tracing::warn!(
                        target: "relay.tools",
                        tool_call_id,
                        tool_name,
                        output = %result.output_json(),
                        "tool reported an error"
                    );
                }
                result
            }
            Err(e) => {
                tracing::warn!(
                    target: "relay.tools",
                    tool_call_id,
                    tool_name,
                    error = %e,
                    "tool execution failed"
                );
                ToolResult::error(tool_call_id, error_payload(TOOL_FAILURE_MESSAGE))
            }
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generation backend trait and related types
//!
//! Defines the abstraction layer over assistant-run APIs: an already-open
//! event stream, plus the two operations a session needs against a run.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;

/// Stream of run events, in arrival order
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Main trait for generation backends
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Get the backend name (e.g., "openai")
    fn name(&self) -> &str;

    /// Submit tool outputs for a run that is waiting on them and open the
    /// stream that continues the run.
    async fn submit_tool_outputs(&self, run_id: &str, outputs: Vec<ToolOutput>)
        -> Result<EventStream>;

    /// Ask the backend to cancel a run
    async fn cancel_run(&self, run_id: &str) -> Result<()>;
}

/// Events from an assistant run stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A run was created; its id is needed to cancel or submit outputs
    RunCreated { run_id: String },

    /// A text fragment of the message being generated
    MessageDelta { text: String },

    /// The message finished; carries the authoritative text when it is textual
    MessageCompleted { text: Option<String> },

    /// The run is paused until the caller acts
    RunRequiresAction {
        run_id: String,
        action: RequiredAction,
    },

    /// The run finished
    RunCompleted,

    /// The run failed
    RunFailed { reason: String },

    /// The run was cancelled on the backend
    RunCancelled,

    /// A run step started
    RunStepCreated { step_type: StepType },

    /// Any event this crate does not act on
    Other { event: String },
}

/// What a paused run is waiting for
#[derive(Debug, Clone, PartialEq)]
pub enum RequiredAction {
    /// The run needs one output per tool call
    SubmitToolOutputs { tool_calls: Vec<ToolCallRequest> },
    /// An action type this crate does not handle
    Unsupported(String),
}

/// Kind of run step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepType {
    MessageCreation,
    ToolCalls,
    Other(String),
}

impl StepType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "message_creation" => StepType::MessageCreation,
            "tool_calls" => StepType::ToolCalls,
            other => StepType::Other(other.to_string()),
        }
    }
}

/// A tool call the model wants executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call id; outputs must reference it
    pub id: String,
    /// Name of the tool
    pub tool_name: String,
    /// Raw JSON arguments as produced by the model
    pub arguments_json: String,
}

/// Output of one tool call, correlated by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    #[serde(rename = "output")]
    pub output_json: String,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    pub input_schema: ToolInputSchema,
}

/// Input schema for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions
    pub properties: serde_json::Value,

    /// Required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments_json: arguments_json.into(),
        }
    }
}

impl ToolOutput {
    pub fn new(tool_call_id: impl Into<String>, output_json: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output_json: output_json.into(),
        }
    }
}

impl StreamEvent {
    /// Whether this event ends the run on the backend side
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::RunCompleted | StreamEvent::RunFailed { .. } | StreamEvent::RunCancelled
        )
    }
}

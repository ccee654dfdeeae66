// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI Assistants API backend
//!
//! Talks to the beta threads/runs endpoints. Runs are opened with
//! `stream: true` and their server-sent events are decoded into
//! [`StreamEvent`]s. [`ThreadBackend`] binds the client to one thread and
//! implements [`GenerationBackend`] for the session controller.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, RelayError, Result};
use crate::llm::provider::{
    EventStream, GenerationBackend, RequiredAction, StepType, StreamEvent, ToolCallRequest,
    ToolDefinition, ToolOutput,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA: &str = "assistants=v2";

/// Client for the OpenAI Assistants endpoints
pub struct OpenAIAssistantsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIAssistantsClient {
    /// Create a new client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, OPENAI_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("OpenAI-Beta", ASSISTANTS_BETA)
            .header("Content-Type", "application/json")
    }

    /// Create an empty thread and return its id
    pub async fn create_thread(&self) -> Result<String> {
        let response = self
            .post("/threads")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(transport_error)?;
        let created: ObjectId = Self::check(response).await?.json().await?;
        Ok(created.id)
    }

    /// Append a user message to a thread and return the message id
    pub async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<String> {
        let body = CreateMessageRequest {
            role: "user",
            content: text,
        };
        let response = self
            .post(&format!("/threads/{}/messages", thread_id))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let created: ObjectId = Self::check(response).await?.json().await?;
        Ok(created.id)
    }

    /// Start a streamed run of `assistant_id` on a thread
    pub async fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
        tools: &[ToolDefinition],
    ) -> Result<EventStream> {
        let body = CreateRunRequest {
            assistant_id,
            stream: true,
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(AssistantTool::from).collect())
            },
        };

        tracing::debug!(
            target: "relay.openai",
            thread_id,
            assistant_id,
            tool_count = tools.len(),
            "opening run stream"
        );

        let response = self
            .post(&format!("/threads/{}/runs", thread_id))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(decode_event_stream(Self::check(response).await?))
    }

    /// Submit tool outputs and continue the run as a new stream
    pub async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream> {
        let body = SubmitToolOutputsRequest {
            tool_outputs: outputs,
            stream: true,
        };

        tracing::debug!(
            target: "relay.openai",
            thread_id,
            run_id,
            output_count = body.tool_outputs.len(),
            "submitting tool outputs"
        );

        let response = self
            .post(&format!(
                "/threads/{}/runs/{}/submit_tool_outputs",
                thread_id, run_id
            ))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(decode_event_stream(Self::check(response).await?))
    }

    /// Cancel an in-progress run
    pub async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let response = self
            .post(&format!("/threads/{}/runs/{}/cancel", thread_id, run_id))
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    /// Pass successful responses through, turn the rest into errors
    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let retry_after = parse_retry_after_seconds(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(parse_error(status, &body, retry_after))
    }
}

/// Map a failed request onto the API error it represents
fn transport_error(error: reqwest::Error) -> RelayError {
    if error.is_timeout() {
        RelayError::Api(ApiError::Timeout)
    } else {
        RelayError::Api(ApiError::Network(error.to_string()))
    }
}

/// Parse numeric Retry-After header (seconds).
fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u32>().ok())
}

/// Parse an error response
fn parse_error(status: u16, body: &str, retry_after: Option<u32>) -> RelayError {
    let message = serde_json::from_str::<OpenAIErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 => RelayError::Api(ApiError::AuthenticationFailed),
        429 => RelayError::Api(ApiError::RateLimited(retry_after.unwrap_or(0))),
        _ => RelayError::Api(ApiError::ServerError { status, message }),
    }
}

/// Turn an SSE response body into run events
fn decode_event_stream(response: Response) -> EventStream {
    decode_byte_stream(response.bytes_stream())
}

fn decode_byte_stream<S, B>(bytes: S) -> EventStream
where
    S: futures::Stream<Item = std::result::Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let event_stream = bytes
        .map(|result| result.map_err(|e| RelayError::Api(ApiError::StreamError(e.to_string()))))
        .scan(SseDecoder::default(), |decoder, result| {
            let events = match result {
                Ok(chunk) => decoder
                    .push(chunk.as_ref())
                    .iter()
                    .filter_map(parse_sse_event)
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            };
            futures::future::ready(Some(events))
        })
        .flat_map(futures::stream::iter);

    Box::pin(event_stream)
}

/// Splits a byte stream into blank-line delimited SSE frames.
///
/// Bytes are held until a frame is complete, so a UTF-8 sequence split
/// across network chunks is decoded whole.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

/// One decoded SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseDecoder {
    /// Feed a chunk and return every frame it completes
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // CR only ever appears in CRLF line endings; JSON payloads escape it.
        self.buffer.extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let rest = self.buffer.split_off(pos + 2);
            let raw_bytes = std::mem::replace(&mut self.buffer, rest);
            let raw = String::from_utf8_lossy(&raw_bytes[..pos]);

            let mut event = None;
            let mut data_lines = Vec::new();
            for line in raw.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if let Some(rest) = line.strip_prefix("event:") {
                    event = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
                }
            }

            if event.is_some() || !data_lines.is_empty() {
                frames.push(SseFrame {
                    event,
                    data: data_lines.join("\n"),
                });
            }
        }
        frames
    }
}

/// Map one SSE frame to a run event
pub(crate) fn parse_sse_event(frame: &SseFrame) -> Option<Result<StreamEvent>> {
    let event_type = frame.event.as_deref()?;
    if frame.data == "[DONE]" || event_type == "done" {
        return None;
    }

    let parsed = match event_type {
        "thread.run.created" => {
            serde_json::from_str::<RunObject>(&frame.data).map(|run| StreamEvent::RunCreated {
                run_id: run.id,
            })
        }
        "thread.message.delta" => serde_json::from_str::<MessageDeltaObject>(&frame.data).map(
            |delta| match delta.delta.content.into_iter().next() {
                Some(ContentPart {
                    text: Some(text), ..
                }) => StreamEvent::MessageDelta { text: text.value },
                _ => StreamEvent::Other {
                    event: event_type.to_string(),
                },
            },
        ),
        "thread.message.completed" => serde_json::from_str::<MessageObject>(&frame.data).map(
            |message| StreamEvent::MessageCompleted {
                text: message
                    .content
                    .into_iter()
                    .next()
                    .filter(|part| part.part_type == "text")
                    .and_then(|part| part.text)
                    .map(|text| text.value),
            },
        ),
        "thread.run.requires_action" => {
            serde_json::from_str::<RunObject>(&frame.data).map(|run| {
                let action = match run.required_action {
                    Some(RequiredActionObject {
                        action_type,
                        submit_tool_outputs: Some(submit),
                    }) if action_type == "submit_tool_outputs" => {
                        RequiredAction::SubmitToolOutputs {
                            tool_calls: submit
                                .tool_calls
                                .into_iter()
                                .map(|call| {
                                    ToolCallRequest::new(
                                        call.id,
                                        call.function.name,
                                        call.function.arguments,
                                    )
                                })
                                .collect(),
                        }
                    }
                    Some(other) => RequiredAction::Unsupported(other.action_type),
                    None => RequiredAction::Unsupported(String::new()),
                };
                StreamEvent::RunRequiresAction {
                    run_id: run.id,
                    action,
                }
            })
        }
        "thread.run.completed" => Ok(StreamEvent::RunCompleted),
        "thread.run.failed" => {
            serde_json::from_str::<RunObject>(&frame.data).map(|run| StreamEvent::RunFailed {
                reason: run
                    .last_error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "Run failed".to_string()),
            })
        }
        "thread.run.cancelled" => Ok(StreamEvent::RunCancelled),
        "thread.run.step.created" => {
            serde_json::from_str::<RunStepObject>(&frame.data).map(|step| {
                StreamEvent::RunStepCreated {
                    step_type: StepType::from_tag(&step.step_details.step_type),
                }
            })
        }
        "error" => {
            let message = serde_json::from_str::<ErrorObject>(&frame.data)
                .map(|e| e.message)
                .unwrap_or_else(|_| frame.data.clone());
            return Some(Err(RelayError::Api(ApiError::StreamError(message))));
        }
        other => Ok(StreamEvent::Other {
            event: other.to_string(),
        }),
    };

    Some(parsed.map_err(|e| {
        RelayError::Api(ApiError::InvalidResponse(format!(
            "malformed {} event: {}",
            event_type, e
        )))
    }))
}

/// A [`GenerationBackend`] bound to one thread
#[derive(Clone)]
pub struct ThreadBackend {
    client: Arc<OpenAIAssistantsClient>,
    thread_id: String,
}

impl ThreadBackend {
    pub fn new(client: Arc<OpenAIAssistantsClient>, thread_id: impl Into<String>) -> Self {
        Self {
            client,
            thread_id: thread_id.into(),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Start a run on this thread
    pub async fn start_run(
        &self,
        assistant_id: &str,
        tools: &[ToolDefinition],
    ) -> Result<EventStream> {
        self.client
            .create_run_stream(&self.thread_id, assistant_id, tools)
            .await
    }
}

#[async_trait]
impl GenerationBackend for ThreadBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn submit_tool_outputs(
        &self,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream> {
        self.client
            .submit_tool_outputs_stream(&self.thread_id, run_id, outputs)
            .await
    }

    async fn cancel_run(&self, run_id: &str) -> Result<()> {
        self.client.cancel_run(&self.thread_id, run_id).await
    }
}

// ===== Wire types =====

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AssistantTool>>,
}

#[derive(Debug, Serialize)]
struct SubmitToolOutputsRequest {
    tool_outputs: Vec<ToolOutput>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AssistantTool {
    r#type: &'static str,
    function: AssistantFunction,
}

#[derive(Debug, Serialize)]
struct AssistantFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for AssistantTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            r#type: "function",
            function: AssistantFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: serde_json::json!({
                    "type": tool.input_schema.schema_type,
                    "properties": tool.input_schema.properties,
                    "required": tool.input_schema.required,
                }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    #[serde(default)]
    required_action: Option<RequiredActionObject>,
    #[serde(default)]
    last_error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RequiredActionObject {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    submit_tool_outputs: Option<SubmitToolOutputsObject>,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputsObject {
    #[serde(default)]
    tool_calls: Vec<ToolCallObject>,
}

#[derive(Debug, Deserialize)]
struct ToolCallObject {
    id: String,
    function: FunctionCallObject,
}

#[derive(Debug, Deserialize)]
struct FunctionCallObject {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: ErrorObject,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaObject {
    delta: MessageDeltaBody,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default)]
    text: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RunStepObject {
    step_details: StepDetails,
}

#[derive(Debug, Deserialize)]
struct StepDetails {
    #[serde(rename = "type")]
    step_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    fn parse(event: &str, data: &str) -> StreamEvent {
        parse_sse_event(&frame(event, data)).unwrap().unwrap()
    }

    #[test]
    fn test_decoder_splits_frames_across_chunks() {
        let mut decoder = SseDecoder::default();

        let frames = decoder.push(b"event: thread.run.created\ndata: {\"id\":");
        assert!(frames.is_empty());

        let frames = decoder.push(b"\"run_1\"}\n\nevent: thread.run.completed\r\ndata: {}\r\n\r\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("thread.run.created"));
        assert_eq!(frames[0].data, "{\"id\":\"run_1\"}");
        assert_eq!(frames[1].event.as_deref(), Some("thread.run.completed"));
    }

    #[test]
    fn test_decoder_keeps_multibyte_text_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let body = "event: thread.message.delta\ndata: {\"v\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = body.iter().position(|byte| *byte == 0xC3).unwrap() + 1;

        assert!(decoder.push(&body[..split]).is_empty());
        let frames = decoder.push(&body[split..]);
        assert_eq!(frames[0].data, "{\"v\":\"caf\u{e9}\"}");
    }

    #[tokio::test]
    async fn test_completed_text_survives_chunk_split() {
        let body = concat!(
            "event: thread.message.completed\n",
            "data: {\"id\":\"msg_a\",\"content\":[{\"type\":\"text\",",
            "\"text\":{\"value\":\"caf\u{e9} cr\u{e8}me \u{1f600}\",\"annotations\":[]}}]}\n\n"
        )
        .as_bytes();
        // One byte per chunk splits every multi-byte character.
        let chunks: Vec<std::result::Result<Vec<u8>, reqwest::Error>> =
            body.iter().map(|byte| Ok(vec![*byte])).collect();

        let events: Vec<StreamEvent> = decode_byte_stream(futures::stream::iter(chunks))
            .map(|event| event.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![StreamEvent::MessageCompleted {
                text: Some("caf\u{e9} cr\u{e8}me \u{1f600}".to_string())
            }]
        );
    }

    #[test]
    fn test_decoder_skips_comments() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b": keep-alive\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn test_parse_run_created() {
        assert_eq!(
            parse("thread.run.created", r#"{"id":"run_1","status":"queued"}"#),
            StreamEvent::RunCreated {
                run_id: "run_1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_message_delta() {
        let data = r#"{"id":"msg_1","delta":{"content":[{"index":0,"type":"text","text":{"value":"Hel"}}]}}"#;
        assert_eq!(
            parse("thread.message.delta", data),
            StreamEvent::MessageDelta {
                text: "Hel".to_string()
            }
        );
    }

    #[test]
    fn test_parse_message_completed_text() {
        let data = r#"{"id":"msg_1","content":[{"type":"text","text":{"value":"Hello, world","annotations":[]}}]}"#;
        assert_eq!(
            parse("thread.message.completed", data),
            StreamEvent::MessageCompleted {
                text: Some("Hello, world".to_string())
            }
        );
    }

    #[test]
    fn test_parse_message_completed_non_text() {
        let data = r#"{"id":"msg_1","content":[{"type":"image_file","image_file":{"file_id":"f"}}]}"#;
        assert_eq!(
            parse("thread.message.completed", data),
            StreamEvent::MessageCompleted { text: None }
        );
    }

    #[test]
    fn test_parse_requires_action() {
        let data = r#"{
            "id": "run_1",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "web_search", "arguments": "{\"query\":\"rust\"}"}}
                    ]
                }
            }
        }"#;

        match parse("thread.run.requires_action", data) {
            StreamEvent::RunRequiresAction {
                run_id,
                action: RequiredAction::SubmitToolOutputs { tool_calls },
            } => {
                assert_eq!(run_id, "run_1");
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].id, "call_1");
                assert_eq!(tool_calls[0].tool_name, "web_search");
                assert_eq!(tool_calls[0].arguments_json, r#"{"query":"rust"}"#);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_failed_reason() {
        let data = r#"{"id":"run_1","last_error":{"code":"server_error","message":"Model overloaded"}}"#;
        assert_eq!(
            parse("thread.run.failed", data),
            StreamEvent::RunFailed {
                reason: "Model overloaded".to_string()
            }
        );
    }

    #[test]
    fn test_parse_run_failed_default_reason() {
        assert_eq!(
            parse("thread.run.failed", r#"{"id":"run_1","last_error":null}"#),
            StreamEvent::RunFailed {
                reason: "Run failed".to_string()
            }
        );
    }

    #[test]
    fn test_parse_step_created() {
        let data = r#"{"id":"step_1","step_details":{"type":"message_creation"}}"#;
        assert_eq!(
            parse("thread.run.step.created", data),
            StreamEvent::RunStepCreated {
                step_type: StepType::MessageCreation
            }
        );
    }

    #[test]
    fn test_parse_error_event() {
        let result = parse_sse_event(&frame("error", r#"{"message":"boom"}"#)).unwrap();
        assert!(matches!(
            result,
            Err(RelayError::Api(ApiError::StreamError(ref m))) if m == "boom"
        ));
    }

    #[test]
    fn test_done_frame_ignored() {
        assert!(parse_sse_event(&frame("done", "[DONE]")).is_none());
    }

    #[test]
    fn test_malformed_event_is_error() {
        let result = parse_sse_event(&frame("thread.run.created", "not json")).unwrap();
        assert!(matches!(
            result,
            Err(RelayError::Api(ApiError::InvalidResponse(_)))
        ));
    }

    #[test]
    fn test_unknown_event_passthrough() {
        assert_eq!(
            parse("thread.run.in_progress", "{}"),
            StreamEvent::Other {
                event: "thread.run.in_progress".to_string()
            }
        );
    }

    #[test]
    fn test_parse_error_statuses() {
        assert!(matches!(
            parse_error(401, "{}", None),
            RelayError::Api(ApiError::AuthenticationFailed)
        ));
        assert!(matches!(
            parse_error(429, "{}", Some(12)),
            RelayError::Api(ApiError::RateLimited(12))
        ));
        match parse_error(
            400,
            r#"{"error":{"message":"Run is not active","type":"invalid_request_error"}}"#,
            None,
        ) {
            RelayError::Api(ApiError::ServerError { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Run is not active");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_tool_definition_wire_format() {
        let tool = ToolDefinition {
            name: "web_search".to_string(),
            description: "Search".to_string(),
            input_schema: crate::llm::provider::ToolInputSchema {
                schema_type: "object".to_string(),
                properties: serde_json::json!({"query": {"type": "string"}}),
                required: vec!["query".to_string()],
            },
        };
        let wire = serde_json::to_value(AssistantTool::from(&tool)).unwrap();
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "web_search");
        assert_eq!(wire["function"]["parameters"]["required"][0], "query");
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted generation backend
//!
//! Provides a configurable implementation of the GenerationBackend trait
//! that replays pre-built event streams and records every call made against
//! it. Used by unit tests and by the `demo` command.

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{ApiError, RelayError, Result};
use crate::llm::provider::{
    EventStream, GenerationBackend, RequiredAction, StepType, StreamEvent, ToolCallRequest,
    ToolOutput,
};

/// Sender half of a stream that tests feed event by event
pub type EventSender = mpsc::UnboundedSender<Result<StreamEvent>>;

/// A backend that replays queued streams
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    /// Streams handed out by `submit_tool_outputs`, in order
    continuations: Arc<Mutex<VecDeque<Vec<Result<StreamEvent>>>>>,
    /// Every tool output submission, by run id
    submissions: Arc<Mutex<Vec<(String, Vec<ToolOutput>)>>>,
    /// Run ids passed to `cancel_run`
    cancel_requests: Arc<Mutex<Vec<String>>>,
    /// Cancel attempts that should fail before one succeeds
    cancel_failures: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Scripted backend lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the stream returned by the next tool output submission
    pub fn with_continuation(self, events: Vec<StreamEvent>) -> Self {
        self.push_continuation(events.into_iter().map(Ok).collect());
        self
    }

    /// Make the next `failures` cancel requests fail
    pub fn with_cancel_failures(self, failures: usize) -> Self {
        self.cancel_failures.store(failures, Ordering::SeqCst);
        self
    }

    /// Queue a continuation stream that may contain errors
    pub fn push_continuation(&self, events: Vec<Result<StreamEvent>>) {
        lock(&self.continuations).push_back(events);
    }

    /// Get every tool output submission made so far
    pub fn submissions(&self) -> Vec<(String, Vec<ToolOutput>)> {
        lock(&self.submissions).clone()
    }

    /// Get every run id a cancel was requested for
    pub fn cancel_requests(&self) -> Vec<String> {
        lock(&self.cancel_requests).clone()
    }

    /// Build an event stream from a fixed list of events
    pub fn stream(events: Vec<StreamEvent>) -> EventStream {
        Box::pin(stream::iter(events.into_iter().map(Ok)))
    }

    /// Build an event stream from a list that may contain errors
    pub fn stream_results(events: Vec<Result<StreamEvent>>) -> EventStream {
        Box::pin(stream::iter(events))
    }

    /// Build an event stream fed through a channel; it ends when the sender drops
    pub fn channel_stream() -> (EventSender, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Box::pin(UnboundedReceiverStream::new(rx)))
    }

    /// Events of a run that streams `text` and completes
    pub fn reply_events(run_id: &str, text: &str) -> Vec<StreamEvent> {
        let mut events = vec![
            StreamEvent::RunCreated {
                run_id: run_id.to_string(),
            },
            StreamEvent::RunStepCreated {
                step_type: StepType::MessageCreation,
            },
        ];

        for chunk in text.chars().collect::<Vec<_>>().chunks(10) {
            events.push(StreamEvent::MessageDelta {
                text: chunk.iter().collect(),
            });
        }

        events.push(StreamEvent::MessageCompleted {
            text: Some(text.to_string()),
        });
        events.push(StreamEvent::RunCompleted);
        events
    }

    /// Events of a run that pauses for the given tool calls
    pub fn tool_call_events(run_id: &str, calls: Vec<ToolCallRequest>) -> Vec<StreamEvent> {
        vec![
            StreamEvent::RunCreated {
                run_id: run_id.to_string(),
            },
            StreamEvent::RunStepCreated {
                step_type: StepType::ToolCalls,
            },
            StreamEvent::RunRequiresAction {
                run_id: run_id.to_string(),
                action: RequiredAction::SubmitToolOutputs { tool_calls: calls },
            },
        ]
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit_tool_outputs(
        &self,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream> {
        lock(&self.submissions).push((run_id.to_string(), outputs));

        let events = lock(&self.continuations).pop_front().ok_or_else(|| {
            RelayError::Api(ApiError::InvalidResponse(format!(
                "no scripted continuation for run {}",
                run_id
            )))
        })?;
        Ok(Self::stream_results(events))
    }

    async fn cancel_run(&self, run_id: &str) -> Result<()> {
        lock(&self.cancel_requests).push(run_id.to_string());

        let remaining = self.cancel_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.cancel_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RelayError::Api(ApiError::ServerError {
                status: 409,
                message: format!("Cannot cancel run {}", run_id),
            }));
        }
        Ok(())
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat platform boundary
//!
//! The session never owns the chat message; it only issues partial text
//! updates and indicator events against it through [`ChatPlatform`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{RelayError, Result};

/// AI indicator state shown next to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiState {
    #[serde(rename = "AI_STATE_GENERATING")]
    Generating,
    #[serde(rename = "AI_STATE_EXTERNAL_SOURCES")]
    ExternalSources,
    #[serde(rename = "AI_STATE_ERROR")]
    Error,
    #[serde(rename = "AI_STATE_STOPPED")]
    Stopped,
}

/// Channel events the session emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    #[serde(rename = "ai_indicator.update")]
    IndicatorUpdate {
        ai_state: AiState,
        cid: String,
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "ai_indicator.clear")]
    IndicatorClear {
        cid: String,
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ai_state: Option<AiState>,
    },
}

impl ChatEvent {
    pub fn is_clear(&self) -> bool {
        matches!(self, ChatEvent::IndicatorClear { .. })
    }
}

/// Body of a partial message update: `{ "set": { "text": ... } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdate {
    pub set: MessageFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFields {
    pub text: String,
}

impl MessageUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            set: MessageFields { text: text.into() },
        }
    }
}

/// The message a session writes into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTarget {
    /// Channel id in `type:id` form
    pub cid: String,
    pub message_id: String,
}

impl MessageTarget {
    pub fn new(cid: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            cid: cid.into(),
            message_id: message_id.into(),
        }
    }

    pub fn indicator(&self, ai_state: AiState, error: Option<String>) -> ChatEvent {
        ChatEvent::IndicatorUpdate {
            ai_state,
            cid: self.cid.clone(),
            message_id: self.message_id.clone(),
            error,
        }
    }

    pub fn clear(&self, ai_state: Option<AiState>) -> ChatEvent {
        ChatEvent::IndicatorClear {
            cid: self.cid.clone(),
            message_id: self.message_id.clone(),
            ai_state,
        }
    }
}

/// Operations the session needs from the chat platform
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Send an event on a channel
    async fn send_event(&self, cid: &str, event: ChatEvent) -> Result<()>;

    /// Apply a partial update to a message
    async fn partial_update_message(&self, message_id: &str, update: MessageUpdate) -> Result<()>;
}

/// One call made against a [`RecordingPlatform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Event { cid: String, event: ChatEvent },
    Update { message_id: String, text: String },
}

/// A platform that records every call, for tests and the scripted demo
#[derive(Clone, Default)]
pub struct RecordingPlatform {
    calls: Arc<Mutex<Vec<PlatformCall>>>,
    fail_updates: bool,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every message update fail
    pub fn with_failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    fn calls_guard(&self) -> MutexGuard<'_, Vec<PlatformCall>> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls_guard().clone()
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.calls_guard()
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Event { event, .. } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Texts written by partial updates, in order
    pub fn updates(&self) -> Vec<String> {
        self.calls_guard()
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Update { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.updates().pop()
    }

    pub fn clear_count(&self) -> usize {
        self.events().iter().filter(|e| e.is_clear()).count()
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn send_event(&self, cid: &str, event: ChatEvent) -> Result<()> {
        self.calls_guard().push(PlatformCall::Event {
            cid: cid.to_string(),
            event,
        });
        Ok(())
    }

    async fn partial_update_message(&self, message_id: &str, update: MessageUpdate) -> Result<()> {
        if self.fail_updates {
            return Err(RelayError::Platform(format!(
                "message {} could not be updated",
                message_id
            )));
        }
        self.calls_guard().push(PlatformCall::Update {
            message_id: message_id.to_string(),
            text: update.set.text,
        });
        Ok(())
    }
}

/// A platform that prints the message as it streams, used by the CLI
#[derive(Default)]
pub struct ConsolePlatform {
    printed: Mutex<usize>,
}

impl ConsolePlatform {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatPlatform for ConsolePlatform {
    async fn send_event(&self, cid: &str, event: ChatEvent) -> Result<()> {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        let line = match &event {
            ChatEvent::IndicatorUpdate {
                ai_state, error, ..
            } => match error {
                Some(error) => format!("[{}] {} {:?}: {}", stamp, cid, ai_state, error),
                None => format!("[{}] {} {:?}", stamp, cid, ai_state),
            },
            ChatEvent::IndicatorClear { ai_state, .. } => match ai_state {
                Some(state) => format!("[{}] {} cleared ({:?})", stamp, cid, state),
                None => format!("[{}] {} cleared", stamp, cid),
            },
        };
        eprintln!("{}", line);
        Ok(())
    }

    async fn partial_update_message(&self, _message_id: &str, update: MessageUpdate) -> Result<()> {
        let mut printed = match self.printed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let text = update.set.text;
        // Print only what is new when the update extends what is on screen.
        match text.get(*printed..) {
            Some(rest) => print!("{}", rest),
            None => print!("\n{}", text),
        }
        std::io::stdout().flush()?;
        *printed = text.len();
        Ok(())
    }
}

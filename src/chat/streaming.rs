// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming text handling
//!
//! Keeps the text of the message being generated and decides when a partial
//! write is due. Both are pure so the session's write pattern can be tested
//! without a platform.

use std::time::Duration;
use tokio::time::Instant;

/// Default minimum gap between intermediate writes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Appended when the user stops a generation
pub const STOPPED_ANNOTATION: &str = "\n\n**Generation stopped by user.**";

/// Rate limiter for intermediate message writes.
///
/// The first delta flushes immediately; after that a flush is due only once
/// strictly more than `interval` has passed since the previous one. The
/// authoritative final text arrives with `message-completed`; a run that
/// completes without one keeps whatever was last flushed.
#[derive(Debug, Clone)]
pub struct TextThrottle {
    interval: Duration,
    last_flush: Option<Instant>,
}

impl TextThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_flush: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check whether a write is due at `now`, and record it if so
    pub fn should_flush(&mut self, now: Instant) -> bool {
        let due = match self.last_flush {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        };
        if due {
            self.last_flush = Some(now);
        }
        due
    }
}

impl Default for TextThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}

/// Text of the message being generated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// Replace the buffer with the backend's authoritative text
    pub fn replace(&mut self, text: String) {
        self.text = text;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text to show when the run failed with `reason`
    pub fn with_error(&self, reason: &str) -> String {
        format!("{}\n\n**Error:** {}", self.text, reason)
    }

    /// Text to show when the user stopped the run
    pub fn with_stopped(&self) -> String {
        format!("{}{}", self.text, STOPPED_ANNOTATION)
    }
}

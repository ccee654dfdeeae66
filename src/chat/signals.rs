// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Stop-signal fan-out
//!
//! Inbound `ai_indicator.stop` events are published to every live session.
//! Each session decides for itself whether a request is addressed to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Event type of an inbound stop request
pub const STOP_EVENT_TYPE: &str = "ai_indicator.stop";

/// A user's request to stop generating a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRequest {
    pub message_id: String,
}

impl StopRequest {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }

    /// Parse an inbound platform event; `None` unless it is a stop request
    /// that names a message.
    pub fn from_event(event: &Value) -> Option<Self> {
        if event.get("type").and_then(Value::as_str) != Some(STOP_EVENT_TYPE) {
            return None;
        }
        event
            .get("message_id")
            .and_then(Value::as_str)
            .map(Self::new)
    }
}

/// Receiving end of one subscription
pub struct StopSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<StopRequest>,
}

impl StopSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next request; `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<StopRequest> {
        self.receiver.recv().await
    }
}

/// Registry of sessions listening for stop requests
#[derive(Default)]
pub struct StopSignalHub {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<StopRequest>>>,
}

impl StopSignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<StopRequest>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe(&self) -> StopSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::unbounded_channel();
        self.subscribers().insert(id, tx);
        tracing::trace!(target: "relay.signals", subscription = id, "stop listener subscribed");
        StopSubscription { id, receiver }
    }

    /// Remove a subscription. Its receiver sees the end of the channel once
    /// queued requests are drained. Returns false if it was already removed.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.subscribers().remove(&id).is_some();
        if removed {
            tracing::trace!(target: "relay.signals", subscription = id, "stop listener removed");
        }
        removed
    }

    /// Deliver a request to every subscriber; returns how many received it
    pub fn publish(&self, request: StopRequest) -> usize {
        let mut subscribers = self.subscribers();
        // Drop senders whose receiving task has gone away.
        subscribers.retain(|_, tx| !tx.is_closed());
        let delivered = subscribers
            .values()
            .filter(|tx| tx.send(request.clone()).is_ok())
            .count();
        tracing::debug!(
            target: "relay.signals",
            message_id = %request.message_id,
            delivered,
            "stop request published"
        );
        delivered
    }

    /// Publish a raw inbound event if it is a stop request
    pub fn handle_event(&self, event: &Value) -> usize {
        match StopRequest::from_event(event) {
            Some(request) => self.publish(request),
            None => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }
}

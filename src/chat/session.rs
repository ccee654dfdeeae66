// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generation session controller
//!
//! A [`GenerationSession`] drives one chat message from an open run stream
//! to a terminal state. Two paths can end it: the stream loop in
//! [`GenerationSession::run`] and the stop listener spawned at start. Both
//! go through one terminal guard, so the message gets exactly one final
//! write and the disposal callback runs exactly once.
//!
//! Lock order is `io` then `state`. `state` is never held across an await.

use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::chat::platform::{AiState, ChatEvent, ChatPlatform, MessageTarget, MessageUpdate};
use crate::chat::signals::{StopRequest, StopSignalHub};
use crate::chat::streaming::{TextBuffer, TextThrottle, DEFAULT_FLUSH_INTERVAL};
use crate::config::SessionSettings;
use crate::error::{RelayError, Result};
use crate::llm::provider::{
    EventStream, GenerationBackend, RequiredAction, StepType, StreamEvent, ToolCallRequest,
};
use crate::tools::{ToolExecutor, ToolRegistry};

/// Timing and retry knobs for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Minimum gap between intermediate text writes
    pub flush_interval: Duration,
    /// Give up when the stream is silent this long
    pub idle_timeout: Option<Duration>,
    /// How many times a cancel request is tried
    pub cancel_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            idle_timeout: None,
            cancel_attempts: 2,
        }
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            flush_interval: settings.flush_interval(),
            idle_timeout: settings.idle_timeout(),
            cancel_attempts: settings.cancel_attempts.max(1),
        }
    }
}

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Running,
    AwaitingToolOutputs,
    Completed,
    Cancelled,
    Errored,
    Disposed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionPhase::Running | SessionPhase::AwaitingToolOutputs)
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Cancelled,
    Errored { reason: String },
    /// Disposed before any terminal event
    Abandoned,
}

type DisposeCallback = Box<dyn FnOnce() + Send>;

struct SessionState {
    phase: SessionPhase,
    text: TextBuffer,
    throttle: TextThrottle,
    run_id: Option<String>,
    /// Whether the indicator was cleared since the last status update
    indicator_cleared: bool,
    outcome: Option<SessionOutcome>,
}

enum Flow {
    Continue,
    Finished,
    Resume(EventStream),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn wait_terminated(terminated: &mut watch::Receiver<bool>) {
    let _ = terminated.wait_for(|done| *done).await;
}

struct Shared {
    target: MessageTarget,
    platform: Arc<dyn ChatPlatform>,
    backend: Arc<dyn GenerationBackend>,
    tools: Arc<ToolExecutor>,
    signals: Arc<StopSignalHub>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    /// Serializes message writes against the terminal transition
    io: tokio::sync::Mutex<()>,
    terminal: AtomicBool,
    terminated: watch::Sender<bool>,
    disposed: AtomicBool,
    subscription: Mutex<Option<u64>>,
    on_dispose: Mutex<Option<DisposeCallback>>,
    stream: Mutex<Option<EventStream>>,
}

/// Builder for [`GenerationSession`]
pub struct GenerationSessionBuilder {
    target: MessageTarget,
    platform: Option<Arc<dyn ChatPlatform>>,
    backend: Option<Arc<dyn GenerationBackend>>,
    tools: Option<Arc<ToolExecutor>>,
    signals: Option<Arc<StopSignalHub>>,
    config: SessionConfig,
    on_dispose: Option<DisposeCallback>,
}

impl GenerationSessionBuilder {
    pub fn new(target: MessageTarget) -> Self {
        Self {
            target,
            platform: None,
            backend: None,
            tools: None,
            signals: None,
            config: SessionConfig::default(),
            on_dispose: None,
        }
    }

    /// Set the chat platform the message lives on
    pub fn with_platform(mut self, platform: Arc<dyn ChatPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set the backend that owns the run
    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the tools available to the run; defaults to none
    pub fn with_tools(mut self, tools: Arc<ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the hub stop requests arrive on
    pub fn with_signals(mut self, signals: Arc<StopSignalHub>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a callback to run once when the session is disposed
    pub fn on_dispose(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_dispose = Some(Box::new(callback));
        self
    }

    /// Start the session over an open run stream.
    ///
    /// Subscribes to stop requests immediately; must be called inside a
    /// Tokio runtime.
    pub fn start(self, stream: EventStream) -> Result<GenerationSession> {
        let platform = self
            .platform
            .ok_or_else(|| RelayError::Config("No chat platform set".into()))?;
        let backend = self
            .backend
            .ok_or_else(|| RelayError::Config("No generation backend set".into()))?;
        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(ToolExecutor::new(ToolRegistry::new(), false)));
        let signals = self.signals.unwrap_or_default();

        let mut subscription = signals.subscribe();
        let (terminated, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            target: self.target,
            platform,
            backend,
            tools,
            signals,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Running,
                text: TextBuffer::new(),
                throttle: TextThrottle::new(self.config.flush_interval),
                run_id: None,
                indicator_cleared: false,
                outcome: None,
            }),
            config: self.config,
            io: tokio::sync::Mutex::new(()),
            terminal: AtomicBool::new(false),
            terminated,
            disposed: AtomicBool::new(false),
            subscription: Mutex::new(Some(subscription.id())),
            on_dispose: Mutex::new(self.on_dispose),
            stream: Mutex::new(Some(stream)),
        });

        tracing::debug!(
            target: "relay.session",
            message_id = %shared.target.message_id,
            cid = %shared.target.cid,
            backend = shared.backend.name(),
            "session started"
        );

        // Requests are handled one at a time; the loop ends on unsubscribe.
        let listener = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(request) = subscription.recv().await {
                listener.handle_stop(request).await;
            }
        });

        Ok(GenerationSession { shared })
    }
}

/// One streamed generation into one chat message
pub struct GenerationSession {
    shared: Arc<Shared>,
}

impl GenerationSession {
    pub fn builder(target: MessageTarget) -> GenerationSessionBuilder {
        GenerationSessionBuilder::new(target)
    }

    /// Consume the run stream until the session ends, then dispose it.
    ///
    /// The stream is consumed once; later calls only report the outcome.
    pub async fn run(&self) -> SessionOutcome {
        let shared = &self.shared;
        let stream = lock(&shared.stream).take();
        match stream {
            Some(stream) => {
                if let Err(e) = shared.consume(stream).await {
                    shared.finish_errored(e.user_reason()).await;
                }
                shared.dispose();
            }
            None => tracing::warn!(
                target: "relay.session",
                message_id = %shared.target.message_id,
                "session stream was already consumed"
            ),
        }
        self.outcome().unwrap_or(SessionOutcome::Abandoned)
    }

    /// Handle a stop request as the listener would
    pub async fn handle_stop(&self, request: StopRequest) {
        self.shared.handle_stop(request).await;
    }

    /// End the session without writing to the message. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn target(&self) -> &MessageTarget {
        &self.shared.target
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state().phase
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.shared.state().outcome.clone()
    }

    /// Text accumulated so far, without annotations
    pub fn text(&self) -> String {
        self.shared.state().text.as_str().to_string()
    }

    pub fn run_id(&self) -> Option<String> {
        self.shared.state().run_id.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.shared.is_terminal()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for GenerationSession {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    /// Move between live phases; no effect once terminal
    fn enter(&self, phase: SessionPhase) {
        let mut state = self.state();
        if !self.is_terminal() {
            state.phase = phase;
        }
    }

    /// Take the terminal transition. Only the first caller gets `true`.
    fn claim_terminal(&self, phase: SessionPhase, outcome: SessionOutcome) -> bool {
        {
            let mut state = self.state();
            if self
                .terminal
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return false;
            }
            state.phase = phase;
            state.outcome = Some(outcome);
        }
        self.terminated.send_replace(true);
        true
    }

    async fn consume(&self, mut stream: EventStream) -> Result<()> {
        let mut terminated = self.terminated.subscribe();
        loop {
            let next = tokio::select! {
                biased;
                _ = wait_terminated(&mut terminated) => return Ok(()),
                next = self.next_event(&mut stream) => next?,
            };

            let Some(event) = next else {
                if self.is_terminal() {
                    return Ok(());
                }
                return Err(RelayError::Session(
                    "event stream ended before the run completed".into(),
                ));
            };

            match self.handle_event(event).await? {
                Flow::Continue => {}
                Flow::Finished => return Ok(()),
                Flow::Resume(resumed) => stream = resumed,
            }
        }
    }

    async fn next_event(&self, stream: &mut EventStream) -> Result<Option<StreamEvent>> {
        let next = match self.config.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| {
                    RelayError::Session(format!("no stream event within {:?}", limit))
                })?,
            None => stream.next().await,
        };
        next.transpose()
    }

    async fn handle_event(&self, event: StreamEvent) -> Result<Flow> {
        match event {
            StreamEvent::RunCreated { run_id } => {
                tracing::debug!(
                    target: "relay.session",
                    message_id = %self.target.message_id,
                    run_id = %run_id,
                    "run created"
                );
                self.state().run_id = Some(run_id);
            }
            StreamEvent::MessageDelta { text } => {
                let flush = {
                    let mut state = self.state();
                    state.text.push(&text);
                    if state.throttle.should_flush(Instant::now()) {
                        Some(state.text.as_str().to_string())
                    } else {
                        None
                    }
                };
                if let Some(text) = flush {
                    self.write_text(text).await?;
                }
            }
            StreamEvent::MessageCompleted { text } => {
                let text = {
                    let mut state = self.state();
                    if let Some(text) = text {
                        state.text.replace(text);
                    }
                    state.text.as_str().to_string()
                };
                self.complete_message(text).await?;
            }
            StreamEvent::RunStepCreated {
                step_type: StepType::MessageCreation,
            } => {
                self.indicate(AiState::Generating).await?;
            }
            StreamEvent::RunStepCreated { .. } => {}
            StreamEvent::RunRequiresAction { run_id, action } => {
                let tool_calls = match action {
                    RequiredAction::SubmitToolOutputs { tool_calls } => tool_calls,
                    RequiredAction::Unsupported(kind) => {
                        return Err(RelayError::Session(format!(
                            "unsupported required action: {}",
                            kind
                        )));
                    }
                };
                return self.answer_tool_calls(run_id, tool_calls).await;
            }
            StreamEvent::RunCompleted => {
                self.finish_completed().await;
                return Ok(Flow::Finished);
            }
            StreamEvent::RunFailed { reason } => {
                self.finish_errored(reason).await;
                return Ok(Flow::Finished);
            }
            StreamEvent::RunCancelled => {
                self.finish_cancelled().await;
                return Ok(Flow::Finished);
            }
            StreamEvent::Other { event } => {
                tracing::trace!(target: "relay.session", event = %event, "ignoring stream event");
            }
        }
        Ok(Flow::Continue)
    }

    async fn answer_tool_calls(&self, run_id: String, tool_calls: Vec<ToolCallRequest>) -> Result<Flow> {
        self.state().run_id = Some(run_id.clone());
        self.enter(SessionPhase::AwaitingToolOutputs);
        self.indicate(AiState::ExternalSources).await?;

        tracing::info!(
            target: "relay.session",
            message_id = %self.target.message_id,
            run_id = %run_id,
            tool_calls = tool_calls.len(),
            "run is waiting for tool outputs"
        );
        let outputs = self.tools.execute_calls(&tool_calls).await;

        let _io = self.io.lock().await;
        if self.is_terminal() {
            return Ok(Flow::Finished);
        }
        if outputs.is_empty() {
            return Err(RelayError::Session(
                "run requested only unknown tools".into(),
            ));
        }

        let resumed = self.backend.submit_tool_outputs(&run_id, outputs).await?;
        self.enter(SessionPhase::Running);
        Ok(Flow::Resume(resumed))
    }

    /// Write the current text unless the session already ended
    async fn write_text(&self, text: String) -> Result<()> {
        let _io = self.io.lock().await;
        if self.is_terminal() {
            return Ok(());
        }
        self.platform
            .partial_update_message(&self.target.message_id, MessageUpdate::text(text))
            .await
    }

    async fn indicate(&self, ai_state: AiState) -> Result<()> {
        let _io = self.io.lock().await;
        if self.is_terminal() {
            return Ok(());
        }
        self.platform
            .send_event(&self.target.cid, self.target.indicator(ai_state, None))
            .await?;
        self.state().indicator_cleared = false;
        Ok(())
    }

    async fn complete_message(&self, text: String) -> Result<()> {
        let _io = self.io.lock().await;
        if self.is_terminal() {
            return Ok(());
        }
        self.platform
            .partial_update_message(&self.target.message_id, MessageUpdate::text(text))
            .await?;
        self.platform
            .send_event(&self.target.cid, self.target.clear(None))
            .await?;
        self.state().indicator_cleared = true;
        Ok(())
    }

    async fn finish_completed(&self) {
        let _io = self.io.lock().await;
        if !self.claim_terminal(SessionPhase::Completed, SessionOutcome::Completed) {
            return;
        }
        tracing::info!(target: "relay.session", message_id = %self.target.message_id, "run completed");

        let cleared = self.state().indicator_cleared;
        if !cleared {
            self.send_final(self.target.clear(None)).await;
        }
    }

    async fn finish_errored(&self, reason: String) {
        let _io = self.io.lock().await;
        let outcome = SessionOutcome::Errored {
            reason: reason.clone(),
        };
        if !self.claim_terminal(SessionPhase::Errored, outcome) {
            return;
        }
        tracing::warn!(
            target: "relay.session",
            message_id = %self.target.message_id,
            reason = %reason,
            "generation failed"
        );

        let text = self.state().text.with_error(&reason);
        self.update_final(text).await;
        self.send_final(self.target.indicator(AiState::Error, Some(reason)))
            .await;
    }

    async fn finish_cancelled(&self) {
        let _io = self.io.lock().await;
        if !self.claim_terminal(SessionPhase::Cancelled, SessionOutcome::Cancelled) {
            return;
        }
        tracing::info!(target: "relay.session", message_id = %self.target.message_id, "generation stopped");

        let text = self.state().text.with_stopped();
        self.send_final(self.target.clear(Some(AiState::Stopped)))
            .await;
        self.update_final(text).await;
    }

    // Final writes are best effort: the session is ending either way.
    async fn send_final(&self, event: ChatEvent) {
        if let Err(e) = self.platform.send_event(&self.target.cid, event).await {
            tracing::warn!(
                target: "relay.session",
                message_id = %self.target.message_id,
                error = %e,
                "failed to send final indicator event"
            );
        }
    }

    async fn update_final(&self, text: String) {
        if let Err(e) = self
            .platform
            .partial_update_message(&self.target.message_id, MessageUpdate::text(text))
            .await
        {
            tracing::warn!(
                target: "relay.session",
                message_id = %self.target.message_id,
                error = %e,
                "failed to write final message text"
            );
        }
    }

    async fn handle_stop(&self, request: StopRequest) {
        if request.message_id != self.target.message_id {
            return;
        }
        if self.is_terminal() {
            tracing::debug!(
                target: "relay.session",
                message_id = %self.target.message_id,
                "stop requested after the session ended"
            );
            return;
        }
        let Some(run_id) = self.state().run_id.clone() else {
            tracing::warn!(
                target: "relay.session",
                message_id = %self.target.message_id,
                "stop requested before the run id is known; ignoring"
            );
            return;
        };

        let attempts = self.config.cancel_attempts.max(1);
        for attempt in 1..=attempts {
            if self.is_terminal() {
                return;
            }
            match self.backend.cancel_run(&run_id).await {
                Ok(()) => {
                    self.finish_cancelled().await;
                    self.dispose();
                    return;
                }
                Err(e) => tracing::warn!(
                    target: "relay.session",
                    message_id = %self.target.message_id,
                    run_id = %run_id,
                    attempt,
                    attempts,
                    error = %e,
                    "cancel request failed"
                ),
            }
        }
        tracing::warn!(
            target: "relay.session",
            message_id = %self.target.message_id,
            run_id = %run_id,
            "could not cancel run; session stays open until the stream ends it"
        );
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.state();
            if self
                .terminal
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                state.outcome = Some(SessionOutcome::Abandoned);
            }
            state.phase = SessionPhase::Disposed;
        }
        self.terminated.send_replace(true);

        if let Some(id) = lock(&self.subscription).take() {
            self.signals.unsubscribe(id);
        }
        let callback = lock(&self.on_dispose).take();
        if let Some(callback) = callback {
            callback();
        }
        tracing::debug!(target: "relay.session", message_id = %self.target.message_id, "session disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::platform::RecordingPlatform;
    use crate::llm::mock_provider::ScriptedBackend;
    use std::sync::atomic::AtomicUsize;

    fn target() -> MessageTarget {
        MessageTarget::new("messaging:general", "msg_1")
    }

    fn start(
        platform: &RecordingPlatform,
        backend: &ScriptedBackend,
        stream: EventStream,
    ) -> (GenerationSession, Arc<AtomicUsize>) {
        let disposals = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disposals);
        let session = GenerationSession::builder(target())
            .with_platform(Arc::new(platform.clone()))
            .with_backend(Arc::new(backend.clone()))
            .on_dispose(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .start(stream)
            .unwrap();
        (session, disposals)
    }

    #[test]
    fn test_config_from_settings() {
        let settings = SessionSettings {
            flush_interval_ms: 250,
            idle_timeout_secs: 5,
            strict_tools: false,
            cancel_attempts: 0,
        };
        let config = SessionConfig::from_settings(&settings);
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.cancel_attempts, 1);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!SessionPhase::Running.is_terminal());
        assert!(!SessionPhase::AwaitingToolOutputs.is_terminal());
        assert!(SessionPhase::Completed.is_terminal());
        assert!(SessionPhase::Disposed.is_terminal());
    }

    #[tokio::test]
    async fn test_builder_requires_platform_and_backend() {
        let stream = ScriptedBackend::stream(vec![]);
        let err = GenerationSession::builder(target())
            .with_backend(Arc::new(ScriptedBackend::new()))
            .start(stream)
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test]
    async fn test_reply_completes_and_disposes() {
        let platform = RecordingPlatform::new();
        let backend = ScriptedBackend::new();
        let stream = ScriptedBackend::stream(ScriptedBackend::reply_events("run_1", "Hi there"));
        let (session, disposals) = start(&platform, &backend, stream);

        assert_eq!(session.run().await, SessionOutcome::Completed);
        assert_eq!(session.phase(), SessionPhase::Disposed);
        assert_eq!(session.run_id().as_deref(), Some("run_1"));
        assert_eq!(platform.last_text().as_deref(), Some("Hi there"));
        assert_eq!(platform.clear_count(), 1);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_failed_annotates_message() {
        let platform = RecordingPlatform::new();
        let backend = ScriptedBackend::new();
        let stream = ScriptedBackend::stream(vec![
            StreamEvent::RunCreated {
                run_id: "run_1".to_string(),
            },
            StreamEvent::MessageDelta {
                text: "Part".to_string(),
            },
            StreamEvent::RunFailed {
                reason: "Rate limit reached".to_string(),
            },
        ]);
        let (session, disposals) = start(&platform, &backend, stream);

        let outcome = session.run().await;
        assert_eq!(
            outcome,
            SessionOutcome::Errored {
                reason: "Rate limit reached".to_string()
            }
        );
        assert_eq!(
            platform.last_text().as_deref(),
            Some("Part\n\n**Error:** Rate limit reached")
        );
        assert!(platform.events().contains(&target().indicator(
            AiState::Error,
            Some("Rate limit reached".to_string())
        )));
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_end_without_terminal_event_errors() {
        let platform = RecordingPlatform::new();
        let backend = ScriptedBackend::new();
        let stream = ScriptedBackend::stream(vec![StreamEvent::RunCreated {
            run_id: "run_1".to_string(),
        }]);
        let (session, _) = start(&platform, &backend, stream);

        match session.run().await {
            SessionOutcome::Errored { reason } => {
                assert_eq!(reason, "event stream ended before the run completed")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispose_before_run_abandons_session() {
        let platform = RecordingPlatform::new();
        let backend = ScriptedBackend::new();
        let stream = ScriptedBackend::stream(ScriptedBackend::reply_events("run_1", "Hi"));
        let (session, disposals) = start(&platform, &backend, stream);

        session.dispose();
        session.dispose();
        assert_eq!(session.run().await, SessionOutcome::Abandoned);
        assert!(platform.calls().is_empty());
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_disposes() {
        let platform = RecordingPlatform::new();
        let backend = ScriptedBackend::new();
        let (session, disposals) = start(&platform, &backend, ScriptedBackend::stream(vec![]));

        drop(session);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_run_reports_outcome() {
        let platform = RecordingPlatform::new();
        let backend = ScriptedBackend::new();
        let stream = ScriptedBackend::stream(ScriptedBackend::reply_events("run_1", "Hi"));
        let (session, _) = start(&platform, &backend, stream);

        assert_eq!(session.run().await, SessionOutcome::Completed);
        let calls = platform.calls().len();
        assert_eq!(session.run().await, SessionOutcome::Completed);
        assert_eq!(platform.calls().len(), calls);
    }
}

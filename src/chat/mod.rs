// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat-side runtime
//!
//! Everything between an open run stream and the chat message it fills:
//! the platform boundary, stop requests, text throttling and the session
//! state machine.

pub mod platform;
pub mod session;
pub mod signals;
pub mod streaming;

pub use platform::{
    AiState, ChatEvent, ChatPlatform, ConsolePlatform, MessageTarget, MessageUpdate,
    RecordingPlatform,
};
pub use session::{
    GenerationSession, GenerationSessionBuilder, SessionConfig, SessionOutcome, SessionPhase,
};
pub use signals::{StopRequest, StopSignalHub};
pub use streaming::{TextBuffer, TextThrottle};

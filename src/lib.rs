// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Relay - streams assistant runs into chat messages.
//!
//! This crate exposes the runtime used by the `relay` CLI (`src/main.rs`).
//!
//! Architecture highlights:
//! - `chat`: the generation session state machine, stop requests and the
//!   chat platform boundary
//! - `llm`: generation backend abstraction, the OpenAI assistants client and
//!   a scripted backend
//! - `tools`: tools a run can call, and the executor that turns every tool
//!   outcome into a JSON output
//! - `config`: settings file and credential resolution

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod tools;

pub use error::{RelayError, Result};

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relay - stream assistant runs into chat messages
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version, about = "Stream assistant runs into chat messages")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (defaults to ~/.relay/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one live generation against the assistants API
    Run(RunArgs),

    /// Run a scripted generation end to end, no network needed
    Demo(DemoArgs),

    /// Write a settings file with default values
    Init(InitArgs),
}

/// Arguments for the run subcommand
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Prompt to add to the thread before the run starts
    pub prompt: String,

    /// Existing thread id; a new thread is created when omitted
    #[arg(long)]
    pub thread: Option<String>,

    /// Assistant id (overrides settings)
    #[arg(long)]
    pub assistant: Option<String>,

    /// Chat channel the message lives in
    #[arg(long, default_value = "messaging:relay")]
    pub channel: String,

    /// Chat message id to fill (random when omitted)
    #[arg(long)]
    pub message_id: Option<String>,
}

/// Arguments for the demo subcommand
#[derive(clap::Args, Debug)]
pub struct DemoArgs {
    /// Reply text the scripted run streams
    #[arg(long, default_value = "Hello, world")]
    pub text: String,

    /// Pause the run for a web search before replying
    #[arg(long)]
    pub with_search: bool,

    /// Send a stop request after this many milliseconds
    #[arg(long)]
    pub stop_after_ms: Option<u64>,
}

/// Arguments for the init subcommand
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing settings file
    #[arg(long)]
    pub force: bool,
}

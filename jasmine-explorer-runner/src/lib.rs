// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestration core for jasmine-explorer.
//!
//! A [`JasmineAdapter`](adapter::JasmineAdapter) manages one workspace folder. It discovers tests
//! and runs them by spawning short-lived worker processes, which stream JSON messages back over
//! their standard output. The adapter reconciles those messages into a canonical test tree,
//! decorates failures with source locations, and publishes load and run events to the host.
//!
//! The worker side of the protocol lives in [`reporter`].

#![warn(missing_docs)]

pub mod adapter;
pub mod config;
pub mod debug;
pub mod emitter;
pub mod env;
pub mod errors;
mod helpers;
pub mod reporter;
pub mod settings;
pub mod stack_trace;
pub mod tree;
pub mod watch;
pub mod worker;

pub use helpers::plural;

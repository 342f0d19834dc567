// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Shared data model for jasmine-explorer.
//!
//! This crate contains the types exchanged between the three parties involved in a test run:
//!
//! * the worker process, which streams [`WorkerMessage`]s (one JSON document per line);
//! * the orchestration core in `jasmine-explorer-runner`, which reconciles them into a
//!   [`TestSuiteInfo`] tree;
//! * the host, which consumes [`LoadEvent`]s and [`RunEvent`]s.
//!
//! All types are plain serde data with no behavior beyond accessors, so they can be shared by
//! worker shims and hosts alike.

mod errors;
mod events;
mod exit_codes;
mod test_tree;
mod worker;

pub use errors::*;
pub use events::*;
pub use exit_codes::*;
pub use test_tree::*;
pub use worker::*;

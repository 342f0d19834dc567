// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A command-line host for discovering and running Jasmine specs.
//!
//! The host plays the part an editor's test explorer normally does: it loads the test tree with
//! [`jasmine_explorer_runner`], runs tests, and prints progress as run events arrive.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod reporter;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;

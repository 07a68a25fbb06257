//! CLI module
//!
//! Command-line interface for exploring providers.
//!
//! # Commands
//!
//! - `list` - Stream the items of a collection as JSON lines
//! - `classify` - Classify a response and show the retry decision
//! - `collections` - List collection names
//! - `validate` - Validate a provider definition

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;

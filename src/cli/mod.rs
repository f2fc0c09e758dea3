//! CLI module for tapdance - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running workflows,
//! validating workflow files, and listing supported actions.

pub mod commands;

pub use commands::Cli;

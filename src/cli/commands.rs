//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: execute a workflow against a device
//! - check: parse and validate a workflow file
//! - list-actions: print the supported action names

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tapdance - drive an app by watching its screen
#[derive(Parser, Debug)]
#[command(name = "tapdance")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a workflow
    Run {
        /// Workflow YAML file
        workflow: PathBuf,

        /// Repeat the workflow until stopped instead of running once
        #[arg(long = "loop")]
        repeat: bool,

        /// ADB device serial (defaults to the only connected device)
        #[arg(short, long)]
        device: Option<String>,

        /// Directory holding template images
        #[arg(short, long, default_value = "templates")]
        templates: PathBuf,

        /// Save annotated match frames into this directory
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },

    /// Parse a workflow file and report problems without running it
    Check {
        /// Workflow YAML file
        workflow: PathBuf,
    },

    /// List the action names steps may use
    ListActions,
}

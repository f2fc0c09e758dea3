//! Error types for tapdance
//!
//! Centralized error handling using thiserror.
//!
//! Propagation policy: load-time and configuration errors fail fast and
//! loud; transient visual-matching misses are absorbed by the step
//! executor's retry loop; only exhaustion of all structured recovery
//! mechanisms becomes a terminal, user-visible failure. Cancellation is
//! never an error.

use std::path::PathBuf;

use thiserror::Error;

/// All error types that can occur in tapdance
#[derive(Debug, Error)]
pub enum TapdanceError {
    /// Workflow file does not exist
    #[error("Workflow file not found: {0}")]
    WorkflowFileNotFound(PathBuf),

    /// Workflow file is not valid YAML
    #[error("Invalid YAML syntax in {file}: {detail}")]
    WorkflowSyntax { file: String, detail: String },

    /// Workflow file parsed but its structure is invalid
    #[error("{}", format_validation(.message, .file, .step))]
    WorkflowValidation {
        message: String,
        file: Option<String>,
        step: Option<usize>,
    },

    /// Template asset is missing or cannot be decoded
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Action name is not registered with the action backend
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Action backend failed to dispatch input
    #[error("Action '{action}' failed: {detail}")]
    ActionFailed { action: String, detail: String },

    /// Capture backend failed to produce a frame
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// State recovery could not re-localize the workflow
    #[error("Could not recover workflow state after {attempts} attempts (max: {max})")]
    StateRecoveryExhausted { attempts: u32, max: u32 },

    /// Step field is out of range or missing
    #[error("Invalid step: {0}")]
    InvalidStep(String),

    /// Region with non-positive dimensions
    #[error("Region dimensions must be positive: width={width}, height={height}")]
    InvalidRegion { width: i64, height: i64 },

    /// Match confidence outside [0, 1]
    #[error("Confidence must be between 0 and 1, got {0}")]
    InvalidConfidence(f64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

fn format_validation(message: &str, file: &Option<String>, step: &Option<usize>) -> String {
    let mut out = message.to_string();
    if let Some(file) = file {
        out = format!("{out} in {file}");
    }
    if let Some(step) = step {
        out = format!("{out} (step {step})");
    }
    out
}

impl TapdanceError {
    /// Build a validation error with file and step context.
    pub fn validation(message: impl Into<String>, file: Option<&str>, step: Option<usize>) -> Self {
        Self::WorkflowValidation {
            message: message.into(),
            file: file.map(str::to_string),
            step,
        }
    }
}

/// Result type alias for tapdance operations
pub type Result<T> = std::result::Result<T, TapdanceError>;

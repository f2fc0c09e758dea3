//! Vision: template matching and match diagnostics.

pub mod debug;
pub mod matcher;

pub use debug::DebugSink;
pub use matcher::{TemplateMatcher, DEFAULT_SCALES};

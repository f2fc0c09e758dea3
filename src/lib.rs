//! tapdance - visually-grounded workflow automation
//!
//! tapdance drives an external application (a desktop window or an Android
//! device) by repeatedly capturing its screen, locating visual landmarks
//! with multi-scale template matching, and issuing synthetic input at the
//! matched location, according to a declarative YAML plan of steps and
//! loops. A failed step triggers self-healing: the whole flattened plan is
//! rescanned against the live screen to re-localize execution.

pub mod backend;
pub mod domain;
pub mod error;
pub mod vision;
pub mod workflow;

pub use error::{Result, TapdanceError};

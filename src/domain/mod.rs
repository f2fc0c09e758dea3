//! Domain types for tapdance
//!
//! This module contains the core value and plan types:
//! - Position, Region: immutable geometry
//! - MatchResult: outcome of a template search (Found or NotFound)
//! - Step: one find-and-act unit with its retry/verify policy
//! - Loop, WorkflowItem: the user-authored nested plan structure
//! - StopFlag: shared cooperative cancellation flag

pub mod item;
pub mod match_result;
pub mod position;
pub mod region;
pub mod signal;
pub mod step;

pub use item::{Iterations, Loop, WorkflowItem};
pub use match_result::MatchResult;
pub use position::Position;
pub use region::Region;
pub use signal::{StopFlag, STOP_CHECK_INTERVAL};
pub use step::{Step, StepBuilder};

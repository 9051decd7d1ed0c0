//! State module for tracking per-candidate progress
//!
//! # Components
//!
//! - `CandidateOutcome`: terminal state of one candidate in a cycle
//! - `AbsentReason`: why an extraction yielded no archivable article

mod outcome;

pub use outcome::{AbsentReason, CandidateOutcome};

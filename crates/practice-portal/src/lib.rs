//! Practice application lifecycle for the student internship portal.
//!
//! The crate owns the review workflow for internship applications, the capacity-constrained
//! slot allocator behind acceptance, and the grading aggregation used for progress tracking
//! and formal closure. Identity, file storage, and e-mail delivery are consumed through the
//! collaborator traits in [`workflows::practice`].

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;

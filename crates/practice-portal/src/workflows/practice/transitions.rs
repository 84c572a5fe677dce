//! Review status transition table.
//!
//! `rejected` is absorbing and an accepted application cannot be sent back for more
//! information. Every other pair is allowed, including `accepted -> rejected`.

use super::domain::ApplicationStatus::{self, Accepted, NeedsInfo, Pending, Rejected};
use super::domain::PracticeError;

/// Allowed `(from, to)` pairs.
pub const ALLOWED_TRANSITIONS: &[(ApplicationStatus, ApplicationStatus)] = &[
    (Pending, Pending),
    (Pending, Accepted),
    (Pending, Rejected),
    (Pending, NeedsInfo),
    (Accepted, Pending),
    (Accepted, Accepted),
    (Accepted, Rejected),
    (NeedsInfo, Pending),
    (NeedsInfo, Accepted),
    (NeedsInfo, Rejected),
    (NeedsInfo, NeedsInfo),
];

pub fn is_allowed(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    ALLOWED_TRANSITIONS.contains(&(from, to))
}

pub fn ensure_allowed(from: ApplicationStatus, to: ApplicationStatus) -> Result<(), PracticeError> {
    if is_allowed(from, to) {
        return Ok(());
    }

    let reason = if from.is_terminal() {
        format!("{from} is terminal and cannot move to {to}")
    } else {
        format!("{from} applications cannot move to {to}")
    };
    Err(PracticeError::invalid_transition(from, reason))
}

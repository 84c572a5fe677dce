//! Grade aggregation over application documents.
//!
//! Two formulas coexist and answer different questions. The tracking average is an
//! in-progress, percentage-weighted estimate over approved documents; the closure average is
//! the plain mean over every document at formal closure. They are kept as separate types so a
//! caller cannot read one where the other was meant.

mod closure;
mod tracking;

pub use closure::{compute_closure_average, ClosureAverage};
pub use tracking::{compute_tracking_average, TrackingAverage};

use super::domain::DocumentId;

/// Aggregation failures raised by the closure formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GradingError {
    #[error("no documents to aggregate")]
    NoDocuments,
    #[error("{} document(s) are missing a grade", .missing.len())]
    IncompleteGrading { missing: Vec<DocumentId> },
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::round_to;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(4.25, 1), 4.3);
        assert_eq!(round_to(5.125, 2), 5.13);
        assert_eq!(round_to(5.0, 1), 5.0);
    }
}

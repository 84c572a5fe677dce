use serde::{Deserialize, Serialize};

use super::round_to;
use crate::workflows::practice::domain::{Document, DocumentStatus};

const FULL_WEIGHT: f64 = 100.0;
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Progress estimate over approved, graded documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingAverage {
    pub average: Option<f64>,
    pub total_weight: f64,
    pub is_complete: bool,
}

impl TrackingAverage {
    pub const fn empty() -> Self {
        Self {
            average: None,
            total_weight: 0.0,
            is_complete: false,
        }
    }
}

/// Weighted contribution model: each approved grade contributes `grade * weight / 100`.
///
/// The sum is not divided by the total weight, so a partially weighted set yields a partial
/// average. When no document carries a weight the plain mean is used instead.
pub fn compute_tracking_average(documents: &[Document]) -> TrackingAverage {
    let graded: Vec<(f64, f64)> = documents
        .iter()
        .filter(|document| document.status == DocumentStatus::Approved)
        .filter_map(|document| document.grade.map(|grade| (grade, document.weight)))
        .collect();

    if graded.is_empty() {
        return TrackingAverage::empty();
    }

    let total_weight: f64 = graded.iter().map(|(_, weight)| weight).sum();

    if total_weight > 0.0 {
        let weighted: f64 = graded
            .iter()
            .map(|(grade, weight)| grade * weight / FULL_WEIGHT)
            .sum();
        return TrackingAverage {
            average: Some(round_to(weighted, 2)),
            total_weight,
            is_complete: (total_weight - FULL_WEIGHT).abs() < WEIGHT_TOLERANCE,
        };
    }

    let mean = graded.iter().map(|(grade, _)| grade).sum::<f64>() / graded.len() as f64;
    TrackingAverage {
        average: Some(round_to(mean, 2)),
        total_weight: 0.0,
        is_complete: true,
    }
}

use serde::{Deserialize, Serialize};

use super::{round_to, GradingError};
use crate::workflows::practice::domain::Document;

/// Final unweighted mean computed at formal closure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosureAverage {
    pub average: f64,
    pub graded_documents: usize,
}

/// Plain arithmetic mean of every grade, rounded to one decimal.
///
/// Document status and weight are ignored; a single missing grade fails the whole set.
pub fn compute_closure_average(documents: &[Document]) -> Result<ClosureAverage, GradingError> {
    if documents.is_empty() {
        return Err(GradingError::NoDocuments);
    }

    let missing: Vec<_> = documents
        .iter()
        .filter(|document| document.grade.is_none())
        .map(|document| document.id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(GradingError::IncompleteGrading { missing });
    }

    let sum: f64 = documents.iter().filter_map(|document| document.grade).sum();
    Ok(ClosureAverage {
        average: round_to(sum / documents.len() as f64, 1),
        graded_documents: documents.len(),
    })
}

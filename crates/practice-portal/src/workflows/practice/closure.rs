use chrono::{DateTime, Utc};

use super::domain::{ApplicationId, Document, FinalResult, PracticeApplication, PracticeError};
use super::grading::{compute_closure_average, ClosureAverage};
use super::repository::StoreTransaction;

/// Pass/fail at the threshold; reaching it exactly counts as a pass.
pub fn verdict(average: f64, min_average: f64) -> FinalResult {
    if average >= min_average {
        FinalResult::Approved
    } else {
        FinalResult::Failed
    }
}

/// Seals an application once every gradable document carries a grade.
#[derive(Debug, Clone)]
pub struct ClosureEngine {
    default_min_average: f64,
}

impl ClosureEngine {
    pub fn new(default_min_average: f64) -> Self {
        Self {
            default_min_average,
        }
    }

    /// Attachments are supporting files and are left out of the closure input.
    pub fn gradable(documents: Vec<Document>) -> Vec<Document> {
        documents
            .into_iter()
            .filter(|document| document.kind.is_gradable())
            .collect()
    }

    pub(crate) fn close(
        &self,
        tx: &mut dyn StoreTransaction,
        application_id: &ApplicationId,
        min_average: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<(PracticeApplication, ClosureAverage), PracticeError> {
        let min_average = min_average.unwrap_or(self.default_min_average);
        if !min_average.is_finite() || min_average < 0.0 {
            return Err(PracticeError::Validation(format!(
                "minimum average must be a non-negative number, got {min_average}"
            )));
        }

        let mut application = tx
            .application(application_id)?
            .ok_or_else(|| PracticeError::not_found("application", application_id))?;

        if application.is_closed {
            return Err(PracticeError::AlreadyClosed(application.id));
        }

        let documents = Self::gradable(tx.documents_for_application(application_id)?);
        let closure = compute_closure_average(&documents)?;

        application.final_average = Some(closure.average);
        application.final_result = Some(verdict(closure.average, min_average));
        application.is_closed = true;
        application.closed_at = Some(now);
        application.updated_at = now;

        tx.update_application(application.clone())?;
        Ok((application, closure))
    }
}

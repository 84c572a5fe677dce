use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::closure::ClosureEngine;
use super::config::PracticeConfig;
use super::domain::{
    ApplicationId, ApplicationStatus, Document, DocumentStatus, Internship, InternshipId,
    PracticeApplication, PracticeError, PracticeTarget, StudentId,
};
use super::grading::{compute_tracking_average, TrackingAverage};
use super::notify::{NotificationService, StatusChangeNotice, StudentDirectory};
use super::repository::PracticeStore;
use super::slots::{SlotAllocator, SlotAvailability, SlotReservation};
use super::transitions;

static RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Ids stay unique across restarts of a persistent store by leading with the creation time.
fn next_record_id(prefix: &str) -> String {
    let sequence = RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{prefix}-{:x}-{sequence:06}",
        Utc::now().timestamp_millis()
    )
}

/// Staff-supplied fields for a new internship offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInternship {
    pub title: String,
    pub company: String,
    pub total_slots: u32,
    pub application_deadline: NaiveDate,
}

/// Student-supplied fields for a new practice application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApplication {
    pub student_id: StudentId,
    pub target: PracticeTarget,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Coordinator request to move an application to a new review status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub application_id: ApplicationId,
    pub new_status: ApplicationStatus,
    #[serde(default)]
    pub comments: Option<String>,
    pub actor_id: String,
    /// Confirms acceptance even though the student already holds an accepted application.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    DuplicateAcceptedApplication,
}

impl WarningCode {
    pub const fn code(self) -> &'static str {
        match self {
            WarningCode::DuplicateAcceptedApplication => "DUPLICATE_ACCEPTED_APPLICATION",
        }
    }
}

/// Soft stop that the caller may override by retrying with `force`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionWarning {
    pub code: WarningCode,
    pub message: String,
    pub conflicting_application_id: ApplicationId,
}

impl TransitionWarning {
    fn duplicate_accepted(student_id: &StudentId, existing: &ApplicationId) -> Self {
        Self {
            code: WarningCode::DuplicateAcceptedApplication,
            message: format!(
                "student {student_id} already has accepted application {existing}; \
                 resubmit with force to accept another"
            ),
            conflicting_application_id: existing.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(PracticeApplication),
    Warning(TransitionWarning),
}

/// Which documents feed a tracking average.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingScope {
    Application(ApplicationId),
    /// The student's most recently created accepted application.
    Student(StudentId),
}

/// Service composing the store, slot allocator, closure engine, and notification hooks.
pub struct PracticeApplicationService<S, N, D> {
    store: Arc<S>,
    notifier: Arc<N>,
    directory: Arc<D>,
    allocator: SlotAllocator,
    closure: ClosureEngine,
}

impl<S, N, D> PracticeApplicationService<S, N, D>
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, directory: Arc<D>, config: PracticeConfig) -> Self {
        Self {
            store,
            notifier,
            directory,
            allocator: SlotAllocator::new(),
            closure: ClosureEngine::new(config.default_min_average),
        }
    }

    pub fn register_internship(
        &self,
        offer: NewInternship,
    ) -> Result<Internship, PracticeError> {
        if offer.total_slots == 0 {
            return Err(PracticeError::Validation(
                "internship must offer at least one slot".to_string(),
            ));
        }
        if offer.title.trim().is_empty() {
            return Err(PracticeError::Validation(
                "internship title is required".to_string(),
            ));
        }

        let internship = Internship {
            id: InternshipId(next_record_id("int")),
            title: offer.title.trim().to_string(),
            company: offer.company.trim().to_string(),
            total_slots: offer.total_slots,
            occupied_slots: 0,
            application_deadline: offer.application_deadline,
        };

        self.store.transaction::<_, PracticeError, _>(|tx| {
            tx.insert_internship(internship.clone())?;
            Ok(())
        })?;

        info!(
            internship_id = %internship.id,
            total_slots = internship.total_slots,
            "internship registered"
        );
        Ok(internship)
    }

    /// Submit a new application in `pending`.
    pub fn create_application(
        &self,
        request: NewApplication,
    ) -> Result<PracticeApplication, PracticeError> {
        let NewApplication {
            student_id,
            target,
            metadata,
        } = request;

        if student_id.0.trim().is_empty() {
            return Err(PracticeError::Validation(
                "student id is required".to_string(),
            ));
        }
        if let PracticeTarget::External {
            internship_external_id,
        } = &target
        {
            if internship_external_id.trim().is_empty() {
                return Err(PracticeError::Validation(
                    "external applications require an external internship id".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let application = PracticeApplication {
            id: ApplicationId(next_record_id("app")),
            student_id,
            target,
            status: ApplicationStatus::Pending,
            coordinator_comments: None,
            metadata,
            is_closed: false,
            final_average: None,
            final_result: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.transaction::<_, PracticeError, _>(|tx| {
            if let Some(internship_id) = application.target.internship_id() {
                let internship = tx
                    .internship(internship_id)?
                    .ok_or_else(|| PracticeError::not_found("internship", internship_id))?;
                if !internship.accepts_applications_on(now.date_naive()) {
                    return Err(PracticeError::Validation(format!(
                        "applications for internship {} closed on {}",
                        internship.id, internship.application_deadline
                    )));
                }
            }
            tx.insert_application(application.clone())?;
            Ok(())
        })?;

        info!(
            application_id = %application.id,
            student_id = %application.student_id,
            application_type = application.application_type().label(),
            "practice application created"
        );
        Ok(application)
    }

    /// Move an application through the review workflow.
    ///
    /// Capacity is checked before the duplicate-acceptance warning, and the slot is only
    /// reserved once neither applies. All of it shares one unit of work with the status write,
    /// so a warning or failure leaves the application and the internship untouched.
    pub fn transition(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, PracticeError> {
        let TransitionRequest {
            application_id,
            new_status,
            comments,
            actor_id,
            force,
        } = request;

        let comments = comments
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());

        let (outcome, previous) = self.store.transaction::<_, PracticeError, _>(|tx| {
            let mut application = tx
                .application(&application_id)?
                .ok_or_else(|| PracticeError::not_found("application", &application_id))?;
            let previous = application.status;

            if application.is_closed {
                return Err(PracticeError::invalid_transition(
                    previous,
                    "closed applications cannot change status",
                ));
            }
            transitions::ensure_allowed(previous, new_status)?;
            if new_status.requires_comments() && comments.is_none() {
                return Err(PracticeError::Validation(format!(
                    "comments are required when marking an application {new_status}"
                )));
            }

            let claims_slot =
                new_status == ApplicationStatus::Accepted && previous != ApplicationStatus::Accepted;
            let internship_id = application.target.internship_id().cloned();

            if claims_slot {
                if let Some(internship_id) = &internship_id {
                    let slots = self.allocator.availability(tx, internship_id)?;
                    if slots.remaining == 0 {
                        return Err(PracticeError::CapacityExhausted {
                            internship_id: internship_id.clone(),
                            occupied: slots.occupied,
                            total: slots.total,
                        });
                    }
                }
            }

            if new_status == ApplicationStatus::Accepted && !force {
                let duplicate = tx
                    .applications_for_student(&application.student_id)?
                    .into_iter()
                    .find(|other| {
                        other.id != application.id && other.status == ApplicationStatus::Accepted
                    });
                if let Some(other) = duplicate {
                    return Ok((
                        TransitionOutcome::Warning(TransitionWarning::duplicate_accepted(
                            &application.student_id,
                            &other.id,
                        )),
                        previous,
                    ));
                }
            }

            if claims_slot {
                if let Some(internship_id) = &internship_id {
                    if let SlotReservation::Denied { occupied, total } =
                        self.allocator.try_reserve(tx, internship_id)?
                    {
                        return Err(PracticeError::CapacityExhausted {
                            internship_id: internship_id.clone(),
                            occupied,
                            total,
                        });
                    }
                }
            }

            application.status = new_status;
            application.coordinator_comments = if new_status.requires_comments() {
                comments.clone()
            } else {
                None
            };
            application.updated_at = Utc::now();
            tx.update_application(application.clone())?;

            Ok((TransitionOutcome::Applied(application), previous))
        })?;

        match &outcome {
            TransitionOutcome::Applied(application) => {
                info!(
                    application_id = %application.id,
                    actor_id = %actor_id,
                    from = previous.label(),
                    to = new_status.label(),
                    force,
                    "practice application transitioned"
                );
                self.notify_status_change(application);
            }
            TransitionOutcome::Warning(warning) => {
                info!(
                    application_id = %application_id,
                    actor_id = %actor_id,
                    code = warning.code.code(),
                    "acceptance needs confirmation"
                );
            }
        }

        Ok(outcome)
    }

    /// Formally close an accepted application with a pass/fail verdict.
    pub fn close_application(
        &self,
        application_id: &ApplicationId,
        min_average: Option<f64>,
    ) -> Result<PracticeApplication, PracticeError> {
        let (application, closure) = self
            .store
            .transaction(|tx| self.closure.close(tx, application_id, min_average, Utc::now()))?;

        info!(
            application_id = %application.id,
            final_average = closure.average,
            graded_documents = closure.graded_documents,
            final_result = application.final_result.map(|result| result.label()),
            "practice application closed"
        );
        Ok(application)
    }

    pub fn tracking_average(&self, scope: TrackingScope) -> Result<TrackingAverage, PracticeError> {
        self.store.transaction::<_, PracticeError, _>(|tx| {
            let application_id = match scope {
                TrackingScope::Application(id) => {
                    tx.application(&id)?
                        .ok_or_else(|| PracticeError::not_found("application", &id))?
                        .id
                }
                TrackingScope::Student(student_id) => tx
                    .applications_for_student(&student_id)?
                    .into_iter()
                    .rev()
                    .find(|application| application.status == ApplicationStatus::Accepted)
                    .ok_or_else(|| {
                        PracticeError::not_found("accepted application for student", &student_id)
                    })?
                    .id,
            };

            let documents = tx.documents_for_application(&application_id)?;
            Ok(compute_tracking_average(&documents))
        })
    }

    /// Owner-initiated removal, allowed only before the application is decided.
    pub fn withdraw_application(
        &self,
        application_id: &ApplicationId,
        student_id: &StudentId,
    ) -> Result<(), PracticeError> {
        self.store.transaction(|tx| {
            let application = tx
                .application(application_id)?
                .ok_or_else(|| PracticeError::not_found("application", application_id))?;

            if &application.student_id != student_id {
                return Err(PracticeError::Validation(format!(
                    "application {application_id} does not belong to student {student_id}"
                )));
            }
            if !matches!(
                application.status,
                ApplicationStatus::Pending | ApplicationStatus::NeedsInfo
            ) {
                return Err(PracticeError::invalid_transition(
                    application.status,
                    "only pending or needs_info applications can be withdrawn",
                ));
            }

            tx.delete_application(application_id)?;
            Ok(())
        })?;

        info!(%application_id, %student_id, "practice application withdrawn");
        Ok(())
    }

    /// Record an upload or an evaluation of a document.
    pub fn upsert_document(&self, document: Document) -> Result<Document, PracticeError> {
        if !(0.0..=100.0).contains(&document.weight) {
            return Err(PracticeError::Validation(format!(
                "document weight must be between 0 and 100, got {}",
                document.weight
            )));
        }
        match document.grade {
            Some(grade) if !grade.is_finite() || grade < 0.0 => {
                return Err(PracticeError::Validation(format!(
                    "document grade must be a non-negative number, got {grade}"
                )));
            }
            Some(_) if !document.kind.is_gradable() => {
                return Err(PracticeError::Validation(format!(
                    "{} documents cannot be graded",
                    document.kind.label()
                )));
            }
            _ => {}
        }

        self.store.transaction(|tx| {
            let application = tx
                .application(&document.practice_application_id)?
                .ok_or_else(|| {
                    PracticeError::not_found("application", &document.practice_application_id)
                })?;
            if application.is_closed {
                return Err(PracticeError::Validation(format!(
                    "application {} is closed; its documents are final",
                    application.id
                )));
            }
            if let Some(existing) = tx.document(&document.id)? {
                if existing.practice_application_id != document.practice_application_id {
                    return Err(PracticeError::Validation(format!(
                        "document {} belongs to another application",
                        document.id
                    )));
                }
            }
            tx.upsert_document(document.clone())?;
            Ok(())
        })?;

        if document.status != DocumentStatus::Pending {
            info!(
                document_id = %document.id,
                application_id = %document.practice_application_id,
                status = document.status.label(),
                grade = document.grade,
                weight = document.weight,
                "document evaluated"
            );
        }
        Ok(document)
    }

    pub fn get_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<PracticeApplication, PracticeError> {
        self.store.transaction(|tx| {
            tx.application(application_id)?
                .ok_or_else(|| PracticeError::not_found("application", application_id))
        })
    }

    pub fn documents(&self, application_id: &ApplicationId) -> Result<Vec<Document>, PracticeError> {
        self.store.transaction(|tx| {
            if tx.application(application_id)?.is_none() {
                return Err(PracticeError::not_found("application", application_id));
            }
            Ok(tx.documents_for_application(application_id)?)
        })
    }

    pub fn internship(&self, internship_id: &InternshipId) -> Result<Internship, PracticeError> {
        self.store.transaction(|tx| {
            tx.internship(internship_id)?
                .ok_or_else(|| PracticeError::not_found("internship", internship_id))
        })
    }

    pub fn slot_availability(
        &self,
        internship_id: &InternshipId,
    ) -> Result<SlotAvailability, PracticeError> {
        self.store
            .transaction(|tx| self.allocator.availability(tx, internship_id))
    }

    /// Best effort; runs after commit and never fails the transition.
    fn notify_status_change(&self, application: &PracticeApplication) {
        let Some(contact) = self.directory.contact(&application.student_id) else {
            warn!(
                application_id = %application.id,
                student_id = %application.student_id,
                "no contact on file; skipping status change notification"
            );
            return;
        };

        let notice = StatusChangeNotice {
            application_id: application.id.clone(),
            student_email: contact.email,
            student_name: contact.display_name,
            application_summary: application.summary(),
            new_status: application.status,
            comments: application.coordinator_comments.clone(),
        };

        if let Err(err) = self.notifier.notify_status_change(notice) {
            warn!(
                application_id = %application.id,
                error = %err,
                "status change notification failed"
            );
        }
    }
}

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::grading::GradingError;
use super::repository::RepositoryError;

/// Identifier wrapper for practice applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for internship offers published by staff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InternshipId(pub String);

/// Identifier supplied by the identity collaborator for a student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for InternshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Internship offer and its capacity counters.
///
/// `occupied_slots` never exceeds `total_slots`; only the slot allocator increments it and
/// nothing in this crate decrements it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Internship {
    pub id: InternshipId,
    pub title: String,
    pub company: String,
    pub total_slots: u32,
    pub occupied_slots: u32,
    pub application_deadline: NaiveDate,
}

impl Internship {
    pub fn remaining_slots(&self) -> u32 {
        self.total_slots.saturating_sub(self.occupied_slots)
    }

    pub fn has_capacity(&self) -> bool {
        self.occupied_slots < self.total_slots
    }

    pub fn accepts_applications_on(&self, date: NaiveDate) -> bool {
        date <= self.application_deadline
    }
}

/// Whether the application targets an offer published in the portal or one the student
/// arranged externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    Existing,
    External,
}

impl ApplicationType {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationType::Existing => "existing",
            ApplicationType::External => "external",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "existing" => Some(Self::Existing),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

/// Target of an application. Exactly one of the internship link or the external reference
/// exists, so the pair is modelled as a single tagged value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "application_type", rename_all = "snake_case")]
pub enum PracticeTarget {
    Existing { internship_id: InternshipId },
    External { internship_external_id: String },
}

impl PracticeTarget {
    /// Build a target from the loosely typed wire form (`application_type` + target id).
    pub fn parse(application_type: &str, target_id: &str) -> Result<Self, PracticeError> {
        let kind = ApplicationType::from_label(application_type).ok_or_else(|| {
            PracticeError::Validation(format!(
                "unknown application type '{application_type}' (expected existing or external)"
            ))
        })?;

        let target_id = target_id.trim();
        if target_id.is_empty() {
            return Err(PracticeError::Validation(format!(
                "{} applications require a target id",
                kind.label()
            )));
        }

        Ok(match kind {
            ApplicationType::Existing => PracticeTarget::Existing {
                internship_id: InternshipId(target_id.to_string()),
            },
            ApplicationType::External => PracticeTarget::External {
                internship_external_id: target_id.to_string(),
            },
        })
    }

    pub fn application_type(&self) -> ApplicationType {
        match self {
            PracticeTarget::Existing { .. } => ApplicationType::Existing,
            PracticeTarget::External { .. } => ApplicationType::External,
        }
    }

    pub fn internship_id(&self) -> Option<&InternshipId> {
        match self {
            PracticeTarget::Existing { internship_id } => Some(internship_id),
            PracticeTarget::External { .. } => None,
        }
    }

    pub fn internship_external_id(&self) -> Option<&str> {
        match self {
            PracticeTarget::Existing { .. } => None,
            PracticeTarget::External {
                internship_external_id,
            } => Some(internship_external_id),
        }
    }
}

/// Review status of a practice application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    NeedsInfo,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::NeedsInfo,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::NeedsInfo => "needs_info",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.label() == raw.trim())
    }

    /// Statuses that must carry a coordinator explanation.
    pub const fn requires_comments(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected | ApplicationStatus::NeedsInfo
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Rejected)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict sealed at closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalResult {
    Approved,
    Failed,
}

impl FinalResult {
    pub const fn label(self) -> &'static str {
        match self {
            FinalResult::Approved => "approved",
            FinalResult::Failed => "failed",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "approved" => Some(Self::Approved),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Internship application owned by a student and reviewed by a coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeApplication {
    pub id: ApplicationId,
    pub student_id: StudentId,
    pub target: PracticeTarget,
    pub status: ApplicationStatus,
    pub coordinator_comments: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub is_closed: bool,
    pub final_average: Option<f64>,
    pub final_result: Option<FinalResult>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PracticeApplication {
    pub fn application_type(&self) -> ApplicationType {
        self.target.application_type()
    }

    /// One-line description used in notifications and logs.
    pub fn summary(&self) -> String {
        match &self.target {
            PracticeTarget::Existing { internship_id } => {
                format!("application {} for internship {}", self.id, internship_id)
            }
            PracticeTarget::External {
                internship_external_id,
            } => match self.metadata.get("company") {
                Some(company) => format!(
                    "application {} for external practice {} at {}",
                    self.id, internship_external_id, company
                ),
                None => format!(
                    "application {} for external practice {}",
                    self.id, internship_external_id
                ),
            },
        }
    }
}

/// Category of an uploaded artifact. Attachments are supporting files and never carry a grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    WorkPlan,
    ProgressReport,
    FinalReport,
    SupervisorEvaluation,
    Presentation,
    Attachment,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::WorkPlan,
        DocumentKind::ProgressReport,
        DocumentKind::FinalReport,
        DocumentKind::SupervisorEvaluation,
        DocumentKind::Presentation,
        DocumentKind::Attachment,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            DocumentKind::WorkPlan => "work_plan",
            DocumentKind::ProgressReport => "progress_report",
            DocumentKind::FinalReport => "final_report",
            DocumentKind::SupervisorEvaluation => "supervisor_evaluation",
            DocumentKind::Presentation => "presentation",
            DocumentKind::Attachment => "attachment",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == raw.trim())
    }

    pub const fn is_gradable(self) -> bool {
        !matches!(self, DocumentKind::Attachment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Graded artifact attached to an application. Only `grade`, `weight`, and `status` matter to
/// the aggregation; file contents live with the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub practice_application_id: ApplicationId,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub grade: Option<f64>,
    /// Percentage contribution (0–100) to the tracking average.
    #[serde(default)]
    pub weight: f64,
    pub uploaded_by: String,
}

impl Document {
    /// A freshly uploaded, not yet evaluated document.
    pub fn uploaded(
        id: DocumentId,
        practice_application_id: ApplicationId,
        kind: DocumentKind,
        uploaded_by: impl Into<String>,
    ) -> Self {
        Self {
            id,
            practice_application_id,
            kind,
            status: DocumentStatus::Pending,
            grade: None,
            weight: 0.0,
            uploaded_by: uploaded_by.into(),
        }
    }
}

/// Failures surfaced by lifecycle operations. Every variant leaves stored records untouched.
#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid transition from {from}: {reason}")]
    InvalidTransition {
        from: ApplicationStatus,
        reason: String,
    },
    #[error("internship {internship_id} has no free slots ({occupied}/{total} occupied)")]
    CapacityExhausted {
        internship_id: InternshipId,
        occupied: u32,
        total: u32,
    },
    #[error("{} document(s) still need a grade", .missing.len())]
    IncompleteGrading { missing: Vec<DocumentId> },
    #[error("application has no documents to grade")]
    NoDocuments,
    #[error("application {0} is already closed")]
    AlreadyClosed(ApplicationId),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl PracticeError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        PracticeError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_transition(from: ApplicationStatus, reason: impl Into<String>) -> Self {
        PracticeError::InvalidTransition {
            from,
            reason: reason.into(),
        }
    }
}

impl From<GradingError> for PracticeError {
    fn from(value: GradingError) -> Self {
        match value {
            GradingError::NoDocuments => PracticeError::NoDocuments,
            GradingError::IncompleteGrading { missing } => {
                PracticeError::IncompleteGrading { missing }
            }
        }
    }
}

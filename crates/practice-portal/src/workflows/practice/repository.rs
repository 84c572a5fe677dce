use super::domain::{
    ApplicationId, Document, DocumentId, Internship, InternshipId, PracticeApplication, StudentId,
};
use super::slots::SlotReservation;

/// Storage abstraction so lifecycle operations run as one all-or-nothing unit of work.
///
/// Implementations must serialize units of work that touch the same internship row, and must
/// discard every write made inside `work` when it returns `Err`.
pub trait PracticeStore: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>;
}

/// Operations available inside a unit of work.
pub trait StoreTransaction {
    fn internship(&mut self, id: &InternshipId) -> Result<Option<Internship>, RepositoryError>;
    fn insert_internship(&mut self, internship: Internship) -> Result<(), RepositoryError>;

    /// Atomically claim one slot if `occupied < total`. Missing internship is `NotFound`.
    fn reserve_slot(&mut self, id: &InternshipId) -> Result<SlotReservation, RepositoryError>;

    fn application(
        &mut self,
        id: &ApplicationId,
    ) -> Result<Option<PracticeApplication>, RepositoryError>;
    /// Applications owned by a student, oldest first.
    fn applications_for_student(
        &mut self,
        student_id: &StudentId,
    ) -> Result<Vec<PracticeApplication>, RepositoryError>;
    fn insert_application(&mut self, application: PracticeApplication)
        -> Result<(), RepositoryError>;
    fn update_application(&mut self, application: PracticeApplication)
        -> Result<(), RepositoryError>;
    fn delete_application(&mut self, id: &ApplicationId) -> Result<(), RepositoryError>;

    /// Documents attached to an application, ordered by id.
    fn documents_for_application(
        &mut self,
        id: &ApplicationId,
    ) -> Result<Vec<Document>, RepositoryError>;
    fn document(&mut self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;
    fn upsert_document(&mut self, document: Document) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stored record is malformed: {0}")]
    Malformed(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

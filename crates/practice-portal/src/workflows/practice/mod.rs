//! Practice application lifecycle: review state machine, internship slot allocation, and the
//! grading aggregation behind progress tracking and formal closure.
//!
//! Every mutating operation runs as a single unit of work against a [`PracticeStore`]; either
//! the whole transition or closure commits, or nothing does. Notifications are dispatched
//! after commit and never hold a store lock.

pub(crate) mod closure;
mod config;
pub mod domain;
pub mod grading;
pub mod memory;
pub mod notify;
pub mod repository;
pub mod router;
pub mod service;
pub mod slots;
pub mod sqlite;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use closure::{verdict, ClosureEngine};
pub use config::PracticeConfig;
pub use domain::{
    ApplicationId, ApplicationStatus, ApplicationType, Document, DocumentId, DocumentKind,
    DocumentStatus, FinalResult, Internship, InternshipId, PracticeApplication, PracticeError,
    PracticeTarget, StudentId,
};
pub use grading::{
    compute_closure_average, compute_tracking_average, ClosureAverage, GradingError,
    TrackingAverage,
};
pub use memory::InMemoryPracticeStore;
pub use notify::{
    NotificationError, NotificationService, QueuedNotifier, StatusChangeNotice, StudentContact,
    StudentDirectory,
};
pub use repository::{PracticeStore, RepositoryError, StoreTransaction};
pub use router::{error_response, practice_router};
pub use service::{
    NewApplication, NewInternship, PracticeApplicationService, TrackingScope, TransitionOutcome,
    TransitionRequest, TransitionWarning, WarningCode,
};
pub use slots::{SlotAllocator, SlotAvailability, SlotReservation};
pub use sqlite::SqlitePracticeStore;

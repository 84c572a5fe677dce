use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::practice::domain::{
    ApplicationId, ApplicationStatus, Document, DocumentId, DocumentKind, DocumentStatus,
    Internship, PracticeApplication, PracticeTarget, StudentId,
};
use crate::workflows::practice::notify::{
    NotificationError, NotificationService, StatusChangeNotice, StudentContact, StudentDirectory,
};
use crate::workflows::practice::repository::PracticeStore;
use crate::workflows::practice::service::{
    NewApplication, NewInternship, PracticeApplicationService, TransitionOutcome,
    TransitionRequest,
};
use crate::workflows::practice::{InMemoryPracticeStore, PracticeConfig};

pub(super) type MemoryService =
    PracticeApplicationService<InMemoryPracticeStore, MemoryNotifier, MemoryDirectory>;

pub(super) fn far_deadline() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 12, 31).expect("valid date")
}

pub(super) fn past_deadline() -> NaiveDate {
    NaiveDate::from_ymd_opt(2001, 1, 1).expect("valid date")
}

pub(super) fn offer(total_slots: u32) -> NewInternship {
    NewInternship {
        title: "Backend developer intern".to_string(),
        company: "Acme Logistics".to_string(),
        total_slots,
        application_deadline: far_deadline(),
    }
}

pub(super) fn student(name: &str) -> StudentId {
    StudentId(name.to_string())
}

pub(super) fn service() -> (
    MemoryService,
    InMemoryPracticeStore,
    Arc<MemoryNotifier>,
) {
    let store = InMemoryPracticeStore::new();
    let notifier = Arc::new(MemoryNotifier::default());
    let service = service_with(store.clone(), notifier.clone());
    (service, store, notifier)
}

pub(super) fn service_with<S: PracticeStore + 'static>(
    store: S,
    notifier: Arc<MemoryNotifier>,
) -> PracticeApplicationService<S, MemoryNotifier, MemoryDirectory> {
    PracticeApplicationService::new(
        Arc::new(store),
        notifier,
        Arc::new(MemoryDirectory::with_students(&["ana", "ben", "carla"])),
        PracticeConfig::default(),
    )
}

pub(super) fn apply_existing<S: PracticeStore + 'static>(
    service: &PracticeApplicationService<S, MemoryNotifier, MemoryDirectory>,
    student_id: &str,
    internship: &Internship,
) -> PracticeApplication {
    service
        .create_application(NewApplication {
            student_id: student(student_id),
            target: PracticeTarget::Existing {
                internship_id: internship.id.clone(),
            },
            metadata: BTreeMap::new(),
        })
        .expect("application is created")
}

pub(super) fn apply_external<S: PracticeStore + 'static>(
    service: &PracticeApplicationService<S, MemoryNotifier, MemoryDirectory>,
    student_id: &str,
) -> PracticeApplication {
    let mut metadata = BTreeMap::new();
    metadata.insert("company".to_string(), "Harbor Robotics".to_string());
    service
        .create_application(NewApplication {
            student_id: student(student_id),
            target: PracticeTarget::External {
                internship_external_id: "EXT-2024-17".to_string(),
            },
            metadata,
        })
        .expect("external application is created")
}

pub(super) fn request(
    application: &PracticeApplication,
    new_status: ApplicationStatus,
) -> TransitionRequest {
    TransitionRequest {
        application_id: application.id.clone(),
        new_status,
        comments: None,
        actor_id: "coordinator-7".to_string(),
        force: false,
    }
}

pub(super) fn accept<S: PracticeStore + 'static>(
    service: &PracticeApplicationService<S, MemoryNotifier, MemoryDirectory>,
    application: &PracticeApplication,
) -> PracticeApplication {
    match service
        .transition(request(application, ApplicationStatus::Accepted))
        .expect("acceptance succeeds")
    {
        TransitionOutcome::Applied(updated) => updated,
        TransitionOutcome::Warning(warning) => panic!("unexpected warning: {warning:?}"),
    }
}

pub(super) fn graded(
    id: &str,
    application_id: &ApplicationId,
    grade: Option<f64>,
    weight: f64,
    status: DocumentStatus,
) -> Document {
    Document {
        id: DocumentId(id.to_string()),
        practice_application_id: application_id.clone(),
        kind: DocumentKind::ProgressReport,
        status,
        grade,
        weight,
        uploaded_by: "coordinator-7".to_string(),
    }
}

pub(super) fn approved(id: &str, grade: f64, weight: f64) -> Document {
    graded(
        id,
        &ApplicationId("app-fixture".to_string()),
        Some(grade),
        weight,
        DocumentStatus::Approved,
    )
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<StatusChangeNotice>>,
    fail: bool,
}

impl MemoryNotifier {
    pub(super) fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(super) fn events(&self) -> Vec<StatusChangeNotice> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationService for MemoryNotifier {
    fn notify_status_change(&self, notice: StatusChangeNotice) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::Transport("smtp relay offline".to_string()));
        }
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    contacts: HashMap<StudentId, StudentContact>,
}

impl MemoryDirectory {
    pub(super) fn with_students(names: &[&str]) -> Self {
        let contacts = names
            .iter()
            .map(|name| {
                (
                    student(name),
                    StudentContact {
                        email: format!("{name}@example.edu"),
                        display_name: name.to_string(),
                    },
                )
            })
            .collect();
        Self { contacts }
    }
}

impl StudentDirectory for MemoryDirectory {
    fn contact(&self, student_id: &StudentId) -> Option<StudentContact> {
        self.contacts.get(student_id).cloned()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

use super::common::*;
use crate::workflows::practice::domain::{
    ApplicationStatus, Document, DocumentId, DocumentKind, DocumentStatus, FinalResult,
    PracticeError,
};

fn accepted_external(service: &MemoryService) -> crate::workflows::practice::PracticeApplication {
    let application = apply_external(service, "ana");
    accept(service, &application)
}

#[test]
fn equality_at_the_threshold_passes() {
    let (service, _store, _notifier) = service();
    let application = accepted_external(&service);
    for (id, grade) in [("d1", 5.0), ("d2", 3.0)] {
        service
            .upsert_document(graded(
                id,
                &application.id,
                Some(grade),
                0.0,
                DocumentStatus::Approved,
            ))
            .expect("document");
    }

    let closed = service
        .close_application(&application.id, Some(4.0))
        .expect("closure succeeds");
    assert!(closed.is_closed);
    assert_eq!(closed.final_average, Some(4.0));
    assert_eq!(closed.final_result, Some(FinalResult::Approved));
    assert!(closed.closed_at.is_some());
}

#[test]
fn below_threshold_fails() {
    let (service, _store, _notifier) = service();
    let application = accepted_external(&service);
    for (id, grade) in [("d1", 4.0), ("d2", 3.5)] {
        service
            .upsert_document(graded(
                id,
                &application.id,
                Some(grade),
                50.0,
                DocumentStatus::Pending,
            ))
            .expect("document");
    }

    let closed = service
        .close_application(&application.id, None)
        .expect("closure succeeds");
    assert_eq!(closed.final_average, Some(3.8));
    assert_eq!(closed.final_result, Some(FinalResult::Failed));
}

#[test]
fn closure_requires_documents_and_grades() {
    let (service, _store, _notifier) = service();
    let application = accepted_external(&service);

    assert!(matches!(
        service.close_application(&application.id, None),
        Err(PracticeError::NoDocuments)
    ));

    service
        .upsert_document(graded(
            "d1",
            &application.id,
            Some(6.0),
            50.0,
            DocumentStatus::Approved,
        ))
        .expect("graded");
    service
        .upsert_document(graded(
            "d2",
            &application.id,
            None,
            50.0,
            DocumentStatus::Pending,
        ))
        .expect("ungraded");

    match service.close_application(&application.id, None) {
        Err(PracticeError::IncompleteGrading { missing }) => {
            assert_eq!(missing, vec![DocumentId("d2".to_string())])
        }
        other => panic!("expected incomplete grading, got {other:?}"),
    }

    let stored = service.get_application(&application.id).expect("stored");
    assert!(!stored.is_closed);
    assert!(stored.final_result.is_none());
}

#[test]
fn attachments_are_left_out_of_closure() {
    let (service, _store, _notifier) = service();
    let application = accepted_external(&service);
    service
        .upsert_document(graded(
            "d1",
            &application.id,
            Some(6.0),
            100.0,
            DocumentStatus::Approved,
        ))
        .expect("graded");
    service
        .upsert_document(Document::uploaded(
            DocumentId("d2".to_string()),
            application.id.clone(),
            DocumentKind::Attachment,
            "ana",
        ))
        .expect("attachment");

    let closed = service
        .close_application(&application.id, None)
        .expect("closure ignores attachments");
    assert_eq!(closed.final_average, Some(6.0));
}

#[test]
fn closing_twice_is_rejected() {
    let (service, _store, _notifier) = service();
    let application = accepted_external(&service);
    service
        .upsert_document(graded(
            "d1",
            &application.id,
            Some(6.0),
            100.0,
            DocumentStatus::Approved,
        ))
        .expect("graded");
    let first = service
        .close_application(&application.id, None)
        .expect("first closure");

    assert!(matches!(
        service.close_application(&application.id, None),
        Err(PracticeError::AlreadyClosed(_))
    ));
    let stored = service.get_application(&application.id).expect("stored");
    assert_eq!(stored.closed_at, first.closed_at);
}

#[test]
fn closed_applications_are_frozen() {
    let (service, _store, _notifier) = service();
    let application = accepted_external(&service);
    service
        .upsert_document(graded(
            "d1",
            &application.id,
            Some(6.0),
            100.0,
            DocumentStatus::Approved,
        ))
        .expect("graded");
    service
        .close_application(&application.id, None)
        .expect("closure");

    let mut reject = request(&application, ApplicationStatus::Rejected);
    reject.comments = Some("late objection".to_string());
    assert!(matches!(
        service.transition(reject),
        Err(PracticeError::InvalidTransition { .. })
    ));
    assert!(matches!(
        service.upsert_document(graded(
            "d1",
            &application.id,
            Some(1.0),
            100.0,
            DocumentStatus::Approved,
        )),
        Err(PracticeError::Validation(_))
    ));
}

#[test]
fn pending_applications_close_once_fully_graded() {
    let (service, _store, _notifier) = service();
    let application = apply_external(&service, "ana");
    for (id, grade) in [("d1", 5.0), ("d2", 3.0)] {
        service
            .upsert_document(graded(
                id,
                &application.id,
                Some(grade),
                0.0,
                DocumentStatus::Approved,
            ))
            .expect("document");
    }

    let closed = service
        .close_application(&application.id, Some(4.0))
        .expect("closure does not depend on review status");
    assert_eq!(closed.status, ApplicationStatus::Pending);
    assert_eq!(closed.final_average, Some(4.0));
    assert_eq!(closed.final_result, Some(FinalResult::Approved));
    assert!(closed.is_closed);

    assert!(matches!(
        service.transition(request(&application, ApplicationStatus::Accepted)),
        Err(PracticeError::InvalidTransition {
            from: ApplicationStatus::Pending,
            ..
        })
    ));
}

#[test]
fn closure_rejects_invalid_thresholds_and_unknown_ids() {
    let (service, _store, _notifier) = service();
    let application = accepted_external(&service);

    assert!(matches!(
        service.close_application(&application.id, Some(f64::NAN)),
        Err(PracticeError::Validation(_))
    ));
    assert!(matches!(
        service.close_application(
            &crate::workflows::practice::ApplicationId("app-missing".to_string()),
            None
        ),
        Err(PracticeError::NotFound { .. })
    ));
}

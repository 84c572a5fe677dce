use super::common::*;
use crate::workflows::practice::domain::{ApplicationStatus, PracticeApplication, PracticeError};
use crate::workflows::practice::service::TransitionOutcome;
use crate::workflows::practice::transitions::is_allowed;

fn move_to(
    service: &MemoryService,
    application: &PracticeApplication,
    status: ApplicationStatus,
) -> Result<TransitionOutcome, PracticeError> {
    let mut request = request(application, status);
    if status.requires_comments() {
        request.comments = Some(format!("moving to {status}"));
    }
    service.transition(request)
}

fn application_in(service: &MemoryService, status: ApplicationStatus) -> PracticeApplication {
    let application = apply_external(service, "ben");
    if status == ApplicationStatus::Pending {
        return application;
    }
    match move_to(service, &application, status).expect("setup transition") {
        TransitionOutcome::Applied(updated) => updated,
        TransitionOutcome::Warning(warning) => panic!("unexpected warning: {warning:?}"),
    }
}

#[test]
fn service_enforces_the_transition_table() {
    let sources = [
        ApplicationStatus::Pending,
        ApplicationStatus::Accepted,
        ApplicationStatus::NeedsInfo,
    ];

    for from in sources {
        for to in ApplicationStatus::ALL {
            let (service, _store, _notifier) = service();
            let application = application_in(&service, from);

            let outcome = move_to(&service, &application, to);
            let stored = service.get_application(&application.id).expect("stored");
            if is_allowed(from, to) {
                assert!(
                    matches!(outcome, Ok(TransitionOutcome::Applied(_))),
                    "{from} -> {to} should apply, got {outcome:?}"
                );
                assert_eq!(stored.status, to);
            } else {
                assert!(
                    matches!(outcome, Err(PracticeError::InvalidTransition { .. })),
                    "{from} -> {to} should be refused, got {outcome:?}"
                );
                assert_eq!(stored.status, from);
            }
        }
    }
}

#[test]
fn rejected_applications_refuse_every_target() {
    let (service, _store, _notifier) = service();
    let application = application_in(&service, ApplicationStatus::Rejected);

    for to in ApplicationStatus::ALL {
        match move_to(&service, &application, to) {
            Err(PracticeError::InvalidTransition { from, .. }) => {
                assert_eq!(from, ApplicationStatus::Rejected)
            }
            other => panic!("rejected -> {to} should be refused, got {other:?}"),
        }
    }
}

#[test]
fn comments_are_cleared_when_leaving_a_commented_status() {
    let (service, _store, _notifier) = service();
    let application = application_in(&service, ApplicationStatus::NeedsInfo);
    assert!(application.coordinator_comments.is_some());

    let accepted = accept(&service, &application);
    assert_eq!(accepted.coordinator_comments, None);
}

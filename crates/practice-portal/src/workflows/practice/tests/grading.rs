use super::common::*;
use crate::workflows::practice::domain::{ApplicationId, DocumentId, DocumentStatus};
use crate::workflows::practice::grading::{
    compute_closure_average, compute_tracking_average, GradingError, TrackingAverage,
};

fn fixture_id() -> ApplicationId {
    ApplicationId("app-fixture".to_string())
}

#[test]
fn tracking_average_is_empty_without_approved_grades() {
    assert_eq!(compute_tracking_average(&[]), TrackingAverage::empty());

    let unapproved = vec![
        graded("d1", &fixture_id(), Some(6.0), 50.0, DocumentStatus::Pending),
        graded("d2", &fixture_id(), Some(5.0), 50.0, DocumentStatus::Rejected),
        graded("d3", &fixture_id(), None, 50.0, DocumentStatus::Approved),
    ];
    let summary = compute_tracking_average(&unapproved);
    assert_eq!(summary.average, None);
    assert_eq!(summary.total_weight, 0.0);
    assert!(!summary.is_complete);
}

#[test]
fn tracking_average_sums_weighted_contributions() {
    let documents = vec![approved("d1", 6.0, 40.0), approved("d2", 5.0, 60.0)];
    let summary = compute_tracking_average(&documents);
    assert_eq!(summary.average, Some(5.4));
    assert_eq!(summary.total_weight, 100.0);
    assert!(summary.is_complete);
}

#[test]
fn partial_weights_are_not_normalized() {
    let documents = vec![approved("d1", 6.0, 30.0), approved("d2", 4.0, 20.0)];
    let summary = compute_tracking_average(&documents);
    // 6.0 * 0.3 + 4.0 * 0.2, not divided by the 50% covered so far.
    assert_eq!(summary.average, Some(2.6));
    assert_eq!(summary.total_weight, 50.0);
    assert!(!summary.is_complete);
}

#[test]
fn unweighted_documents_fall_back_to_plain_mean() {
    let documents = vec![approved("d1", 6.0, 0.0), approved("d2", 4.0, 0.0)];
    let summary = compute_tracking_average(&documents);
    assert_eq!(summary.average, Some(5.0));
    assert_eq!(summary.total_weight, 0.0);
    assert!(summary.is_complete);
}

#[test]
fn tracking_average_rounds_to_two_decimals() {
    let documents = vec![
        approved("d1", 5.5, 33.33),
        approved("d2", 6.1, 33.33),
        approved("d3", 4.7, 33.34),
    ];
    let summary = compute_tracking_average(&documents);
    assert_eq!(summary.average, Some(5.43));
    assert!(summary.is_complete);
}

#[test]
fn tracking_ignores_unapproved_documents_in_the_mix() {
    let documents = vec![
        approved("d1", 6.0, 40.0),
        graded("d2", &fixture_id(), Some(1.0), 60.0, DocumentStatus::Rejected),
    ];
    let summary = compute_tracking_average(&documents);
    assert_eq!(summary.average, Some(2.4));
    assert_eq!(summary.total_weight, 40.0);
    assert!(!summary.is_complete);
}

#[test]
fn closure_average_is_unweighted_and_status_independent() {
    let documents = vec![
        graded("d1", &fixture_id(), Some(6.0), 90.0, DocumentStatus::Pending),
        graded("d2", &fixture_id(), Some(4.0), 10.0, DocumentStatus::Rejected),
        graded("d3", &fixture_id(), Some(5.5), 0.0, DocumentStatus::Approved),
    ];
    let closure = compute_closure_average(&documents).expect("closure average");
    assert_eq!(closure.average, 5.2);
    assert_eq!(closure.graded_documents, 3);
}

#[test]
fn closure_average_requires_every_grade() {
    let documents = vec![
        approved("d1", 6.0, 50.0),
        graded("d2", &fixture_id(), None, 50.0, DocumentStatus::Approved),
    ];
    assert_eq!(
        compute_closure_average(&documents),
        Err(GradingError::IncompleteGrading {
            missing: vec![DocumentId("d2".to_string())]
        })
    );
}

#[test]
fn closure_average_requires_documents() {
    assert_eq!(compute_closure_average(&[]), Err(GradingError::NoDocuments));
}

#[test]
fn formulas_answer_different_questions() {
    let documents = vec![approved("d1", 7.0, 80.0), approved("d2", 3.0, 20.0)];
    let tracking = compute_tracking_average(&documents);
    let closure = compute_closure_average(&documents).expect("closure");
    assert_eq!(tracking.average, Some(6.2));
    assert_eq!(closure.average, 5.0);
}

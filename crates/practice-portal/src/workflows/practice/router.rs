use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ApplicationId, ApplicationStatus, InternshipId, PracticeError, PracticeTarget, StudentId,
};
use super::notify::{NotificationService, StudentDirectory};
use super::repository::PracticeStore;
use super::service::{
    NewApplication, PracticeApplicationService, TrackingScope, TransitionOutcome,
    TransitionRequest,
};

type SharedService<S, N, D> = Arc<PracticeApplicationService<S, N, D>>;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateApplicationBody {
    pub(crate) student_id: String,
    pub(crate) application_type: String,
    pub(crate) target_id: String,
    #[serde(default)]
    pub(crate) metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionBody {
    pub(crate) status: ApplicationStatus,
    #[serde(default)]
    pub(crate) comments: Option<String>,
    pub(crate) actor_id: String,
    #[serde(default)]
    pub(crate) force: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CloseBody {
    #[serde(default)]
    pub(crate) min_average: Option<f64>,
}

/// Router builder exposing the practice lifecycle over HTTP.
pub fn practice_router<S, N, D>(service: SharedService<S, N, D>) -> Router
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/practice/applications",
            post(create_handler::<S, N, D>),
        )
        .route(
            "/api/v1/practice/applications/:application_id",
            get(application_handler::<S, N, D>),
        )
        .route(
            "/api/v1/practice/applications/:application_id/transition",
            post(transition_handler::<S, N, D>),
        )
        .route(
            "/api/v1/practice/applications/:application_id/close",
            post(close_handler::<S, N, D>),
        )
        .route(
            "/api/v1/practice/applications/:application_id/tracking",
            get(application_tracking_handler::<S, N, D>),
        )
        .route(
            "/api/v1/practice/students/:student_id/tracking",
            get(student_tracking_handler::<S, N, D>),
        )
        .route(
            "/api/v1/practice/internships/:internship_id/slots",
            get(slots_handler::<S, N, D>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    axum::Json(body): axum::Json<CreateApplicationBody>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    let target = match PracticeTarget::parse(&body.application_type, &body.target_id) {
        Ok(target) => target,
        Err(error) => return error_response(error),
    };

    let request = NewApplication {
        student_id: StudentId(body.student_id),
        target,
        metadata: body.metadata,
    };

    match service.create_application(request) {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn application_handler<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    match service.get_application(&ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transition_handler<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<TransitionBody>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    let request = TransitionRequest {
        application_id: ApplicationId(application_id),
        new_status: body.status,
        comments: body.comments,
        actor_id: body.actor_id,
        force: body.force,
    };

    match service.transition(request) {
        Ok(TransitionOutcome::Applied(application)) => {
            (StatusCode::OK, axum::Json(application)).into_response()
        }
        Ok(TransitionOutcome::Warning(warning)) => {
            let payload = json!({
                "warning": warning,
                "requires_confirmation": true,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn close_handler<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<CloseBody>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    match service.close_application(&ApplicationId(application_id), body.min_average) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn application_tracking_handler<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    let scope = TrackingScope::Application(ApplicationId(application_id));
    match service.tracking_average(scope) {
        Ok(average) => (StatusCode::OK, axum::Json(average)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn student_tracking_handler<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path(student_id): Path<String>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    let scope = TrackingScope::Student(StudentId(student_id));
    match service.tracking_average(scope) {
        Ok(average) => (StatusCode::OK, axum::Json(average)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn slots_handler<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path(internship_id): Path<String>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    match service.slot_availability(&InternshipId(internship_id)) {
        Ok(availability) => (StatusCode::OK, axum::Json(availability)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Map lifecycle failures onto status codes, keeping the counts a UI needs for an override.
pub fn error_response(error: PracticeError) -> Response {
    let (status, payload) = match &error {
        PracticeError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            json!({ "error": error.to_string() }),
        ),
        PracticeError::CapacityExhausted {
            internship_id,
            occupied,
            total,
        } => (
            StatusCode::CONFLICT,
            json!({
                "error": error.to_string(),
                "code": "CAPACITY_EXHAUSTED",
                "internship_id": internship_id,
                "occupied": occupied,
                "total": total,
            }),
        ),
        PracticeError::AlreadyClosed(_) => (
            StatusCode::CONFLICT,
            json!({ "error": error.to_string(), "code": "ALREADY_CLOSED" }),
        ),
        PracticeError::IncompleteGrading { missing } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": error.to_string(),
                "code": "INCOMPLETE_GRADING",
                "missing_documents": missing,
            }),
        ),
        PracticeError::NoDocuments => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": error.to_string(), "code": "NO_DOCUMENTS" }),
        ),
        PracticeError::InvalidTransition { from, .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": error.to_string(),
                "code": "INVALID_TRANSITION",
                "current_status": from,
            }),
        ),
        PracticeError::Validation(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": error.to_string(), "code": "VALIDATION_ERROR" }),
        ),
        PracticeError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    (status, axum::Json(payload)).into_response()
}

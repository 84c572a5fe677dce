use crate::infra::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use practice_portal::workflows::practice::{
    error_response, practice_router, ApplicationId, Document, DocumentId, DocumentKind,
    DocumentStatus, NewInternship, NotificationService, PracticeApplicationService, PracticeStore,
    StudentDirectory, StudentId,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

type SharedService<S, N, D> = Arc<PracticeApplicationService<S, N, D>>;

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterInternshipRequest {
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) company: String,
    pub(crate) total_slots: u32,
    pub(crate) application_deadline: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentRequest {
    pub(crate) kind: DocumentKind,
    #[serde(default)]
    pub(crate) status: Option<DocumentStatus>,
    #[serde(default)]
    pub(crate) grade: Option<f64>,
    #[serde(default)]
    pub(crate) weight: f64,
    pub(crate) uploaded_by: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WithdrawRequest {
    pub(crate) student_id: String,
}

/// Lifecycle routes plus the staff endpoints and operational probes the portal exposes.
pub(crate) fn with_practice_routes<S, N, D>(service: SharedService<S, N, D>) -> Router
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    let staff = Router::new()
        .route(
            "/api/v1/practice/internships",
            post(register_internship_endpoint::<S, N, D>),
        )
        .route(
            "/api/v1/practice/applications/:application_id/documents",
            get(documents_endpoint::<S, N, D>),
        )
        .route(
            "/api/v1/practice/applications/:application_id/documents/:document_id",
            put(upsert_document_endpoint::<S, N, D>),
        )
        .route(
            "/api/v1/practice/applications/:application_id/withdraw",
            post(withdraw_endpoint::<S, N, D>),
        )
        .with_state(service.clone());

    practice_router(service)
        .merge(staff)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn register_internship_endpoint<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Json(payload): Json<RegisterInternshipRequest>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    match service.register_internship(NewInternship {
        title: payload.title,
        company: payload.company,
        total_slots: payload.total_slots,
        application_deadline: payload.application_deadline,
    }) {
        Ok(internship) => (StatusCode::CREATED, Json(internship)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn documents_endpoint<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    match service.documents(&ApplicationId(application_id)) {
        Ok(documents) => Json(documents).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn upsert_document_endpoint<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path((application_id, document_id)): Path<(String, String)>,
    Json(payload): Json<DocumentRequest>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    let DocumentRequest {
        kind,
        status,
        grade,
        weight,
        uploaded_by,
    } = payload;

    let document = Document {
        id: DocumentId(document_id),
        practice_application_id: ApplicationId(application_id),
        kind,
        status: status.unwrap_or(DocumentStatus::Pending),
        grade,
        weight,
        uploaded_by,
    };
    match service.upsert_document(document) {
        Ok(document) => Json(document).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn withdraw_endpoint<S, N, D>(
    State(service): State<SharedService<S, N, D>>,
    Path(application_id): Path<String>,
    Json(payload): Json<WithdrawRequest>,
) -> Response
where
    S: PracticeStore + 'static,
    N: NotificationService + 'static,
    D: StudentDirectory + 'static,
{
    match service.withdraw_application(
        &ApplicationId(application_id),
        &StudentId(payload.student_id),
    ) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{EmailDomainDirectory, LoggingNotifier};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use practice_portal::workflows::practice::{InMemoryPracticeStore, PracticeConfig};
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    type TestService =
        PracticeApplicationService<InMemoryPracticeStore, LoggingNotifier, EmailDomainDirectory>;

    fn service() -> Arc<TestService> {
        Arc::new(PracticeApplicationService::new(
            Arc::new(InMemoryPracticeStore::new()),
            Arc::new(LoggingNotifier),
            Arc::new(EmailDomainDirectory::new(None)),
            PracticeConfig::default(),
        ))
    }

    fn app_state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        }
    }

    fn json_request(method: &str, uri: &str, payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let response = readiness_endpoint(Extension(app_state(false)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(app_state(true)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_route_is_served_alongside_practice_routes() {
        let app = with_practice_routes(service()).layer(Extension(app_state(true)));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn staff_can_register_internships_and_grade_documents() {
        let service = service();
        let app = with_practice_routes(service.clone()).layer(Extension(app_state(true)));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/practice/internships",
                json!({
                    "title": "QA automation intern",
                    "company": "Lumen Analytics",
                    "total_slots": 2,
                    "application_deadline": "2099-01-31",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let internship = body_json(response).await;
        let internship_id = internship["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/practice/applications",
                json!({
                    "student_id": "ana",
                    "application_type": "existing",
                    "target_id": internship_id,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let application_id = body_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/practice/applications/{application_id}/documents/plan-1"),
                json!({
                    "kind": "work_plan",
                    "status": "approved",
                    "grade": 6.3,
                    "weight": 100.0,
                    "uploaded_by": "ana",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get(format!(
                    "/api/v1/practice/applications/{application_id}/tracking"
                ))
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        let tracking = body_json(response).await;
        assert_eq!(tracking["average"], 6.3);
        assert_eq!(tracking["is_complete"], true);
    }

    #[tokio::test]
    async fn document_validation_errors_map_to_unprocessable() {
        let app = with_practice_routes(service()).layer(Extension(app_state(true)));

        let response = app
            .oneshot(json_request(
                "PUT",
                "/api/v1/practice/applications/app-missing/documents/d1",
                json!({ "kind": "attachment", "grade": 5.0, "uploaded_by": "ana" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = body_json(response).await;
        assert_eq!(payload["code"], "VALIDATION_ERROR");
        assert!(payload["error"]
            .as_str()
            .unwrap()
            .contains("attachment documents cannot be graded"));
    }

    #[tokio::test]
    async fn withdrawing_an_unknown_application_is_not_found() {
        let app = with_practice_routes(service()).layer(Extension(app_state(true)));

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/practice/applications/app-missing/withdraw",
                json!({ "student_id": "ana" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("app-missing"));
    }
}

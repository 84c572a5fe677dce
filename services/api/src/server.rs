use crate::cli::ServeArgs;
use crate::infra::{AppState, EmailDomainDirectory, LoggingNotifier};
use crate::routes::with_practice_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use practice_portal::config::AppConfig;
use practice_portal::error::AppError;
use practice_portal::telemetry;
use practice_portal::workflows::practice::{
    InMemoryPracticeStore, PracticeApplicationService, PracticeConfig, PracticeStore,
    QueuedNotifier, SqlitePracticeStore,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(path) = args.database.take() {
        config.storage.database_path = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (notifier, _delivery) = QueuedNotifier::spawn(Arc::new(LoggingNotifier));
    let notifier = Arc::new(notifier);
    let directory = Arc::new(EmailDomainDirectory::new(args.email_domain.take()));

    let practice_routes = match &config.storage.database_path {
        Some(path) => {
            let store = SqlitePracticeStore::open(path)?;
            info!(path = %path.display(), "practice records stored in sqlite");
            practice_app(store, notifier, directory, config.practice.clone())
        }
        None => {
            info!("practice records kept in process memory");
            practice_app(
                InMemoryPracticeStore::new(),
                notifier,
                directory,
                config.practice.clone(),
            )
        }
    };

    let app = practice_routes
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        default_min_average = config.practice.default_min_average,
        "practice portal ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn practice_app<S>(
    store: S,
    notifier: Arc<QueuedNotifier>,
    directory: Arc<EmailDomainDirectory>,
    practice: PracticeConfig,
) -> Router
where
    S: PracticeStore + 'static,
{
    let service = Arc::new(PracticeApplicationService::new(
        Arc::new(store),
        notifier,
        directory,
        practice,
    ));
    with_practice_routes(service)
}

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use loan_portal::config::AppConfig;
use loan_portal::error::AppError;
use loan_portal::telemetry;
use loan_portal::workflows::enrollment::EnrollmentService;

use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryApplicationStore, LoggingOtpIssuer, SimulatedCertificateAuthority,
    StubCertificateDirectory, StubKycEvidence,
};
use crate::routes::with_enrollment_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryApplicationStore::default());
    let service = Arc::new(EnrollmentService::new(
        store.clone(),
        Arc::new(StubCertificateDirectory::default()),
        Arc::new(LoggingOtpIssuer),
        Arc::new(SimulatedCertificateAuthority::default()),
        Arc::new(StubKycEvidence),
        config.enrollment.clone(),
    ));

    let app = with_enrollment_routes(service)
        .layer(Extension(app_state))
        .layer(Extension(store))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan origination portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}

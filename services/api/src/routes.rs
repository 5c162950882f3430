use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use loan_portal::workflows::enrollment::{
    enrollment_router, ApplicationStore, ApplicationView, BorrowerProfile, CertificateAuthority,
    CertificateDirectory, EnrollmentService, IdDocumentType, KycEvidenceProvider, OtpIssuer,
};

use crate::infra::{AppState, InMemoryApplicationStore};

#[derive(Debug, Deserialize)]
pub(crate) struct ApplicationIntake {
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) mobile_no: String,
    pub(crate) id_number: String,
    pub(crate) id_type: IdDocumentType,
}

pub(crate) fn with_enrollment_routes<S, D, O, C, K>(
    service: Arc<EnrollmentService<S, D, O, C, K>>,
) -> axum::Router
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    enrollment_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/applications", axum::routing::post(intake_endpoint))
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

pub(crate) async fn intake_endpoint(
    Extension(store): Extension<Arc<InMemoryApplicationStore>>,
    Json(intake): Json<ApplicationIntake>,
) -> impl IntoResponse {
    let ApplicationIntake {
        full_name,
        email,
        mobile_no,
        id_number,
        id_type,
    } = intake;

    let record = store.create(BorrowerProfile {
        full_name,
        email,
        mobile_no,
        id_number,
        id_type,
    });

    (StatusCode::CREATED, Json(ApplicationView::from(&record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loan_portal::workflows::enrollment::ApplicationId;

    fn sample_intake() -> ApplicationIntake {
        ApplicationIntake {
            full_name: "AHMAD BIN ALI".to_string(),
            email: "ahmad@example.com".to_string(),
            mobile_no: "+60123456789".to_string(),
            id_number: "900101-14-1234".to_string(),
            id_type: IdDocumentType::Nric,
        }
    }

    #[tokio::test]
    async fn intake_opens_an_application_at_profile_confirmation() {
        let store = Arc::new(InMemoryApplicationStore::default());

        let response = intake_endpoint(Extension(store.clone()), Json(sample_intake()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let record = store
            .fetch(&ApplicationId("loan-00001".to_string()))
            .expect("store reachable")
            .expect("record created");
        assert_eq!(record.status.label(), "PENDING_PROFILE_CONFIRMATION");
        assert_eq!(record.app_step, 1);
    }

    #[tokio::test]
    async fn intake_assigns_sequential_identifiers() {
        let store = Arc::new(InMemoryApplicationStore::default());

        intake_endpoint(Extension(store.clone()), Json(sample_intake())).await;
        intake_endpoint(Extension(store.clone()), Json(sample_intake())).await;

        assert!(store
            .fetch(&ApplicationId("loan-00002".to_string()))
            .expect("store reachable")
            .is_some());
    }
}

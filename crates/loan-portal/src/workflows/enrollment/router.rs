use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ApplicationId, ApplicationRecord};
use super::progression::{ApplicationStore, ProgressionError, StoreError};
use super::providers::{
    CertificateAuthority, CertificateDirectory, KycEvidenceProvider, OtpIssuer,
};
use super::service::{EnrollmentError, EnrollmentService};

/// Sanitized application view echoed by the write endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: String,
    pub status: &'static str,
    pub app_step: u16,
}

impl From<&ApplicationRecord> for ApplicationView {
    fn from(record: &ApplicationRecord) -> Self {
        Self {
            application_id: record.id.0.clone(),
            status: record.status.label(),
            app_step: record.app_step,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CertificateSubmission {
    pub otp_code: String,
}

#[derive(Debug, Deserialize)]
pub struct StepUpdate {
    pub app_step: u16,
}

/// Router builder exposing the enrollment workflow endpoints.
pub fn enrollment_router<S, D, O, C, K>(
    service: Arc<EnrollmentService<S, D, O, C, K>>,
) -> Router
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications/:application_id",
            get(snapshot_handler::<S, D, O, C, K>),
        )
        .route(
            "/api/v1/applications/:application_id/profile/confirm",
            post(confirm_profile_handler::<S, D, O, C, K>),
        )
        .route(
            "/api/v1/applications/:application_id/kyc/complete",
            post(complete_kyc_handler::<S, D, O, C, K>),
        )
        .route(
            "/api/v1/applications/:application_id/kyc/backtrack",
            post(backtrack_handler::<S, D, O, C, K>),
        )
        .route(
            "/api/v1/applications/:application_id/otp",
            post(send_otp_handler::<S, D, O, C, K>),
        )
        .route(
            "/api/v1/applications/:application_id/certificate",
            post(request_certificate_handler::<S, D, O, C, K>),
        )
        .route(
            "/api/v1/applications/:application_id/step",
            put(save_step_handler::<S, D, O, C, K>),
        )
        .with_state(service)
}

/// Map a workflow error onto the HTTP surface. `InvalidState` is a routing
/// problem for the caller, so the payload carries both statuses and the
/// client is expected to redirect rather than display the error.
pub fn error_response(error: &EnrollmentError) -> Response {
    match error {
        EnrollmentError::Progression(ProgressionError::InvalidState { found, expected }) => {
            let payload = json!({
                "error": error.to_string(),
                "found": found.label(),
                "expected": expected,
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        EnrollmentError::Progression(ProgressionError::Store(StoreError::NotFound)) => {
            let payload = json!({ "error": "application not found" });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        EnrollmentError::Progression(ProgressionError::Store(StoreError::Unavailable(_))) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
        EnrollmentError::IncompleteKyc { missing } => {
            let payload = json!({
                "error": error.to_string(),
                "missing": missing,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        EnrollmentError::MissingIdentifier
        | EnrollmentError::MissingEmail
        | EnrollmentError::InvalidStep
        | EnrollmentError::SessionClosed => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        EnrollmentError::OtpThrottled { remaining_secs } => {
            let payload = json!({
                "error": error.to_string(),
                "retry_after_secs": remaining_secs,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(payload)).into_response()
        }
        EnrollmentError::Provider {
            code,
            message,
            otp_retryable,
        } => {
            let payload = json!({
                "error": message,
                "code": code,
                "otp_retryable": otp_retryable,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        EnrollmentError::OtpSendRejected(_) | EnrollmentError::Transport(_) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn snapshot_handler<S, D, O, C, K>(
    State(service): State<Arc<EnrollmentService<S, D, O, C, K>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    let id = ApplicationId(application_id);
    match service.snapshot(&id) {
        Ok(snapshot) => {
            let payload = json!({
                "application": ApplicationView::from(&snapshot.application),
                "phase": snapshot.phase.label(),
                "otp_countdown_secs": snapshot.otp_countdown_secs,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn confirm_profile_handler<S, D, O, C, K>(
    State(service): State<Arc<EnrollmentService<S, D, O, C, K>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    let id = ApplicationId(application_id);
    match service.confirm_profile(&id) {
        Ok(outcome) => {
            let payload = json!({
                "application": ApplicationView::from(&outcome.application),
                "existing_certificate": outcome.existing_certificate,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn complete_kyc_handler<S, D, O, C, K>(
    State(service): State<Arc<EnrollmentService<S, D, O, C, K>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    let id = ApplicationId(application_id);
    match service.complete_kyc(&id) {
        Ok(record) => {
            (StatusCode::OK, Json(ApplicationView::from(&record))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn backtrack_handler<S, D, O, C, K>(
    State(service): State<Arc<EnrollmentService<S, D, O, C, K>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    let id = ApplicationId(application_id);
    match service.backtrack(&id) {
        Ok(record) => {
            (StatusCode::OK, Json(ApplicationView::from(&record))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn send_otp_handler<S, D, O, C, K>(
    State(service): State<Arc<EnrollmentService<S, D, O, C, K>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    let id = ApplicationId(application_id);
    match service.send_otp(&id) {
        Ok(delivery) => {
            let payload = json!({
                "usage": delivery.usage.code(),
                "countdown_secs": delivery.countdown_secs,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn request_certificate_handler<S, D, O, C, K>(
    State(service): State<Arc<EnrollmentService<S, D, O, C, K>>>,
    Path(application_id): Path<String>,
    Json(submission): Json<CertificateSubmission>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    let id = ApplicationId(application_id);
    match service.request_certificate(&id, &submission.otp_code) {
        Ok(outcome) => {
            let payload = json!({
                "application": ApplicationView::from(&outcome.application),
                "certificate": outcome.certificate,
                "message": outcome.message,
                "reused_existing": outcome.reused_existing,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn save_step_handler<S, D, O, C, K>(
    State(service): State<Arc<EnrollmentService<S, D, O, C, K>>>,
    Path(application_id): Path<String>,
    Json(update): Json<StepUpdate>,
) -> Response
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    let id = ApplicationId(application_id);
    match service.save_step(&id, update.app_step) {
        Ok(record) => {
            (StatusCode::OK, Json(ApplicationView::from(&record))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Local, Utc};
use serde::Serialize;

use crate::config::EnrollmentConfig;

use super::codes::{self, Disposition};
use super::domain::{
    ApplicationId, ApplicationRecord, CertificateRequest, CertificateSummary, OtpChallenge,
    OtpRequest, OtpUsage, VerificationData,
};
use super::progression::{
    ApplicationStore, ProgressionController, ProgressionError, StatusGate, StoreError,
};
use super::providers::{
    CertificateAuthority, CertificateDirectory, KycEvidenceProvider, OtpIssuer, ProviderError,
};
use super::session::{EnrollmentPhase, EnrollmentSession};

/// Outcome of the profile-confirmation gate.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileOutcome {
    pub application: ApplicationRecord,
    /// Present when the directory reported an active certificate and the
    /// application jumped straight to signing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_certificate: Option<CertificateSummary>,
}

/// Acknowledgement for a delivered OTP challenge.
#[derive(Debug, Clone, Serialize)]
pub struct OtpDelivery {
    pub usage: OtpUsage,
    /// Seconds on the client display countdown before a resend is allowed.
    pub countdown_secs: i64,
}

/// Result of a successful certificate enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOutcome {
    pub application: ApplicationRecord,
    pub certificate: CertificateSummary,
    pub message: String,
    /// True when the provider answered AP111: an existing certificate was
    /// found and reused rather than newly enrolled.
    pub reused_existing: bool,
}

/// Point-in-time view of an application plus its enrollment session.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSnapshot {
    pub application: ApplicationRecord,
    pub phase: EnrollmentPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_countdown_secs: Option<i64>,
}

/// Structured failure surface for the whole orchestration: every error here
/// carries a stable cause and a human-readable message; nothing opaque
/// escapes to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("no national identity number is on file; complete the profile first")]
    MissingIdentifier,
    #[error("an email address is required before a new-enrollment OTP can be sent")]
    MissingEmail,
    #[error("identity verification is incomplete; finish KYC capture first")]
    IncompleteKyc { missing: Vec<&'static str> },
    #[error("wizard steps are 1-based; step 0 is not a valid resume point")]
    InvalidStep,
    #[error("an OTP was already sent; wait {remaining_secs}s before requesting another")]
    OtpThrottled { remaining_secs: i64 },
    #[error("the previous enrollment attempt failed; request a new OTP before trying again")]
    SessionClosed,
    #[error("the OTP service declined the request: {0}")]
    OtpSendRejected(String),
    /// Any non-success, non-AP111 provider verdict. The raw code is kept
    /// for diagnostics; `message` is the borrower-facing sentence.
    #[error("{message}")]
    Provider {
        code: String,
        message: String,
        otp_retryable: bool,
    },
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error(transparent)]
    Transport(#[from] ProviderError),
}

/// Orchestrates OTP issuance and certificate enrollment across the external
/// collaborators, advancing the application status through the progression
/// controller on success.
///
/// Certificate status is read from the directory at two separate points
/// (profile confirmation and OTP send). The reads are independent calls
/// with no shared transaction: a certificate that becomes active between
/// them is not retroactively detected, and the flow continues on the path
/// it already committed to.
pub struct EnrollmentService<S, D, O, C, K> {
    store: Arc<S>,
    directory: Arc<D>,
    otp: Arc<O>,
    authority: Arc<C>,
    kyc: Arc<K>,
    config: EnrollmentConfig,
    controller: ProgressionController<S>,
    sessions: Mutex<HashMap<ApplicationId, EnrollmentSession>>,
}

impl<S, D, O, C, K> EnrollmentService<S, D, O, C, K>
where
    S: ApplicationStore + 'static,
    D: CertificateDirectory + 'static,
    O: OtpIssuer + 'static,
    C: CertificateAuthority + 'static,
    K: KycEvidenceProvider + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        otp: Arc<O>,
        authority: Arc<C>,
        kyc: Arc<K>,
        config: EnrollmentConfig,
    ) -> Self {
        Self {
            store: store.clone(),
            directory,
            otp,
            authority,
            kyc,
            config,
            controller: ProgressionController::new(store),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EnrollmentConfig {
        &self.config
    }

    /// Profile-confirmation gate. Looks the borrower up in the certificate
    /// directory: an active certificate jumps the application straight to
    /// `PENDING_SIGNATURE`, skipping KYC and OTP; otherwise KYC is next.
    pub fn confirm_profile(
        &self,
        id: &ApplicationId,
    ) -> Result<ProfileOutcome, EnrollmentError> {
        let record = self
            .controller
            .require(id, StatusGate::ProfileConfirmation)?;

        let entry = self
            .directory
            .certificate_status(&record.borrower.id_number)?;
        let certificate_on_file = self.config.is_active(entry.cert_status.as_deref());

        let application = self.controller.confirm_profile(id, certificate_on_file)?;
        let existing_certificate =
            certificate_on_file.then(|| CertificateSummary::from_directory(&entry));

        Ok(ProfileOutcome {
            application,
            existing_certificate,
        })
    }

    /// KYC capture finished externally; open the OTP gate.
    pub fn complete_kyc(&self, id: &ApplicationId) -> Result<ApplicationRecord, EnrollmentError> {
        Ok(self.controller.complete_kyc(id)?)
    }

    /// Decide which challenge flow the OTP provider should run. This is a
    /// fresh directory read every time it is called.
    pub fn determine_otp_usage(&self, borrower_id: &str) -> Result<OtpUsage, EnrollmentError> {
        let entry = self.directory.certificate_status(borrower_id)?;
        if self.config.is_active(entry.cert_status.as_deref()) {
            Ok(OtpUsage::DigitalSigning)
        } else {
            Ok(OtpUsage::NewEnrollment)
        }
    }

    /// Send (or resend, once the countdown has elapsed) the OTP challenge.
    pub fn send_otp(&self, id: &ApplicationId) -> Result<OtpDelivery, EnrollmentError> {
        let record = self.controller.require(id, StatusGate::Otp)?;

        if record.borrower.id_number.trim().is_empty() {
            return Err(EnrollmentError::MissingIdentifier);
        }

        let now = Utc::now();
        {
            let sessions = self.sessions.lock().expect("session mutex poisoned");
            if let Some(session) = sessions.get(id) {
                if !session.can_resend(now) {
                    let remaining_secs = session.countdown_secs(now).unwrap_or(0);
                    return Err(EnrollmentError::OtpThrottled { remaining_secs });
                }
            }
        }

        let usage = self.determine_otp_usage(&record.borrower.id_number)?;
        let email = record.borrower.email.trim();
        if usage == OtpUsage::NewEnrollment && email.is_empty() {
            return Err(EnrollmentError::MissingEmail);
        }

        let request = OtpRequest {
            borrower_id: record.borrower.id_number.clone(),
            usage,
            email_address: (!email.is_empty()).then(|| email.to_string()),
        };
        let receipt = self.otp.send(&request)?;
        if !receipt.success {
            return Err(EnrollmentError::OtpSendRejected(
                receipt
                    .message
                    .unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        let challenge = OtpChallenge::issued(usage, now, self.config.otp_ttl_secs);
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let session = sessions.entry(id.clone()).or_default();
        session.otp_sent(challenge);

        Ok(OtpDelivery {
            usage,
            countdown_secs: challenge.remaining_secs(now),
        })
    }

    /// Submit the borrower-entered OTP code with the assembled certificate
    /// request, classify the provider verdict, and on success advance the
    /// application to `PENDING_SIGNATURE`.
    ///
    /// KYC evidence is re-fetched on every call, including after a
    /// regression to `PENDING_KYC`; nothing is cached between attempts.
    pub fn request_certificate(
        &self,
        id: &ApplicationId,
        otp_code: &str,
    ) -> Result<EnrollmentOutcome, EnrollmentError> {
        let record = self.controller.require(id, StatusGate::Otp)?;

        // A terminally failed session stays closed until a fresh OTP send.
        {
            let sessions = self.sessions.lock().expect("session mutex poisoned");
            if let Some(session) = sessions.get(id) {
                if session.phase() == EnrollmentPhase::Failed {
                    return Err(EnrollmentError::SessionClosed);
                }
            }
        }

        let images = self.kyc.images(&record.borrower.id_number)?;
        let missing = images.missing();
        if !missing.is_empty() {
            return Err(EnrollmentError::IncompleteKyc { missing });
        }

        let request = CertificateRequest::assemble(
            &record.borrower,
            otp_code,
            &images,
            VerificationData::stamped(Local::now()),
        );

        {
            let mut sessions = self.sessions.lock().expect("session mutex poisoned");
            sessions.entry(id.clone()).or_default().begin_verification();
        }

        let reply = match self.authority.request_certificate(&request) {
            Ok(reply) => reply,
            Err(err) => {
                let mut sessions = self.sessions.lock().expect("session mutex poisoned");
                if let Some(session) = sessions.get_mut(id) {
                    session.verification_interrupted();
                }
                return Err(err.into());
            }
        };

        let verdict = codes::classify(&reply.status_code, reply.status_msg.as_deref());
        let now = Utc::now();

        if verdict.is_success() {
            let application = self.controller.complete_enrollment(id)?;
            let mut sessions = self.sessions.lock().expect("session mutex poisoned");
            sessions.entry(id.clone()).or_default().complete();

            return Ok(EnrollmentOutcome {
                application,
                certificate: CertificateSummary::from_reply(&reply),
                message: verdict.message,
                reused_existing: verdict.disposition == Disposition::RecoverableSuccess,
            });
        }

        // Failure: status stays untouched; only the session moves.
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        sessions
            .entry(id.clone())
            .or_default()
            .fail(&verdict.code, now);

        Err(EnrollmentError::Provider {
            code: verdict.code,
            message: verdict.message,
            otp_retryable: verdict.otp_retryable,
        })
    }

    /// The borrower abandons OTP verification and returns to KYC. The only
    /// defined cancellation path, and always safe: the provider call is
    /// synchronous, so nothing is left pending server-side.
    pub fn backtrack(&self, id: &ApplicationId) -> Result<ApplicationRecord, EnrollmentError> {
        let application = self.controller.backtrack_to_kyc(id)?;
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .remove(id);
        Ok(application)
    }

    /// Persist the wizard resume cursor. Unrelated to the certificate flow.
    pub fn save_step(
        &self,
        id: &ApplicationId,
        app_step: u16,
    ) -> Result<ApplicationRecord, EnrollmentError> {
        if app_step == 0 {
            return Err(EnrollmentError::InvalidStep);
        }
        Ok(self
            .store
            .patch_step(id, app_step)
            .map_err(ProgressionError::from)?)
    }

    /// Current record plus session phase for status displays.
    pub fn snapshot(&self, id: &ApplicationId) -> Result<ApplicationSnapshot, EnrollmentError> {
        let application = self
            .store
            .fetch(id)
            .map_err(ProgressionError::from)?
            .ok_or(ProgressionError::Store(StoreError::NotFound))?;
        let now = Utc::now();
        let sessions = self.sessions.lock().expect("session mutex poisoned");
        let (phase, otp_countdown_secs) = sessions
            .get(id)
            .map(|session| (session.phase(), session.countdown_secs(now)))
            .unwrap_or((EnrollmentPhase::NotStarted, None));

        Ok(ApplicationSnapshot {
            application,
            phase,
            otp_countdown_secs,
        })
    }

    /// Session phase only; `NotStarted` when no session exists yet.
    pub fn session_phase(&self, id: &ApplicationId) -> EnrollmentPhase {
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .get(id)
            .map(EnrollmentSession::phase)
            .unwrap_or(EnrollmentPhase::NotStarted)
    }
}

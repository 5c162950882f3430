use std::sync::Arc;

use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus};

/// PATCH-style access to the external application record store. The
/// controller only ever touches the `status` field; the wizard cursor has
/// its own partial update.
pub trait ApplicationStore: Send + Sync {
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError>;
    fn patch_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError>;
    fn patch_step(&self, id: &ApplicationId, app_step: u16)
        -> Result<ApplicationRecord, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("application not found")]
    NotFound,
    #[error("application store unavailable: {0}")]
    Unavailable(String),
}

/// Which status a step expects on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGate {
    ProfileConfirmation,
    Kyc,
    Otp,
}

impl StatusGate {
    pub fn admits(self, status: ApplicationStatus) -> bool {
        match self {
            StatusGate::ProfileConfirmation => {
                status == ApplicationStatus::PendingProfileConfirmation
            }
            StatusGate::Kyc => status == ApplicationStatus::PendingKyc,
            StatusGate::Otp => status.is_otp_gate(),
        }
    }

    pub const fn expected_label(self) -> &'static str {
        match self {
            StatusGate::ProfileConfirmation => "PENDING_PROFILE_CONFIRMATION",
            StatusGate::Kyc => "PENDING_KYC",
            StatusGate::Otp => "PENDING_CERTIFICATE_OTP or PENDING_SIGNING_OTP",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    /// The step was invoked from the wrong stored status. Callers should
    /// re-route the borrower to the step matching `found`, not retry.
    #[error("application is {found} but this step expects {expected}")]
    InvalidState {
        found: ApplicationStatus,
        expected: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Enforces which status each orchestration step may run from and issues
/// the status transition that step licenses. Every transition is exactly
/// one status-only partial update; repeating a transition verbatim is safe
/// because the write is an idempotent set, not an increment.
pub struct ProgressionController<S> {
    store: Arc<S>,
}

impl<S: ApplicationStore> ProgressionController<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetch the record and check it is inside the expected gate.
    pub fn require(
        &self,
        id: &ApplicationId,
        gate: StatusGate,
    ) -> Result<ApplicationRecord, ProgressionError> {
        let record = self.store.fetch(id)?.ok_or(StoreError::NotFound)?;
        if gate.admits(record.status) {
            Ok(record)
        } else {
            Err(ProgressionError::InvalidState {
                found: record.status,
                expected: gate.expected_label(),
            })
        }
    }

    /// Leave profile confirmation. A directory hit bypasses KYC and OTP
    /// entirely and jumps straight to signing.
    pub fn confirm_profile(
        &self,
        id: &ApplicationId,
        certificate_on_file: bool,
    ) -> Result<ApplicationRecord, ProgressionError> {
        self.require(id, StatusGate::ProfileConfirmation)?;
        let next = if certificate_on_file {
            ApplicationStatus::PendingSignature
        } else {
            ApplicationStatus::PendingKyc
        };
        Ok(self.store.patch_status(id, next)?)
    }

    /// KYC capture finished; open the OTP gate.
    pub fn complete_kyc(&self, id: &ApplicationId) -> Result<ApplicationRecord, ProgressionError> {
        self.require(id, StatusGate::Kyc)?;
        Ok(self
            .store
            .patch_status(id, ApplicationStatus::PendingCertificateOtp)?)
    }

    /// Documented regression: the borrower backs out of OTP verification.
    pub fn backtrack_to_kyc(
        &self,
        id: &ApplicationId,
    ) -> Result<ApplicationRecord, ProgressionError> {
        self.require(id, StatusGate::Otp)?;
        Ok(self.store.patch_status(id, ApplicationStatus::PendingKyc)?)
    }

    /// Certificate enrollment succeeded; the application is ready to sign.
    pub fn complete_enrollment(
        &self,
        id: &ApplicationId,
    ) -> Result<ApplicationRecord, ProgressionError> {
        self.require(id, StatusGate::Otp)?;
        Ok(self
            .store
            .patch_status(id, ApplicationStatus::PendingSignature)?)
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use loan_portal::workflows::enrollment::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationStore, BorrowerProfile,
    CertificateAuthority, CertificateDirectory, CertificateRequest, DirectoryEntry,
    KycEvidenceProvider, KycImageSet, OtpIssuer, OtpReceipt, OtpRequest, ProviderError,
    ProviderReply, StoreError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Record store backed by a process-local map. Stands in for the loan
/// management system until the real integration is wired up.
#[derive(Default)]
pub(crate) struct InMemoryApplicationStore {
    records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    next_id: AtomicU64,
}

impl InMemoryApplicationStore {
    /// Open a new application at the start of the progression.
    pub(crate) fn create(&self, borrower: BorrowerProfile) -> ApplicationRecord {
        let sequence = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = ApplicationRecord {
            id: ApplicationId(format!("loan-{sequence:05}")),
            status: ApplicationStatus::PendingProfileConfirmation,
            app_step: 1,
            borrower,
        };
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(record.id.clone(), record.clone());
        record
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned())
    }

    fn patch_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let record = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        record.status = status;
        Ok(record.clone())
    }

    fn patch_step(
        &self,
        id: &ApplicationId,
        app_step: u16,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let record = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        record.app_step = app_step;
        Ok(record.clone())
    }
}

/// Certificate directory stand-in: borrowers marked active get a synthetic
/// directory entry, everyone else has no certificate on file.
#[derive(Default)]
pub(crate) struct StubCertificateDirectory {
    active: Mutex<HashSet<String>>,
}

impl StubCertificateDirectory {
    pub(crate) fn mark_active(&self, borrower_id: &str) {
        self.active
            .lock()
            .expect("directory mutex poisoned")
            .insert(borrower_id.to_string());
    }
}

impl CertificateDirectory for StubCertificateDirectory {
    fn certificate_status(&self, borrower_id: &str) -> Result<DirectoryEntry, ProviderError> {
        let active = self
            .active
            .lock()
            .expect("directory mutex poisoned")
            .contains(borrower_id);
        if !active {
            return Ok(DirectoryEntry::default());
        }

        Ok(DirectoryEntry {
            cert_status: Some("ACTIVE".to_string()),
            cert_subject_dn: Some(format!("CN={borrower_id}, O=National CA, C=MY")),
            cert_serial_no: Some(format!("SIM-{borrower_id}")),
            cert_valid_from: Some("2025-01-01".to_string()),
            cert_valid_to: Some("2027-01-01".to_string()),
        })
    }
}

/// OTP issuer that only logs the challenge. The simulated authority accepts
/// any six-digit code, so there is no code to deliver.
#[derive(Default)]
pub(crate) struct LoggingOtpIssuer;

impl OtpIssuer for LoggingOtpIssuer {
    fn send(&self, request: &OtpRequest) -> Result<OtpReceipt, ProviderError> {
        info!(
            borrower_id = %request.borrower_id,
            usage = request.usage.code(),
            "simulated OTP challenge issued"
        );
        Ok(OtpReceipt {
            success: true,
            message: None,
        })
    }
}

/// Certificate authority stand-in. Any six-digit submission enrolls; anything
/// else answers with the provider's invalid-OTP code so clients can exercise
/// the retry path.
#[derive(Default)]
pub(crate) struct SimulatedCertificateAuthority {
    issued: AtomicU64,
}

impl CertificateAuthority for SimulatedCertificateAuthority {
    fn request_certificate(
        &self,
        request: &CertificateRequest,
    ) -> Result<ProviderReply, ProviderError> {
        let code_ok = request.auth_factor.len() == 6
            && request.auth_factor.chars().all(|c| c.is_ascii_digit());
        if !code_ok {
            return Ok(ProviderReply {
                status_code: "AP112".to_string(),
                status_msg: Some("OTP mismatch".to_string()),
                ..ProviderReply::default()
            });
        }

        let sequence = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(ProviderReply {
            status_code: "000".to_string(),
            status_msg: None,
            cert_serial_no: Some(format!("SIM-SN-{sequence:06}")),
            cert_request_id: Some(format!("SIM-REQ-{sequence:06}")),
            cert_valid_from: Some("2026-01-01".to_string()),
            cert_valid_to: Some("2028-01-01".to_string()),
            cert_request_status: None,
        })
    }
}

/// KYC evidence stand-in pointing at the portal's capture bucket layout.
#[derive(Default)]
pub(crate) struct StubKycEvidence;

impl KycEvidenceProvider for StubKycEvidence {
    fn images(&self, borrower_id: &str) -> Result<KycImageSet, ProviderError> {
        Ok(KycImageSet {
            front: Some(format!("https://kyc.portal.example/{borrower_id}/front.jpg")),
            back: Some(format!("https://kyc.portal.example/{borrower_id}/back.jpg")),
            selfie: Some(format!("https://kyc.portal.example/{borrower_id}/selfie.jpg")),
        })
    }
}

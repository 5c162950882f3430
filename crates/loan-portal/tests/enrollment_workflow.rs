//! End-to-end walks of the enrollment workflow through the public facade,
//! with every external collaborator replaced by an in-memory double.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use loan_portal::config::EnrollmentConfig;
use loan_portal::workflows::enrollment::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationStore, BorrowerProfile,
    CertificateAuthority, CertificateDirectory, CertificateRequest, DirectoryEntry,
    EnrollmentError, EnrollmentPhase, EnrollmentService, IdDocumentType, KycEvidenceProvider,
    KycImageSet, OtpIssuer, OtpReceipt, OtpRequest, ProviderError, ProviderReply, StoreError,
};

mod common {
    use super::*;

    pub struct RecordStore {
        records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    }

    impl RecordStore {
        pub fn seeded(record: ApplicationRecord) -> Arc<Self> {
            let store = Self {
                records: Mutex::new(HashMap::new()),
            };
            store
                .records
                .lock()
                .expect("store mutex poisoned")
                .insert(record.id.clone(), record);
            Arc::new(store)
        }
    }

    impl ApplicationStore for RecordStore {
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
            let mut records = self.records.lock().expect("store mutex poisoned");
            let record = records.get_mut(id).ok_or(StoreError::NotFound)?;
            record.status = status;
            Ok(record.clone())
        }

        fn patch_step(
            &self,
            id: &ApplicationId,
            app_step: u16,
        ) -> Result<ApplicationRecord, StoreError> {
            let mut records = self.records.lock().expect("store mutex poisoned");
            let record = records.get_mut(id).ok_or(StoreError::NotFound)?;
            record.app_step = app_step;
            Ok(record.clone())
        }
    }

    #[derive(Default)]
    pub struct Directory {
        entry: Mutex<DirectoryEntry>,
    }

    impl Directory {
        pub fn with_active_certificate() -> Arc<Self> {
            let directory = Self::default();
            *directory.entry.lock().expect("directory mutex poisoned") = DirectoryEntry {
                cert_status: Some("ACTIVE".to_string()),
                cert_subject_dn: Some("CN=SITI BINTI HASSAN, O=National CA, C=MY".to_string()),
                cert_serial_no: Some("SN-2208".to_string()),
                cert_valid_from: Some("2024-06-01".to_string()),
                cert_valid_to: Some("2026-06-01".to_string()),
            };
            Arc::new(directory)
        }
    }

    impl CertificateDirectory for Directory {
        fn certificate_status(&self, _borrower_id: &str) -> Result<DirectoryEntry, ProviderError> {
            Ok(self.entry.lock().expect("directory mutex poisoned").clone())
        }
    }

    #[derive(Default)]
    pub struct Issuer {
        pub sent: Mutex<Vec<OtpRequest>>,
    }

    impl OtpIssuer for Issuer {
        fn send(&self, request: &OtpRequest) -> Result<OtpReceipt, ProviderError> {
            self.sent
                .lock()
                .expect("issuer mutex poisoned")
                .push(request.clone());
            Ok(OtpReceipt {
                success: true,
                message: None,
            })
        }
    }

    /// Authority that pops one scripted reply per request, in order.
    pub struct Authority {
        replies: Mutex<Vec<ProviderReply>>,
        pub calls: AtomicUsize,
    }

    impl Authority {
        pub fn scripted(replies: Vec<ProviderReply>) -> Arc<Self> {
            let mut replies = replies;
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl CertificateAuthority for Authority {
        fn request_certificate(
            &self,
            _request: &CertificateRequest,
        ) -> Result<ProviderReply, ProviderError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self
                .replies
                .lock()
                .expect("authority mutex poisoned")
                .pop()
                .expect("a scripted reply remains"))
        }
    }

    #[derive(Default)]
    pub struct Evidence {
        pub fetches: AtomicUsize,
    }

    impl KycEvidenceProvider for Evidence {
        fn images(&self, borrower_id: &str) -> Result<KycImageSet, ProviderError> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            Ok(KycImageSet {
                front: Some(format!("https://cdn.portal.example/{borrower_id}/front.jpg")),
                back: Some(format!("https://cdn.portal.example/{borrower_id}/back.jpg")),
                selfie: Some(format!("https://cdn.portal.example/{borrower_id}/selfie.jpg")),
            })
        }
    }

    pub fn application(id: &str, status: ApplicationStatus) -> ApplicationRecord {
        ApplicationRecord {
            id: ApplicationId(id.to_string()),
            status,
            app_step: 1,
            borrower: BorrowerProfile {
                full_name: "SITI BINTI HASSAN".to_string(),
                email: "siti@example.com".to_string(),
                mobile_no: "+60198765432".to_string(),
                id_number: "880505-10-5678".to_string(),
                id_type: IdDocumentType::Nric,
            },
        }
    }

    pub fn reply(code: &str) -> ProviderReply {
        ProviderReply {
            status_code: code.to_string(),
            status_msg: None,
            cert_serial_no: Some("SN-3310".to_string()),
            cert_request_id: Some("REQ-12".to_string()),
            cert_valid_from: Some("2026-02-01".to_string()),
            cert_valid_to: Some("2028-02-01".to_string()),
            cert_request_status: None,
        }
    }
}

use common::*;

#[test]
fn new_enrollment_walks_from_profile_to_signature() {
    let id = ApplicationId("loan-2024-001".to_string());
    let store = RecordStore::seeded(application(
        "loan-2024-001",
        ApplicationStatus::PendingProfileConfirmation,
    ));
    let issuer = Arc::new(Issuer::default());
    let service = EnrollmentService::new(
        store,
        Arc::new(Directory::default()),
        issuer.clone(),
        Authority::scripted(vec![reply("000")]),
        Arc::new(Evidence::default()),
        EnrollmentConfig::default(),
    );

    let outcome = service.confirm_profile(&id).expect("profile confirmed");
    assert_eq!(outcome.application.status, ApplicationStatus::PendingKyc);
    assert!(outcome.existing_certificate.is_none());

    let record = service.complete_kyc(&id).expect("kyc completed");
    assert_eq!(record.status, ApplicationStatus::PendingCertificateOtp);

    let delivery = service.send_otp(&id).expect("otp delivered");
    assert_eq!(delivery.usage.code(), "NU");
    assert_eq!(delivery.countdown_secs, 300);
    assert_eq!(issuer.sent.lock().expect("issuer mutex poisoned").len(), 1);

    let outcome = service
        .request_certificate(&id, "482913")
        .expect("enrollment succeeds");
    assert_eq!(
        outcome.application.status,
        ApplicationStatus::PendingSignature
    );
    assert!(!outcome.reused_existing);
    assert_eq!(service.session_phase(&id), EnrollmentPhase::Succeeded);
}

#[test]
fn active_certificate_skips_straight_to_signature() {
    let id = ApplicationId("loan-2024-002".to_string());
    let store = RecordStore::seeded(application(
        "loan-2024-002",
        ApplicationStatus::PendingProfileConfirmation,
    ));
    let service = EnrollmentService::new(
        store,
        Directory::with_active_certificate(),
        Arc::new(Issuer::default()),
        Authority::scripted(vec![]),
        Arc::new(Evidence::default()),
        EnrollmentConfig::default(),
    );

    let outcome = service.confirm_profile(&id).expect("profile confirmed");
    assert_eq!(
        outcome.application.status,
        ApplicationStatus::PendingSignature
    );
    let certificate = outcome.existing_certificate.expect("metadata present");
    assert_eq!(certificate.serial_no.as_deref(), Some("SN-2208"));
    assert_eq!(
        certificate.subject_common_name.as_deref(),
        Some("SITI BINTI HASSAN")
    );
}

#[test]
fn wrong_otp_is_recoverable_without_a_fresh_send() {
    let id = ApplicationId("loan-2024-003".to_string());
    let store = RecordStore::seeded(application(
        "loan-2024-003",
        ApplicationStatus::PendingCertificateOtp,
    ));
    let service = EnrollmentService::new(
        store,
        Arc::new(Directory::default()),
        Arc::new(Issuer::default()),
        Authority::scripted(vec![reply("AP112"), reply("000")]),
        Arc::new(Evidence::default()),
        EnrollmentConfig::default(),
    );

    service.send_otp(&id).expect("otp delivered");

    match service.request_certificate(&id, "111111") {
        Err(EnrollmentError::Provider {
            code,
            otp_retryable,
            ..
        }) => {
            assert_eq!(code, "AP112");
            assert!(otp_retryable);
        }
        other => panic!("expected provider failure, got {other:?}"),
    }
    assert_eq!(service.session_phase(&id), EnrollmentPhase::OtpPending);

    let outcome = service
        .request_certificate(&id, "482913")
        .expect("second submission succeeds");
    assert_eq!(
        outcome.application.status,
        ApplicationStatus::PendingSignature
    );
}

#[test]
fn regression_to_kyc_forces_fresh_evidence_on_reentry() {
    let id = ApplicationId("loan-2024-004".to_string());
    let store = RecordStore::seeded(application(
        "loan-2024-004",
        ApplicationStatus::PendingCertificateOtp,
    ));
    let evidence = Arc::new(Evidence::default());
    let authority = Authority::scripted(vec![reply("AP121"), reply("000")]);
    let service = EnrollmentService::new(
        store,
        Arc::new(Directory::default()),
        Arc::new(Issuer::default()),
        authority.clone(),
        evidence.clone(),
        EnrollmentConfig::default(),
    );

    match service.request_certificate(&id, "111111") {
        Err(EnrollmentError::Provider { code, .. }) => assert_eq!(code, "AP121"),
        other => panic!("expected provider failure, got {other:?}"),
    }
    assert_eq!(evidence.fetches.load(Ordering::Relaxed), 1);

    let record = service.backtrack(&id).expect("regression succeeds");
    assert_eq!(record.status, ApplicationStatus::PendingKyc);
    assert_eq!(service.session_phase(&id), EnrollmentPhase::NotStarted);

    service.complete_kyc(&id).expect("gate reopens");
    let outcome = service
        .request_certificate(&id, "482913")
        .expect("enrollment succeeds after regression");
    assert_eq!(
        outcome.application.status,
        ApplicationStatus::PendingSignature
    );
    assert_eq!(evidence.fetches.load(Ordering::Relaxed), 2);
    assert_eq!(authority.calls.load(Ordering::Relaxed), 2);
}

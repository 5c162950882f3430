use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::config::EnrollmentConfig;
use crate::workflows::enrollment::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, BorrowerProfile, CertificateRequest,
    DirectoryEntry, IdDocumentType, KycImageSet, OtpReceipt, OtpRequest, ProviderReply,
};
use crate::workflows::enrollment::progression::{ApplicationStore, StoreError};
use crate::workflows::enrollment::providers::{
    CertificateAuthority, CertificateDirectory, KycEvidenceProvider, OtpIssuer, ProviderError,
};
use crate::workflows::enrollment::service::EnrollmentService;

pub(super) type TestService = EnrollmentService<
    MemoryStore,
    ScriptedDirectory,
    RecordingOtpIssuer,
    ScriptedAuthority,
    ScriptedKyc,
>;

pub(super) fn app_id() -> ApplicationId {
    ApplicationId("app-001".to_string())
}

pub(super) fn borrower() -> BorrowerProfile {
    BorrowerProfile {
        full_name: "AHMAD BIN ALI".to_string(),
        email: "ahmad@example.com".to_string(),
        mobile_no: "+60123456789".to_string(),
        id_number: "900101-14-1234".to_string(),
        id_type: IdDocumentType::Nric,
    }
}

pub(super) fn application(status: ApplicationStatus) -> ApplicationRecord {
    ApplicationRecord {
        id: app_id(),
        status,
        app_step: 1,
        borrower: borrower(),
    }
}

pub(super) fn active_entry() -> DirectoryEntry {
    DirectoryEntry {
        cert_status: Some("ACTIVE".to_string()),
        cert_subject_dn: Some("CN=AHMAD BIN ALI, O=National CA, C=MY".to_string()),
        cert_serial_no: Some("SN-4471".to_string()),
        cert_valid_from: Some("2025-01-01".to_string()),
        cert_valid_to: Some("2027-01-01".to_string()),
    }
}

pub(super) fn complete_images() -> KycImageSet {
    KycImageSet {
        front: Some("https://cdn.portal.example/kyc/app-001/front.jpg".to_string()),
        back: Some("https://cdn.portal.example/kyc/app-001/back.jpg".to_string()),
        selfie: Some("https://cdn.portal.example/kyc/app-001/selfie.jpg".to_string()),
    }
}

pub(super) fn reply(code: &str, msg: Option<&str>) -> ProviderReply {
    ProviderReply {
        status_code: code.to_string(),
        status_msg: msg.map(str::to_string),
        cert_serial_no: Some("SN-9001".to_string()),
        cert_request_id: Some("REQ-77".to_string()),
        cert_valid_from: Some("2026-01-01".to_string()),
        cert_valid_to: Some("2028-01-01".to_string()),
        cert_request_status: None,
    }
}

/// In-memory stand-in for the external application record store. Records
/// every status patch so tests can assert exactly-one-update semantics.
#[derive(Default)]
pub(super) struct MemoryStore {
    records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    status_patches: Mutex<Vec<(ApplicationId, ApplicationStatus)>>,
}

impl MemoryStore {
    pub(super) fn insert(&self, record: ApplicationRecord) {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(record.id.clone(), record);
    }

    pub(super) fn status_of(&self, id: &ApplicationId) -> ApplicationStatus {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .expect("record present")
            .status
    }

    pub(super) fn status_patch_count(&self) -> usize {
        self.status_patches
            .lock()
            .expect("store mutex poisoned")
            .len()
    }
}

impl ApplicationStore for MemoryStore {
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
        self.status_patches
            .lock()
            .expect("store mutex poisoned")
            .push((id.clone(), status));
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

/// Directory fake returning one configurable entry, counting lookups.
#[derive(Default)]
pub(super) struct ScriptedDirectory {
    entry: Mutex<DirectoryEntry>,
    calls: AtomicUsize,
}

impl ScriptedDirectory {
    pub(super) fn set(&self, entry: DirectoryEntry) {
        *self.entry.lock().expect("directory mutex poisoned") = entry;
    }

    pub(super) fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl CertificateDirectory for ScriptedDirectory {
    fn certificate_status(&self, _borrower_id: &str) -> Result<DirectoryEntry, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.entry.lock().expect("directory mutex poisoned").clone())
    }
}

/// OTP issuer fake that accepts every send and records the requests.
pub(super) struct RecordingOtpIssuer {
    pub(super) requests: Mutex<Vec<OtpRequest>>,
    receipt: Mutex<OtpReceipt>,
}

impl Default for RecordingOtpIssuer {
    fn default() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            receipt: Mutex::new(OtpReceipt {
                success: true,
                message: None,
            }),
        }
    }
}

impl RecordingOtpIssuer {
    pub(super) fn decline(&self, message: &str) {
        *self.receipt.lock().expect("issuer mutex poisoned") = OtpReceipt {
            success: false,
            message: Some(message.to_string()),
        };
    }

    pub(super) fn sent(&self) -> Vec<OtpRequest> {
        self.requests.lock().expect("issuer mutex poisoned").clone()
    }
}

impl OtpIssuer for RecordingOtpIssuer {
    fn send(&self, request: &OtpRequest) -> Result<OtpReceipt, ProviderError> {
        self.requests
            .lock()
            .expect("issuer mutex poisoned")
            .push(request.clone());
        Ok(self.receipt.lock().expect("issuer mutex poisoned").clone())
    }
}

/// Certificate authority fake answering with one scripted reply.
pub(super) struct ScriptedAuthority {
    reply: Mutex<ProviderReply>,
    pub(super) requests: Mutex<Vec<CertificateRequest>>,
}

impl Default for ScriptedAuthority {
    fn default() -> Self {
        Self {
            reply: Mutex::new(reply("000", None)),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedAuthority {
    pub(super) fn respond_with(&self, next: ProviderReply) {
        *self.reply.lock().expect("authority mutex poisoned") = next;
    }

    pub(super) fn call_count(&self) -> usize {
        self.requests.lock().expect("authority mutex poisoned").len()
    }

    pub(super) fn last_request(&self) -> CertificateRequest {
        self.requests
            .lock()
            .expect("authority mutex poisoned")
            .last()
            .expect("at least one request submitted")
            .clone()
    }
}

impl CertificateAuthority for ScriptedAuthority {
    fn request_certificate(
        &self,
        request: &CertificateRequest,
    ) -> Result<ProviderReply, ProviderError> {
        self.requests
            .lock()
            .expect("authority mutex poisoned")
            .push(request.clone());
        Ok(self.reply.lock().expect("authority mutex poisoned").clone())
    }
}

/// Authority fake that always fails at the transport layer.
pub(super) struct UnreachableAuthority;

impl CertificateAuthority for UnreachableAuthority {
    fn request_certificate(
        &self,
        _request: &CertificateRequest,
    ) -> Result<ProviderReply, ProviderError> {
        Err(ProviderError::Transport("connection refused".to_string()))
    }
}

/// KYC provider fake serving one configurable image set, counting fetches.
pub(super) struct ScriptedKyc {
    images: Mutex<KycImageSet>,
    calls: AtomicUsize,
}

impl Default for ScriptedKyc {
    fn default() -> Self {
        Self {
            images: Mutex::new(complete_images()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedKyc {
    pub(super) fn set(&self, images: KycImageSet) {
        *self.images.lock().expect("kyc mutex poisoned") = images;
    }

    pub(super) fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl KycEvidenceProvider for ScriptedKyc {
    fn images(&self, _borrower_id: &str) -> Result<KycImageSet, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.images.lock().expect("kyc mutex poisoned").clone())
    }
}

/// Everything a test needs to drive the workflow end to end.
pub(super) struct Rig {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) directory: Arc<ScriptedDirectory>,
    pub(super) otp: Arc<RecordingOtpIssuer>,
    pub(super) authority: Arc<ScriptedAuthority>,
    pub(super) kyc: Arc<ScriptedKyc>,
}

pub(super) fn rig_with(record: ApplicationRecord) -> Rig {
    let rig = rig();
    rig.store.insert(record);
    rig
}

pub(super) fn rig() -> Rig {
    let store = Arc::new(MemoryStore::default());
    let directory = Arc::new(ScriptedDirectory::default());
    let otp = Arc::new(RecordingOtpIssuer::default());
    let authority = Arc::new(ScriptedAuthority::default());
    let kyc = Arc::new(ScriptedKyc::default());
    let service = Arc::new(EnrollmentService::new(
        store.clone(),
        directory.clone(),
        otp.clone(),
        authority.clone(),
        kyc.clone(),
        EnrollmentConfig::default(),
    ));

    Rig {
        service,
        store,
        directory,
        otp,
        authority,
        kyc,
    }
}

pub(super) async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

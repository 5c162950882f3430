use std::fmt;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

/// Fixed wire codes required by the certificate provider for this portal.
pub const NATIONALITY_CODE: &str = "MY";
pub const USER_TYPE_CODE: &str = "1";
pub const VERIFICATION_METHOD: &str = "EKYC";
pub const VERIFICATION_STATUS: &str = "VERIFIED";
pub const VERIFIER_TAG: &str = "PORTAL-EKYC";

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Single authoritative progression field for a loan application.
///
/// `PendingCertificateOtp` and `PendingSigningOtp` are a historical naming
/// split for the same gate; both remain readable from stored records, but
/// transitions issued here only ever write `PendingCertificateOtp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    PendingProfileConfirmation,
    PendingKyc,
    PendingCertificateOtp,
    PendingSigningOtp,
    PendingSignature,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::PendingProfileConfirmation => "PENDING_PROFILE_CONFIRMATION",
            ApplicationStatus::PendingKyc => "PENDING_KYC",
            ApplicationStatus::PendingCertificateOtp => "PENDING_CERTIFICATE_OTP",
            ApplicationStatus::PendingSigningOtp => "PENDING_SIGNING_OTP",
            ApplicationStatus::PendingSignature => "PENDING_SIGNATURE",
        }
    }

    /// Either of the two OTP-gate labels admits the OTP and certificate steps.
    pub const fn is_otp_gate(self) -> bool {
        matches!(
            self,
            ApplicationStatus::PendingCertificateOtp | ApplicationStatus::PendingSigningOtp
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity document kinds accepted by the certificate provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdDocumentType {
    Nric,
    Passport,
}

impl IdDocumentType {
    pub const fn code(self) -> &'static str {
        match self {
            IdDocumentType::Nric => "N",
            IdDocumentType::Passport => "P",
        }
    }
}

/// Borrower snapshot carried on the application record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerProfile {
    pub full_name: String,
    pub email: String,
    pub mobile_no: String,
    /// National identity or passport number; the primary key for all
    /// certificate and OTP operations.
    pub id_number: String,
    pub id_type: IdDocumentType,
}

/// Durable application record held by the external record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
    /// 1-based wizard resume cursor; independent of `status` and only used
    /// by the multi-step form, never by the certificate flow.
    pub app_step: u16,
    pub borrower: BorrowerProfile,
}

/// Read-only view of one certificate directory lookup. Never cached beyond
/// the orchestration step that fetched it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub cert_status: Option<String>,
    pub cert_subject_dn: Option<String>,
    pub cert_serial_no: Option<String>,
    pub cert_valid_from: Option<String>,
    pub cert_valid_to: Option<String>,
}

impl DirectoryEntry {
    /// Pull the CN attribute out of the subject DN for the identity
    /// cross-check shown to the borrower.
    pub fn common_name(&self) -> Option<&str> {
        let dn = self.cert_subject_dn.as_deref()?;
        dn.split(',').find_map(|part| {
            let part = part.trim();
            part.strip_prefix("CN=").or_else(|| part.strip_prefix("cn="))
        })
    }
}

/// The three identity image references produced by the KYC capture flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycImageSet {
    pub front: Option<String>,
    pub back: Option<String>,
    pub selfie: Option<String>,
}

impl KycImageSet {
    /// Names of the evidence slots that are absent or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for (name, slot) in [
            ("front", &self.front),
            ("back", &self.back),
            ("selfie", &self.selfie),
        ] {
            match slot {
                Some(url) if !url.trim().is_empty() => {}
                _ => missing.push(name),
            }
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Which challenge flow the OTP provider runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpUsage {
    /// "NU": enroll a brand-new certificate.
    #[serde(rename = "NU")]
    NewEnrollment,
    /// "DS": sign against an existing certificate.
    #[serde(rename = "DS")]
    DigitalSigning,
}

impl OtpUsage {
    pub const fn code(self) -> &'static str {
        match self {
            OtpUsage::NewEnrollment => "NU",
            OtpUsage::DigitalSigning => "DS",
        }
    }
}

/// Payload for one OTP send against the challenge issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
    pub borrower_id: String,
    pub usage: OtpUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

/// Issuer acknowledgement for an OTP send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpReceipt {
    pub success: bool,
    pub message: Option<String>,
}

/// Local display countdown for a delivered OTP. The issuer enforces the
/// authoritative 300-second expiry; this only paces resends in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub usage: OtpUsage,
    pub sent_at: DateTime<Utc>,
    pub ttl_secs: i64,
}

impl OtpChallenge {
    pub fn issued(usage: OtpUsage, sent_at: DateTime<Utc>, ttl_secs: i64) -> Self {
        Self {
            usage,
            sent_at,
            ttl_secs,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.sent_at + Duration::seconds(self.ttl_secs)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_seconds().max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Verification metadata stamped onto every certificate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationData {
    pub verified_at: String,
    pub method: String,
    pub status: String,
    pub verified_by: String,
}

impl VerificationData {
    pub fn stamped(now: DateTime<Local>) -> Self {
        Self {
            verified_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            method: VERIFICATION_METHOD.to_string(),
            status: VERIFICATION_STATUS.to_string(),
            verified_by: VERIFIER_TAG.to_string(),
        }
    }
}

/// Fully assembled enrollment request submitted to the certificate provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub borrower_id: String,
    pub full_name: String,
    pub email_address: String,
    pub mobile_no: String,
    pub nationality: String,
    pub user_type: String,
    pub id_type: String,
    /// The borrower-entered OTP code acting as the authentication factor.
    pub auth_factor: String,
    pub nric_front_url: String,
    pub nric_back_url: String,
    pub selfie_image_url: String,
    pub verification_data: VerificationData,
}

impl CertificateRequest {
    /// Assemble the provider payload from a complete KYC image set.
    ///
    /// Callers must have checked `images.is_complete()` first; blank slots
    /// degrade to empty strings rather than panicking.
    pub fn assemble(
        borrower: &BorrowerProfile,
        otp_code: &str,
        images: &KycImageSet,
        verification_data: VerificationData,
    ) -> Self {
        Self {
            borrower_id: borrower.id_number.clone(),
            full_name: borrower.full_name.clone(),
            email_address: borrower.email.clone(),
            mobile_no: borrower.mobile_no.clone(),
            nationality: NATIONALITY_CODE.to_string(),
            user_type: USER_TYPE_CODE.to_string(),
            id_type: borrower.id_type.code().to_string(),
            auth_factor: otp_code.to_string(),
            nric_front_url: images.front.clone().unwrap_or_default(),
            nric_back_url: images.back.clone().unwrap_or_default(),
            selfie_image_url: images.selfie.clone().unwrap_or_default(),
            verification_data,
        }
    }
}

/// Raw provider reply for a certificate request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReply {
    pub status_code: String,
    pub status_msg: Option<String>,
    pub cert_serial_no: Option<String>,
    #[serde(rename = "certRequestID")]
    pub cert_request_id: Option<String>,
    pub cert_valid_from: Option<String>,
    pub cert_valid_to: Option<String>,
    pub cert_request_status: Option<String>,
}

/// Display-only certificate metadata returned to the caller on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub serial_no: Option<String>,
    pub request_id: Option<String>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub subject_common_name: Option<String>,
}

impl CertificateSummary {
    pub fn from_reply(reply: &ProviderReply) -> Self {
        Self {
            serial_no: reply.cert_serial_no.clone(),
            request_id: reply.cert_request_id.clone(),
            valid_from: reply.cert_valid_from.clone(),
            valid_to: reply.cert_valid_to.clone(),
            subject_common_name: None,
        }
    }

    pub fn from_directory(entry: &DirectoryEntry) -> Self {
        Self {
            serial_no: entry.cert_serial_no.clone(),
            request_id: None,
            valid_from: entry.cert_valid_from.clone(),
            valid_to: entry.cert_valid_to.clone(),
            subject_common_name: entry.common_name().map(str::to_string),
        }
    }
}

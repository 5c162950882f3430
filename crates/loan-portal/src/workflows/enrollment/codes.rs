//! Certificate provider status-code taxonomy.
//!
//! The provider classifies every enrollment attempt with a short
//! alphanumeric code. The mapping below is data, not control flow: adding a
//! new code means adding a table row. Unrecognized codes always classify as
//! failures that echo the raw code and provider message.

/// How a provider code resolves for the borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    /// Non-zero code that still counts as success: the borrower already
    /// holds a certificate the provider will reuse.
    RecoverableSuccess,
    Failure,
}

/// One classified provider reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub code: String,
    pub disposition: Disposition,
    /// One non-technical sentence shown to the borrower.
    pub message: String,
    /// True for OTP-entry failures the borrower may retry against the same
    /// challenge session.
    pub otp_retryable: bool,
}

impl Classified {
    pub fn is_success(&self) -> bool {
        matches!(
            self.disposition,
            Disposition::Success | Disposition::RecoverableSuccess
        )
    }
}

pub const SUCCESS_CODE: &str = "000";
pub const EXISTING_CERTIFICATE_CODE: &str = "AP111";

const OTP_RETRYABLE_CODES: [&str; 3] = ["AP112", "AP113", "AP114"];

const CODE_TABLE: &[(&str, Disposition, &str)] = &[
    ("000", Disposition::Success, "Your digital certificate is ready."),
    (
        "AP100",
        Disposition::Failure,
        "We could not enroll your digital certificate automatically. Please try again later.",
    ),
    (
        "AP101",
        Disposition::Failure,
        "Some required details are missing from your profile. Please review and complete your profile.",
    ),
    (
        "AP102",
        Disposition::Failure,
        "Some of your details are in an invalid format. Please review your profile information.",
    ),
    (
        "AP103",
        Disposition::Failure,
        "Your account type is not eligible for digital certificate enrollment.",
    ),
    (
        "AP104",
        Disposition::Failure,
        "Your nationality could not be accepted for certificate enrollment.",
    ),
    (
        "AP105",
        Disposition::Failure,
        "Your identity document type is not supported for certificate enrollment.",
    ),
    (
        "AP106",
        Disposition::Failure,
        "Your identity number could not be validated. Please check your profile details.",
    ),
    (
        "AP107",
        Disposition::Failure,
        "One of your identity images is in an unsupported format. Please recapture your documents.",
    ),
    (
        "AP108",
        Disposition::Failure,
        "One of your identity images is too large. Please recapture your documents.",
    ),
    (
        "AP109",
        Disposition::Failure,
        "We could not retrieve your identity images. Please redo identity verification.",
    ),
    (
        "AP110",
        Disposition::Failure,
        "Your identity document could not be read. Please recapture your documents.",
    ),
    (
        "AP111",
        Disposition::RecoverableSuccess,
        "An existing digital certificate was found and will be used for signing.",
    ),
    (
        "AP112",
        Disposition::Failure,
        "Invalid OTP code. Please check the OTP you entered.",
    ),
    (
        "AP113",
        Disposition::Failure,
        "Your OTP has expired. Please request a new OTP.",
    ),
    (
        "AP114",
        Disposition::Failure,
        "We could not validate your OTP. Please try again.",
    ),
    (
        "AP115",
        Disposition::Failure,
        "Your identity verification is incomplete. Please finish identity verification first.",
    ),
    (
        "AP121",
        Disposition::Failure,
        "A certificate request is already in progress. Please wait a moment and try again.",
    ),
    (
        "AP122",
        Disposition::Failure,
        "One of your documents exceeds the allowed size. Please recapture and resubmit.",
    ),
    (
        "AP123",
        Disposition::Failure,
        "Your documents are currently unavailable. Please redo identity verification.",
    ),
];

/// OTP-entry failures keep the challenge session open for resubmission.
pub fn is_otp_retryable(code: &str) -> bool {
    OTP_RETRYABLE_CODES.contains(&code)
}

/// Classify a raw provider reply. `provider_msg` is only surfaced for codes
/// outside the table, where the generic fallback echoes it for diagnostics.
pub fn classify(code: &str, provider_msg: Option<&str>) -> Classified {
    for (known, disposition, message) in CODE_TABLE {
        if *known == code {
            return Classified {
                code: code.to_string(),
                disposition: *disposition,
                message: (*message).to_string(),
                otp_retryable: is_otp_retryable(code),
            };
        }
    }

    let detail = provider_msg.unwrap_or("no further detail from the provider");
    Classified {
        code: code.to_string(),
        disposition: Disposition::Failure,
        message: format!("Certificate enrollment failed ({code}): {detail}"),
        otp_retryable: false,
    }
}

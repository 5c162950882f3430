use super::domain::{CertificateRequest, DirectoryEntry, KycImageSet, OtpReceipt, OtpRequest};

/// Certificate directory lookup: the single source of truth for whether a
/// borrower already holds a signing certificate. Implementations must not
/// cache between calls; the workflow deliberately reads it twice.
pub trait CertificateDirectory: Send + Sync {
    fn certificate_status(&self, borrower_id: &str) -> Result<DirectoryEntry, ProviderError>;
}

/// One-time-password challenge issuer.
pub trait OtpIssuer: Send + Sync {
    fn send(&self, request: &OtpRequest) -> Result<OtpReceipt, ProviderError>;
}

/// The PKI provider that enrolls certificates.
pub trait CertificateAuthority: Send + Sync {
    fn request_certificate(
        &self,
        request: &CertificateRequest,
    ) -> Result<super::domain::ProviderReply, ProviderError>;
}

/// Supplies the three identity image references captured during KYC.
pub trait KycEvidenceProvider: Send + Sync {
    fn images(&self, borrower_id: &str) -> Result<KycImageSet, ProviderError>;
}

/// Transport-level failure talking to any external collaborator. Always safe
/// to retry by re-invoking the same operation.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Transport(String),
    #[error("provider timed out: {0}")]
    Timeout(String),
}

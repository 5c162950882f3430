//! Application progression and OTP-gated digital certificate enrollment.
//!
//! This is the portal's one piece of real design content: a finite-state
//! machine over the persisted application status, an orchestrator that
//! drives the OTP challenge and certificate request against the external
//! PKI provider, and a closed taxonomy for the provider's status codes.
//! Everything external (record store, certificate directory, OTP issuer,
//! KYC evidence) sits behind traits so the workflow runs without a live
//! network in tests.

pub mod codes;
pub mod domain;
pub mod progression;
pub mod providers;
pub mod router;
pub mod service;
pub mod session;

#[cfg(test)]
mod tests;

pub use codes::{classify, Classified, Disposition};
pub use domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, BorrowerProfile, CertificateRequest,
    CertificateSummary, DirectoryEntry, IdDocumentType, KycImageSet, OtpChallenge, OtpReceipt,
    OtpRequest, OtpUsage, ProviderReply, VerificationData,
};
pub use progression::{
    ApplicationStore, ProgressionController, ProgressionError, StatusGate, StoreError,
};
pub use providers::{
    CertificateAuthority, CertificateDirectory, KycEvidenceProvider, OtpIssuer, ProviderError,
};
pub use router::{enrollment_router, ApplicationView, CertificateSubmission, StepUpdate};
pub use service::{
    ApplicationSnapshot, EnrollmentError, EnrollmentOutcome, EnrollmentService, OtpDelivery,
    ProfileOutcome,
};
pub use session::{EnrollmentPhase, EnrollmentSession};

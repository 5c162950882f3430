use chrono::{DateTime, Utc};
use serde::Serialize;

use super::codes;
use super::domain::OtpChallenge;

/// Where one borrower's enrollment attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPhase {
    NotStarted,
    OtpPending,
    Verifying,
    Succeeded,
    Failed,
}

impl EnrollmentPhase {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentPhase::NotStarted => "not_started",
            EnrollmentPhase::OtpPending => "otp_pending",
            EnrollmentPhase::Verifying => "verifying",
            EnrollmentPhase::Succeeded => "succeeded",
            EnrollmentPhase::Failed => "failed",
        }
    }
}

/// Explicit state machine for one OTP + certificate attempt, independent of
/// any request/response cycle so it can be exercised without a UI or
/// network: `NotStarted -> OtpPending -> Verifying -> {Succeeded, Failed}`.
///
/// `Failed` is not terminal for OTP-entry codes: as long as the local
/// countdown has not elapsed, the borrower may resubmit a new code against
/// the same challenge and the session returns to `OtpPending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentSession {
    phase: EnrollmentPhase,
    challenge: Option<OtpChallenge>,
    last_failure_code: Option<String>,
}

impl Default for EnrollmentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrollmentSession {
    pub fn new() -> Self {
        Self {
            phase: EnrollmentPhase::NotStarted,
            challenge: None,
            last_failure_code: None,
        }
    }

    pub fn phase(&self) -> EnrollmentPhase {
        self.phase
    }

    pub fn challenge(&self) -> Option<&OtpChallenge> {
        self.challenge.as_ref()
    }

    pub fn last_failure_code(&self) -> Option<&str> {
        self.last_failure_code.as_deref()
    }

    /// True when a fresh OTP send is allowed: no live challenge, or the
    /// previous countdown has elapsed.
    pub fn can_resend(&self, now: DateTime<Utc>) -> bool {
        match (&self.phase, &self.challenge) {
            (EnrollmentPhase::OtpPending | EnrollmentPhase::Verifying, Some(challenge)) => {
                challenge.is_expired(now)
            }
            _ => true,
        }
    }

    /// Seconds left on the display countdown, if a challenge is live.
    pub fn countdown_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.challenge
            .as_ref()
            .map(|challenge| challenge.remaining_secs(now))
    }

    /// An OTP was delivered; the borrower may now submit a code.
    pub fn otp_sent(&mut self, challenge: OtpChallenge) {
        self.challenge = Some(challenge);
        self.last_failure_code = None;
        self.phase = EnrollmentPhase::OtpPending;
    }

    /// A certificate request is in flight for this session.
    pub fn begin_verification(&mut self) {
        self.phase = EnrollmentPhase::Verifying;
    }

    /// The in-flight request never reached a provider verdict; reopen the
    /// session so the same submission can be retried verbatim.
    pub fn verification_interrupted(&mut self) {
        if self.phase == EnrollmentPhase::Verifying {
            self.phase = EnrollmentPhase::OtpPending;
        }
    }

    /// Provider verdict was success or recoverable success.
    pub fn complete(&mut self) {
        self.phase = EnrollmentPhase::Succeeded;
        self.last_failure_code = None;
    }

    /// Provider verdict was a failure code. OTP-entry codes with an
    /// unexpired countdown reopen the session; everything else lands in
    /// `Failed` and requires a fresh OTP send.
    pub fn fail(&mut self, code: &str, now: DateTime<Utc>) {
        self.last_failure_code = Some(code.to_string());
        let challenge_alive = self
            .challenge
            .as_ref()
            .map(|challenge| !challenge.is_expired(now))
            .unwrap_or(false);

        if codes::is_otp_retryable(code) && challenge_alive {
            self.phase = EnrollmentPhase::OtpPending;
        } else {
            self.phase = EnrollmentPhase::Failed;
        }
    }
}

use std::sync::Arc;

use clap::Args;

use loan_portal::config::EnrollmentConfig;
use loan_portal::error::AppError;
use loan_portal::workflows::enrollment::{
    BorrowerProfile, EnrollmentError, EnrollmentService, IdDocumentType,
};

use crate::infra::{
    InMemoryApplicationStore, LoggingOtpIssuer, SimulatedCertificateAuthority,
    StubCertificateDirectory, StubKycEvidence,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Also walk a borrower who already holds an active certificate
    #[arg(long)]
    pub(crate) existing_certificate: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryApplicationStore::default());
    let directory = Arc::new(StubCertificateDirectory::default());
    let service = EnrollmentService::new(
        store.clone(),
        directory.clone(),
        Arc::new(LoggingOtpIssuer),
        Arc::new(SimulatedCertificateAuthority::default()),
        Arc::new(StubKycEvidence),
        EnrollmentConfig::default(),
    );

    println!("Loan origination portal demo");
    println!("============================");

    let record = store.create(BorrowerProfile {
        full_name: "AHMAD BIN ALI".to_string(),
        email: "ahmad@example.com".to_string(),
        mobile_no: "+60123456789".to_string(),
        id_number: "900101-14-1234".to_string(),
        id_type: IdDocumentType::Nric,
    });
    println!(
        "\nOpened application {} for {} ({})",
        record.id.0, record.borrower.full_name, record.status
    );

    let outcome = service.confirm_profile(&record.id)?;
    println!("Profile confirmed -> {}", outcome.application.status);

    let after_kyc = service.complete_kyc(&record.id)?;
    println!("KYC capture finished -> {}", after_kyc.status);

    let delivery = service.send_otp(&record.id)?;
    println!(
        "OTP challenge sent (usage {}, {}s countdown)",
        delivery.usage.code(),
        delivery.countdown_secs
    );

    // A malformed code first, to show the recoverable failure path.
    match service.request_certificate(&record.id, "ABC123") {
        Err(EnrollmentError::Provider {
            code,
            message,
            otp_retryable,
        }) => {
            println!("Submission rejected ({code}): {message}");
            println!("Retryable with the same challenge: {otp_retryable}");
        }
        Ok(_) => println!("Unexpected: malformed code was accepted"),
        Err(other) => return Err(other.into()),
    }

    let outcome = service.request_certificate(&record.id, "482913")?;
    println!(
        "Certificate enrolled (serial {}) -> {}",
        outcome
            .certificate
            .serial_no
            .as_deref()
            .unwrap_or("unknown"),
        outcome.application.status
    );

    if args.existing_certificate {
        println!("\nBorrower with an active certificate on file");
        println!("-------------------------------------------");

        let repeat = store.create(BorrowerProfile {
            full_name: "SITI BINTI HASSAN".to_string(),
            email: "siti@example.com".to_string(),
            mobile_no: "+60198765432".to_string(),
            id_number: "880505-10-5678".to_string(),
            id_type: IdDocumentType::Nric,
        });
        directory.mark_active(&repeat.borrower.id_number);

        let outcome = service.confirm_profile(&repeat.id)?;
        println!(
            "Profile confirmed -> {} (KYC and OTP skipped)",
            outcome.application.status
        );
        if let Some(certificate) = outcome.existing_certificate {
            println!(
                "Existing certificate reused (serial {})",
                certificate.serial_no.as_deref().unwrap_or("unknown")
            );
        }
    }

    println!("\nDemo complete.");
    Ok(())
}

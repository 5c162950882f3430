use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the portal service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub enrollment: EnrollmentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            enrollment: EnrollmentConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the certificate enrollment workflow.
///
/// The portal historically compared the directory status against "ACTIVE" in
/// one read path and "Valid" in another. The literal lives here, in exactly
/// one place, so whichever value the certificate directory actually returns
/// can be set per deployment without touching workflow code.
#[derive(Debug, Clone)]
pub struct EnrollmentConfig {
    pub active_cert_status: String,
    pub otp_ttl_secs: i64,
}

impl EnrollmentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let active_cert_status =
            env::var("CERT_ACTIVE_STATUS").unwrap_or_else(|_| "ACTIVE".to_string());
        let otp_ttl_secs = env::var("OTP_TTL_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidOtpTtl)?;

        if otp_ttl_secs <= 0 {
            return Err(ConfigError::InvalidOtpTtl);
        }

        Ok(Self {
            active_cert_status,
            otp_ttl_secs,
        })
    }

    /// Exact, case-sensitive match against the configured literal. Any other
    /// value, including an absent status, means no usable certificate.
    pub fn is_active(&self, cert_status: Option<&str>) -> bool {
        cert_status == Some(self.active_cert_status.as_str())
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            active_cert_status: "ACTIVE".to_string(),
            otp_ttl_secs: 300,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidOtpTtl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidOtpTtl => {
                write!(f, "OTP_TTL_SECONDS must be a positive number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidOtpTtl => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

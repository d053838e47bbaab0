// ── Runtime source configuration ──
//
// These types describe *how* to reach a Grand Challenge deployment. They
// carry credential data and connection tuning, but never touch disk.
// The CLI builds a `SourceConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use gcworklist_api::authenticated::DEFAULT_PROBE_PATH;
use gcworklist_api::{AuthScheme, Credentials, TlsMode};

/// Base URL plus the path of every resource collection.
///
/// Paths are relative to the base URL; each can be overridden to target
/// deployments that mount the same API shape elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrandChallengeUrls {
    pub base_url: String,
    pub worklists: String,
    pub patients: String,
    pub studies: String,
    pub images: String,
}

impl GrandChallengeUrls {
    /// The stock Grand Challenge layout under `base_url`.
    pub fn standard(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            worklists: "api/v1/worklists/".into(),
            patients: "api/v1/patients/".into(),
            studies: "api/v1/studies/".into(),
            images: "api/v1/cases/images/".into(),
        }
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Everything needed to connect a [`GrandChallengeSource`](crate::GrandChallengeSource).
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub urls: GrandChallengeUrls,
    pub scheme: AuthScheme,
    pub credentials: Credentials,
    pub tls: TlsVerification,
    /// Per-request transport timeout.
    pub timeout: Duration,
    /// Where downloaded image files are written.
    pub download_dir: PathBuf,
    /// Path probed to verify credentials.
    pub probe_path: String,
}

impl SourceConfig {
    /// Token authentication against the standard layout with default tuning.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            urls: GrandChallengeUrls::standard(base_url),
            scheme: AuthScheme::Token,
            credentials,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            download_dir: std::env::temp_dir().join("gcworklist"),
            probe_path: DEFAULT_PROBE_PATH.into(),
        }
    }
}

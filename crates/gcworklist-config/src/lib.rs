//! Configuration for the gcworklist tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `gcworklist_core::SourceConfig`. The CLI layers its flag
//! overrides on top of what this crate resolves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gcworklist_core::{AuthScheme, Credentials, GrandChallengeUrls, SourceConfig, TlsVerification};

/// Keyring service name; entries are keyed `<profile>/token` and `<profile>/password`.
pub const KEYRING_SERVICE: &str = "gcworklist";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' is not defined")]
    UnknownProfile { name: String },

    #[error("keyring access failed for profile '{profile}': {reason}")]
    Keyring { profile: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Where image downloads go when a profile doesn't say.
    pub download_dir: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            download_dir: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named Grand Challenge deployment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Base URL (e.g., "https://grand-challenge.org").
    pub base_url: String,

    /// Auth scheme: "token" or "session".
    #[serde(default = "default_auth")]
    pub auth: String,

    /// API token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the API token.
    pub token_env: Option<String>,

    /// Username for session auth.
    pub username: Option<String>,

    /// Password for session auth (plaintext; prefer keyring).
    pub password: Option<String>,

    /// Per-resource path overrides.
    #[serde(default)]
    pub paths: ResourcePaths,

    /// Override the credential verification path.
    pub probe_path: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override download directory.
    pub download_dir: Option<PathBuf>,
}

fn default_auth() -> String {
    "token".into()
}

/// Resource collection paths, relative to the base URL.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourcePaths {
    pub worklists: Option<String>,
    pub patients: Option<String>,
    pub studies: Option<String>,
    pub images: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "grand-challenge", "gcworklist")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("gcworklist");
    p
}

/// Default download directory: the platform cache dir, else the temp dir.
pub fn default_download_dir() -> PathBuf {
    project_dirs().map_or_else(
        || std::env::temp_dir().join("gcworklist"),
        |dirs| dirs.cache_dir().join("downloads"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Environment keys use the `GCWORKLIST_` prefix and `__` as the nesting
/// separator, e.g. `GCWORKLIST_PROFILES__DEFAULT__TOKEN`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GCWORKLIST_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str, key: &str) -> keyring::Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{key}"))
}

fn keyring_secret(profile_name: &str, key: &str) -> Option<SecretString> {
    let entry = keyring_entry(profile_name, key).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

/// Store a profile's API token in the system keyring.
pub fn store_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "token")
        .and_then(|entry| entry.set_password(token.expose_secret()))
        .map_err(|e| ConfigError::Keyring {
            profile: profile_name.into(),
            reason: e.to_string(),
        })
}

/// Resolve an API token from the credential chain (no CLI flag step).
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_secret(profile_name, "token") {
        return Ok(secret);
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve session credentials (username + password) without CLI flags.
pub fn resolve_session_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("GCWORKLIST_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var
    if let Ok(pw) = std::env::var("GCWORKLIST_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    // 2. Keyring
    if let Some(pw) = keyring_secret(profile_name, "password") {
        return Ok((username, pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Parse a profile's `auth` field.
pub fn auth_scheme(profile: &Profile) -> Result<AuthScheme, ConfigError> {
    profile
        .auth
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "auth".into(),
            reason: format!("expected 'token' or 'session', got '{}'", profile.auth),
        })
}

/// Resolve the credential store for a profile's auth scheme.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(AuthScheme, Credentials), ConfigError> {
    let scheme = auth_scheme(profile)?;
    let mut credentials = Credentials::default();
    match scheme {
        AuthScheme::Token => {
            credentials.insert_secret(Credentials::TOKEN, resolve_token(profile, profile_name)?);
        }
        AuthScheme::Session => {
            let (username, password) = resolve_session_credentials(profile, profile_name)?;
            credentials.insert(Credentials::USERNAME, username);
            credentials.insert_secret(Credentials::PASSWORD, password);
        }
    }

    if !scheme.required_keys().iter().all(|key| credentials.contains(key)) {
        return Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        });
    }
    Ok((scheme, credentials))
}

/// Resolve the URL layout of a profile, applying path overrides.
pub fn resolve_urls(profile: &Profile) -> Result<GrandChallengeUrls, ConfigError> {
    url::Url::parse(&profile.base_url).map_err(|e| ConfigError::Validation {
        field: "base_url".into(),
        reason: format!("invalid URL '{}': {e}", profile.base_url),
    })?;

    let mut urls = GrandChallengeUrls::standard(profile.base_url.clone());
    let paths = &profile.paths;
    for (slot, custom) in [
        (&mut urls.worklists, &paths.worklists),
        (&mut urls.patients, &paths.patients),
        (&mut urls.studies, &paths.studies),
        (&mut urls.images, &paths.images),
    ] {
        if let Some(custom) = custom {
            slot.clone_from(custom);
        }
    }
    Ok(urls)
}

/// Build a `SourceConfig` from a profile, without CLI flag overrides.
pub fn profile_to_source_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SourceConfig, ConfigError> {
    let urls = resolve_urls(profile)?;
    let (scheme, credentials) = resolve_credentials(profile, profile_name)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    let download_dir = profile
        .download_dir
        .clone()
        .or_else(|| defaults.download_dir.clone())
        .unwrap_or_else(default_download_dir);

    let mut config = SourceConfig::new(urls.base_url.clone(), credentials);
    config.urls = urls;
    config.scheme = scheme;
    config.tls = tls;
    config.timeout = timeout;
    config.download_dir = download_dir;
    if let Some(ref probe) = profile.probe_path {
        config.probe_path.clone_from(probe);
    }
    Ok(config)
}

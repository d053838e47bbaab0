//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use gcworklist_config::ConfigError;
use gcworklist_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach Grand Challenge at {url}")]
    #[diagnostic(
        code(gcworklist::connection_failed),
        help(
            "Check the base URL and your network connection.\n\
             URL: {url}\n\
             Try: gcworklist auth status --insecure"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed for profile '{profile}'")]
    #[diagnostic(
        code(gcworklist::auth_failed),
        help(
            "The server rejected the configured token.\n\
             Create a new API token under your Grand Challenge profile settings\n\
             and pass it with --token or GCWORKLIST_TOKEN."
        )
    )]
    AuthFailed { profile: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(gcworklist::no_credentials),
        help(
            "Set `token` or `token_env` in the profile, store the token in the\n\
             system keyring under '{profile}/token', or pass --token."
        )
    )]
    NoCredentials { profile: String },

    // ── Requests ─────────────────────────────────────────────────────
    #[error("{resource} not found")]
    #[diagnostic(code(gcworklist::not_found))]
    NotFound { resource: String },

    #[error("Request failed with code {code}")]
    #[diagnostic(
        code(gcworklist::request_failed),
        help("Negative codes are local failures; positive codes are HTTP statuses.\nRerun with -vv for details.")
    )]
    RequestFailed { code: i32 },

    #[error("The server refused to {action}")]
    #[diagnostic(code(gcworklist::rejected), help("Rerun with -vv to see the response status."))]
    Rejected { action: String },

    #[error("Could not download image '{image}'")]
    #[diagnostic(
        code(gcworklist::download_failed),
        help("The image may have no files attached. Rerun with -v for details.")
    )]
    DownloadFailed { image: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(gcworklist::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout,

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(gcworklist::api_error))]
    ApiError { code: i32, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gcworklist::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(gcworklist::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(gcworklist::no_config),
        help(
            "Create a profile in {path}\n\
             or pass --base-url and --token."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(gcworklist::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(gcworklist::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::RequestFailed { code } => match *code {
                401 | 403 => exit_code::AUTH,
                404 => exit_code::NOT_FOUND,
                gcworklist_core::code::TRANSPORT_ERROR => exit_code::CONNECTION,
                _ => exit_code::GENERAL,
            },
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { .. } => Self::AuthFailed {
                profile: "current".into(),
            },
            CoreError::Timeout => Self::Timeout,
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                resource: format!("{entity_type} {identifier}"),
            },
            CoreError::Api { message, code, .. } => Self::ApiError { code, message },
            CoreError::Config { message } => Self::Config { message },
            CoreError::Io(e) => Self::Io(e),
            CoreError::Internal(message) => Self::ApiError {
                code: gcworklist_core::code::REQUEST_ERROR,
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_codes_pick_exit_codes() {
        assert_eq!(CliError::RequestFailed { code: 404 }.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(CliError::RequestFailed { code: 401 }.exit_code(), exit_code::AUTH);
        assert_eq!(
            CliError::RequestFailed {
                code: gcworklist_core::code::TRANSPORT_ERROR
            }
            .exit_code(),
            exit_code::CONNECTION
        );
        assert_eq!(CliError::RequestFailed { code: 500 }.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn core_errors_keep_their_meaning() {
        let err: CliError = CoreError::NotFound {
            entity_type: "resource".into(),
            identifier: "https://gc.test/api/v1/cases/images/x/".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);

        let err: CliError = ConfigError::NoCredentials {
            profile: "default".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}

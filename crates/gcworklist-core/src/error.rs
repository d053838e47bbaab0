// ── Core error types ──
//
// User-facing errors from gcworklist-core. Callback-based operations
// report numeric codes; the awaited operations (connect, refresh,
// credential changes) return these instead. The `From<gcworklist_api::Error>`
// impl translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Not found: {entity_type} {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Numeric code as delivered to table receivers.
        code: i32,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Local errors ─────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Numeric code in the same taxonomy table receivers use.
    pub fn code(&self) -> i32 {
        match self {
            Self::Api { code, .. } => *code,
            Self::Io(e) => e
                .raw_os_error()
                .unwrap_or(gcworklist_api::code::TRANSPORT_ERROR),
            Self::ConnectionFailed { .. } | Self::Timeout => gcworklist_api::code::TRANSPORT_ERROR,
            Self::NotFound { .. } => 404,
            Self::AuthenticationFailed { .. } | Self::Config { .. } | Self::Internal(_) => {
                gcworklist_api::code::REQUEST_ERROR
            }
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<gcworklist_api::Error> for CoreError {
    fn from(err: gcworklist_api::Error) -> Self {
        use gcworklist_api::Error as ApiError;

        let code = err.code();
        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::MissingCredential { key } => CoreError::Config {
                message: format!("credential store has no '{key}' entry"),
            },
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            e @ ApiError::CaCertificate { .. } => CoreError::Config {
                message: e.to_string(),
            },
            ApiError::NoRuntime => {
                CoreError::Internal("no async runtime to schedule requests on".into())
            }
            ApiError::Status {
                status: 401 | 403,
                url,
            } => CoreError::AuthenticationFailed {
                message: format!("HTTP {code} from {url}"),
            },
            ApiError::Status { status: 404, url } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: url,
            },
            ApiError::Status { status, url } => CoreError::Api {
                message: format!("unexpected HTTP {status} from {url}"),
                code,
                status: Some(status),
            },
            ApiError::Parse { message } | ApiError::Deserialization { message, body: _ } => {
                CoreError::Api {
                    message,
                    code,
                    status: None,
                }
            }
            ApiError::Table(e) => CoreError::Api {
                message: e.to_string(),
                code,
                status: None,
            },
            ApiError::Io(e) => CoreError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_statuses_map_to_domain_variants() {
        let err = CoreError::from(gcworklist_api::Error::Status {
            status: 401,
            url: "http://gc/api/v1/".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));

        let err = CoreError::from(gcworklist_api::Error::Status {
            status: 404,
            url: "http://gc/api/v1/worklists/x/".into(),
        });
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert_eq!(err.code(), 404);

        let err = CoreError::from(gcworklist_api::Error::Status {
            status: 502,
            url: String::new(),
        });
        assert_eq!(err.code(), 502);
    }

    #[test]
    fn missing_credentials_are_configuration_errors() {
        let err = CoreError::from(gcworklist_api::Error::MissingCredential { key: "token" });
        assert!(matches!(err, CoreError::Config { .. }));
        assert!(err.to_string().contains("token"));
    }
}

use thiserror::Error;

use crate::table::TableError;

/// Numeric error codes handed to table receivers alongside their table.
///
/// `0` means success. Transport failures report the OS error number when
/// the transport exposes one, HTTP failures report the raw status, and
/// every structural failure collapses into [`PARSE_ERROR`].
pub mod code {
    pub const SUCCESS: i32 = 0;
    /// Malformed JSON, missing keys or unexpected value types.
    pub const PARSE_ERROR: i32 = -1;
    /// Transport failure without an OS error number behind it.
    pub const TRANSPORT_ERROR: i32 = -2;
    /// The request could not be built locally (bad URL, bad header, no runtime).
    pub const REQUEST_ERROR: i32 = -3;
}

/// Top-level error type for the `gcworklist-api` crate.
///
/// Covers authentication, transport, HTTP status, and payload structure
/// failures. `gcworklist-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server rejected the credentials, or a header could not be built from them.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The credential store lacks a key the active scheme needs.
    #[error("No '{key}' entry in the credential store")]
    MissingCredential { key: &'static str },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A custom CA certificate could not be read.
    #[error("Cannot read CA certificate {}: {source}", .path.display())]
    CaCertificate {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No tokio runtime was available to run request tasks on.
    #[error("No async runtime available to schedule requests")]
    NoRuntime,

    // ── HTTP ────────────────────────────────────────────────────────
    /// The server answered with a status the caller did not expect.
    #[error("Unexpected HTTP {status} from {url}")]
    Status { status: u16, url: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The payload was valid JSON but not in a shape we can read.
    #[error("Unexpected payload structure: {message}")]
    Parse { message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A row did not fit the table it was inserted into.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Local file I/O failed (downloads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Numeric code for this error, see [`code`].
    pub fn code(&self) -> i32 {
        match self {
            Self::Transport(e) => {
                if let Some(status) = e.status() {
                    return i32::from(status.as_u16());
                }
                os_error_code(e).unwrap_or(code::TRANSPORT_ERROR)
            }
            Self::Io(e) => e.raw_os_error().unwrap_or(code::TRANSPORT_ERROR),
            Self::Status { status, .. } => i32::from(*status),
            Self::Parse { .. } | Self::Deserialization { .. } | Self::Table(_) => {
                code::PARSE_ERROR
            }
            Self::Authentication { .. }
            | Self::CaCertificate { .. }
            | Self::MissingCredential { .. }
            | Self::InvalidUrl(_)
            | Self::NoRuntime => code::REQUEST_ERROR,
        }
    }
}

/// Walk the source chain of a transport error looking for the OS error number.
fn os_error_code(err: &reqwest::Error) -> Option<i32> {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if let Some(raw) = io.raw_os_error() {
                return Some(raw);
            }
        }
        source = inner.source();
    }
    None
}

/// Collapse a normalizer outcome into the numeric receiver code.
pub fn result_code<T>(result: &Result<T, Error>) -> i32 {
    match result {
        Ok(_) => code::SUCCESS,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_failures_share_the_parse_sentinel() {
        assert_eq!(Error::parse("missing results").code(), code::PARSE_ERROR);
        let body_err = Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        };
        assert_eq!(body_err.code(), code::PARSE_ERROR);
        let table_err = Error::Table(TableError::RowWidth {
            expected: 2,
            got: 3,
        });
        assert_eq!(table_err.code(), code::PARSE_ERROR);
    }

    #[test]
    fn status_errors_report_the_raw_status() {
        let err = Error::Status {
            status: 404,
            url: "http://host/api/v1/studies/".into(),
        };
        assert_eq!(err.code(), 404);
    }

    #[test]
    fn io_errors_prefer_the_os_number() {
        let err = Error::Io(std::io::Error::from_raw_os_error(13));
        assert_eq!(err.code(), 13);
        let err = Error::Io(std::io::Error::other("disk gone"));
        assert_eq!(err.code(), code::TRANSPORT_ERROR);
    }

    #[test]
    fn result_code_is_zero_on_success() {
        let ok: Result<(), Error> = Ok(());
        assert_eq!(result_code(&ok), code::SUCCESS);
        let err: Result<(), Error> = Err(Error::NoRuntime);
        assert_eq!(result_code(&err), code::REQUEST_ERROR);
    }
}

// HTTP client construction for Grand Challenge connections.
//
// Session logins keep their cookies in the client; token connections carry
// no cookie store at all, so nothing but the header identifies them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Certificate;

use crate::auth::AuthScheme;
use crate::error::Error;

const USER_AGENT: &str = concat!("gcworklist/", env!("CARGO_PKG_VERSION"));

/// How the server's certificate chain is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    #[default]
    System,
    /// Trust the PEM certificate at this path in addition to the system store.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed development deployments).
    DangerAcceptInvalid,
}

/// Settings a connection's HTTP client is built from.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub scheme: AuthScheme,
    pub tls: TlsMode,
    /// Per-request timeout, covering the whole exchange including the body.
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(scheme: AuthScheme) -> Self {
        Self {
            scheme,
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn build(&self) -> Result<reqwest::Client, Error> {
        let builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .cookie_store(self.scheme == AuthScheme::Session);

        let builder = match self.tls {
            TlsMode::System => builder,
            TlsMode::CustomCa(ref path) => builder.add_root_certificate(read_ca(path)?),
            TlsMode::DangerAcceptInvalid => builder.danger_accept_invalid_certs(true),
        };
        Ok(builder.build()?)
    }
}

fn read_ca(path: &Path) -> Result<Certificate, Error> {
    let pem = std::fs::read(path).map_err(|source| Error::CaCertificate {
        path: path.to_owned(),
        source,
    })?;
    Ok(Certificate::from_pem(&pem)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn both_schemes_build_a_client() {
        for scheme in [AuthScheme::Token, AuthScheme::Session] {
            assert!(ClientOptions::new(scheme).build().is_ok());
        }
    }

    #[test]
    fn unreadable_ca_names_its_path() {
        let options = ClientOptions::new(AuthScheme::Token)
            .tls(TlsMode::CustomCa(PathBuf::from("/nonexistent/gc-ca.pem")));
        let err = options.build().unwrap_err();
        assert!(matches!(err, Error::CaCertificate { ref path, .. } if path.ends_with("gc-ca.pem")));
        assert_eq!(err.code(), crate::error::code::REQUEST_ERROR);
    }
}

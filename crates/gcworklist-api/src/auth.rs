use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};

/// Which authentication scheme a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization` header on every request, verified by a probe request.
    Token,
    /// Django session login. Declared for completeness; not implemented, so
    /// requests go out without credentials and no verification happens.
    Session,
}

impl AuthScheme {
    /// The credential keys this scheme reads.
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::Token => &[Credentials::TOKEN],
            Self::Session => &[Credentials::USERNAME, Credentials::PASSWORD],
        }
    }
}

/// Outcome of the last credential verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
    InvalidCredentials,
}

/// Key → secret mapping handed to an authenticated connection.
///
/// Recognized shapes are `{token}` and `{username, password}`; other keys are
/// carried along untouched.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    entries: BTreeMap<String, SecretString>,
}

impl Credentials {
    pub const TOKEN: &'static str = "token";
    pub const USERNAME: &'static str = "username";
    pub const PASSWORD: &'static str = "password";

    pub fn token(token: impl Into<String>) -> Self {
        let mut creds = Self::default();
        creds.insert(Self::TOKEN, token);
        creds
    }

    pub fn session(username: impl Into<String>, password: impl Into<String>) -> Self {
        let mut creds = Self::default();
        creds.insert(Self::USERNAME, username);
        creds.insert(Self::PASSWORD, password);
        creds
    }

    pub fn insert(&mut self, key: impl Into<String>, secret: impl Into<String>) {
        self.entries
            .insert(key.into(), SecretString::from(secret.into()));
    }

    pub fn insert_secret(&mut self, key: impl Into<String>, secret: SecretString) {
        self.entries.insert(key.into(), secret);
    }

    pub fn get(&self, key: &str) -> Option<&SecretString> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The `Authorization` header value for the stored token.
    ///
    /// A bare token gets the `Bearer` prefix; a value that already names its
    /// scheme (`"Token abc"`, `"Bearer abc"`) is sent verbatim.
    pub fn authorization_value(&self) -> Option<String> {
        let token = self.get(Self::TOKEN)?.expose_secret().trim();
        if token.contains(char::is_whitespace) {
            Some(token.to_owned())
        } else {
            Some(format!("Bearer {token}"))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn bare_tokens_become_bearer_headers() {
        let creds = Credentials::token("abc123");
        assert_eq!(creds.authorization_value().unwrap(), "Bearer abc123");
    }

    #[test]
    fn prefixed_tokens_are_sent_verbatim() {
        let creds = Credentials::token("Token abc123");
        assert_eq!(creds.authorization_value().unwrap(), "Token abc123");
    }

    #[test]
    fn session_credentials_have_no_header() {
        let creds = Credentials::session("reader", "hunter2");
        assert!(creds.authorization_value().is_none());
        assert_eq!(creds.keys().collect::<Vec<_>>(), ["password", "username"]);
    }

    #[test]
    fn schemes_parse_from_config_strings() {
        assert_eq!("token".parse::<AuthScheme>().unwrap(), AuthScheme::Token);
        assert_eq!("session".parse::<AuthScheme>().unwrap(), AuthScheme::Session);
        assert!("oauth".parse::<AuthScheme>().is_err());
        assert_eq!(AuthState::InvalidCredentials.to_string(), "INVALID_CREDENTIALS");
    }
}

// Authenticated connection
//
// Wraps a `Connection` with a credential store and an authentication state
// machine. Credentials and task registration share one lock so a credential
// swap can never interleave with a submission made under the old credentials.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::{debug, info, warn};

use crate::auth::{AuthScheme, AuthState, Credentials};
use crate::connection::Connection;
use crate::error::Error;
use crate::normalize::PageSource;
use crate::request::{Request, Response, TaskId};

/// Path probed to verify a token. Any authenticated GET that cannot mutate
/// state works; the API root is always present.
pub const DEFAULT_PROBE_PATH: &str = "api/v1/";

struct AuthInner {
    credentials: Credentials,
    state: AuthState,
}

pub struct AuthenticatedConnection {
    connection: Connection,
    scheme: AuthScheme,
    probe_path: String,
    auth: Mutex<AuthInner>,
    /// Serializes credential swaps so verification results land in order.
    setup: tokio::sync::Mutex<()>,
}

impl AuthenticatedConnection {
    /// Wrap `connection` and verify `credentials` against the default probe path.
    pub async fn connect(
        connection: Connection,
        scheme: AuthScheme,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        Self::connect_with_probe(connection, scheme, credentials, DEFAULT_PROBE_PATH).await
    }

    /// Like [`connect`](Self::connect) with a custom verification path.
    pub async fn connect_with_probe(
        connection: Connection,
        scheme: AuthScheme,
        credentials: Credentials,
        probe_path: impl Into<String>,
    ) -> Result<Self, Error> {
        check_credentials(scheme, &credentials)?;
        let this = Self {
            connection,
            scheme,
            probe_path: probe_path.into(),
            auth: Mutex::new(AuthInner {
                credentials,
                state: AuthState::Unauthenticated,
            }),
            setup: tokio::sync::Mutex::new(()),
        };
        {
            let _setup = this.setup.lock().await;
            this.verify().await;
        }
        Ok(this)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// Result of the most recent verification. No side effects.
    pub fn authentication_status(&self) -> AuthState {
        self.lock_auth().state
    }

    /// Replace the credential store and re-verify.
    ///
    /// Every outstanding task is cancelled before the swap, since it was
    /// built under the old credentials. Returns once the new state is settled.
    pub async fn set_credentials(&self, credentials: Credentials) -> Result<AuthState, Error> {
        check_credentials(self.scheme, &credentials)?;
        let _setup = self.setup.lock().await;
        {
            let mut auth = self.lock_auth();
            let cancelled = self.connection.cancel_all();
            auth.credentials = credentials;
            auth.state = AuthState::Unauthenticated;
            debug!(cancelled, "credential store replaced");
        }
        Ok(self.verify().await)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Queue an authenticated request. See [`Connection::submit`].
    pub fn submit<C>(&self, mut request: Request, callback: C) -> TaskId
    where
        C: FnOnce(Result<Response, Error>) + Send + 'static,
    {
        let auth = self.lock_auth();
        match self.authorize(&auth, &mut request) {
            Ok(()) => self.connection.submit(request, callback),
            Err(e) => self
                .connection
                .submit_job(async move { Err::<Response, Error>(e) }, callback),
        }
    }

    /// Queue a multi-request job. See [`Connection::submit_job`].
    ///
    /// The job should issue its requests through [`send`](Self::send) so they
    /// pick up the current credentials.
    pub fn submit_job<T, Fut, C>(&self, job: Fut, callback: C) -> TaskId
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let _auth = self.lock_auth();
        self.connection.submit_job(job, callback)
    }

    /// Send an authenticated request and wait for the response.
    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        let request = self.authorized(request)?;
        self.connection.send(request).await
    }

    /// Send an authenticated request and return the unread response.
    pub async fn send_raw(&self, request: Request) -> Result<reqwest::Response, Error> {
        let request = self.authorized(request)?;
        self.connection.send_raw(request).await
    }

    pub fn cancel(&self, id: TaskId) -> bool {
        self.connection.cancel(id)
    }

    pub fn cancel_all(&self) -> usize {
        let _auth = self.lock_auth();
        self.connection.cancel_all()
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Probe the API with the current credentials and record the outcome.
    ///
    /// Only a 2xx answer counts as authenticated. A non-2xx answer means the
    /// server looked at the credentials and refused them; no answer at all
    /// is inconclusive and leaves the connection unauthenticated.
    async fn verify(&self) -> AuthState {
        let state = match self.scheme {
            AuthScheme::Token => match self.send(Request::get(self.probe_path.clone())).await {
                Ok(resp) if resp.is_success() => AuthState::Authenticated,
                Ok(resp) => {
                    warn!(status = %resp.status, "token rejected by verification probe");
                    AuthState::InvalidCredentials
                }
                Err(e) => {
                    warn!(error = %e, "verification probe failed");
                    AuthState::Unauthenticated
                }
            },
            AuthScheme::Session => {
                warn!("session authentication is not implemented; requests are sent unauthenticated");
                AuthState::Unauthenticated
            }
        };

        self.lock_auth().state = state;
        info!(%state, scheme = %self.scheme, "authentication settled");
        state
    }

    fn authorized(&self, mut request: Request) -> Result<Request, Error> {
        let auth = self.lock_auth();
        self.authorize(&auth, &mut request)?;
        Ok(request)
    }

    /// Attach the credentials to `request` if it targets our own origin.
    ///
    /// Absolute URLs elsewhere (pagination links, media files on object
    /// storage) go out bare.
    fn authorize(&self, auth: &AuthInner, request: &mut Request) -> Result<(), Error> {
        match self.scheme {
            AuthScheme::Token if !self.is_own_origin(request) => {
                debug!(url = %request.target, "foreign origin; sending without credentials");
            }
            AuthScheme::Token => {
                let value = auth
                    .credentials
                    .authorization_value()
                    .ok_or(Error::MissingCredential {
                        key: Credentials::TOKEN,
                    })?;
                let mut header =
                    HeaderValue::from_str(&value).map_err(|e| Error::Authentication {
                        message: format!("invalid token header value: {e}"),
                    })?;
                header.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, header);
            }
            AuthScheme::Session => {}
        }
        Ok(())
    }

    fn is_own_origin(&self, request: &Request) -> bool {
        let base = self.connection.base_url();
        request
            .resolve(base)
            .is_ok_and(|url| url.origin() == base.origin())
    }

    fn lock_auth(&self) -> MutexGuard<'_, AuthInner> {
        self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PageSource for AuthenticatedConnection {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<Response, Error>> + Send {
        self.send(Request::get(url))
    }
}

fn check_credentials(scheme: AuthScheme, credentials: &Credentials) -> Result<(), Error> {
    if scheme == AuthScheme::Token && !credentials.contains(Credentials::TOKEN) {
        return Err(Error::MissingCredential {
            key: Credentials::TOKEN,
        });
    }
    Ok(())
}

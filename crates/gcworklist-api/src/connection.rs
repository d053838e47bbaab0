// HTTP connection with a cancellable request queue
//
// Every queued request becomes a tokio task tracked in a per-connection
// registry. A task's outcome belongs to whoever removes its registry entry
// first: the task itself (callback runs) or `cancel` (callback dropped).

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::normalize::PageSource;
use crate::request::{Request, Response, TaskId};
use crate::client::ClientOptions;

type Registry = Mutex<HashMap<TaskId, CancellationToken>>;

/// Raw connection to a REST API, without any authentication.
///
/// Requests are resolved against `base_url`, executed concurrently on the
/// tokio runtime that was current when the connection was created, and
/// delivered to their callbacks on that runtime's worker threads.
pub struct Connection {
    http: reqwest::Client,
    base_url: Url,
    runtime: Handle,
    next_id: AtomicU64,
    tasks: Arc<Registry>,
}

impl Connection {
    /// Build a connection from a base URL and client options.
    ///
    /// Must be called from within a tokio runtime; its handle is kept so
    /// requests can later be submitted from any thread.
    pub fn new(base_url: &str, options: &ClientOptions) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Self::with_client(options.build()?, base_url)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Result<Self, Error> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
            runtime,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Queue ────────────────────────────────────────────────────────

    /// Queue a request and return immediately.
    ///
    /// `callback` runs exactly once with the response or the transport
    /// error, unless the task is cancelled first.
    pub fn submit<C>(&self, request: Request, callback: C) -> TaskId
    where
        C: FnOnce(Result<Response, Error>) + Send + 'static,
    {
        let prepared = self.prepare(&request);
        self.submit_job(
            async move {
                match prepared {
                    Ok(builder) => execute(builder).await,
                    Err(e) => Err(e),
                }
            },
            callback,
        )
    }

    /// Queue an arbitrary unit of async work under a task id.
    ///
    /// Used for multi-request operations (pagination, downloads) that must
    /// be cancellable as a whole. The same delivery guarantees as
    /// [`submit`](Self::submit) apply.
    pub fn submit_job<T, Fut, C>(&self, job: Fut, callback: C) -> TaskId
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        lock(&self.tasks).insert(id, token.clone());

        let tasks = Arc::clone(&self.tasks);
        self.runtime.spawn(async move {
            let output = tokio::select! {
                biased;
                () = token.cancelled() => {
                    trace!(task = %id, "task aborted");
                    return;
                }
                output = job => output,
            };

            let claimed = lock(&tasks).remove(&id).is_some();
            if claimed {
                callback(output);
            } else {
                trace!(task = %id, "result discarded after cancellation");
            }
        });

        trace!(task = %id, "task queued");
        id
    }

    /// Send a request and wait for the response.
    ///
    /// Not tracked in the queue: the caller owns the future, so dropping it
    /// is the way to abandon the request.
    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        let builder = self.prepare(&request)?;
        execute(builder).await
    }

    /// Send a request and return the unread response (for streaming bodies).
    pub async fn send_raw(&self, request: Request) -> Result<reqwest::Response, Error> {
        let builder = self.prepare(&request)?;
        Ok(builder.send().await?)
    }

    // ── Cancellation ─────────────────────────────────────────────────

    /// Cancel a queued task, best-effort.
    ///
    /// Returns `true` if the task was still registered; its callback will then
    /// never start. Returns `false` if the task had already claimed its result,
    /// in which case its callback runs (or has run) regardless, or if the id
    /// is unknown.
    pub fn cancel(&self, id: TaskId) -> bool {
        let Some(token) = lock(&self.tasks).remove(&id) else {
            return false;
        };
        token.cancel();
        debug!(task = %id, "task cancelled");
        true
    }

    /// Cancel every outstanding task. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(TaskId, CancellationToken)> = lock(&self.tasks).drain().collect();
        for (_, token) in &drained {
            token.cancel();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "cancelled all outstanding tasks");
        }
        drained.len()
    }

    /// Number of tasks that have neither delivered nor been cancelled.
    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }

    // ── Request building ─────────────────────────────────────────────

    fn prepare(&self, request: &Request) -> Result<reqwest::RequestBuilder, Error> {
        let url = request.resolve(&self.base_url)?;
        debug!("{} {url}", request.method);

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        Ok(builder)
    }
}

impl PageSource for Connection {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<Response, Error>> + Send {
        self.send(Request::get(url))
    }
}

async fn execute(builder: reqwest::RequestBuilder) -> Result<Response, Error> {
    let resp = builder.send().await?;
    Response::receive(resp).await
}

fn lock(tasks: &Registry) -> MutexGuard<'_, HashMap<TaskId, CancellationToken>> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Make sure relative paths join underneath the base path instead of replacing
/// its last segment.
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

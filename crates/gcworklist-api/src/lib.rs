// gcworklist-api: Async client plumbing for Grand Challenge style REST APIs
//
// Cancellable request queue, token authentication, and the JSON → table
// normalizer that turns paginated listings into `DataTable`s.

pub mod auth;
pub mod authenticated;
pub mod client;
pub mod connection;
pub mod download;
pub mod error;
pub mod normalize;
pub mod request;
pub mod table;

pub use auth::{AuthScheme, AuthState, Credentials};
pub use authenticated::AuthenticatedConnection;
pub use client::{ClientOptions, TlsMode};
pub use connection::Connection;
pub use error::{Error, code, result_code};
pub use normalize::PageSource;
pub use request::{Request, Response, TaskId};
pub use table::{Column, DataTable, FieldSelection, TableError};

pub use reqwest::{Method, StatusCode};

//! Worklist data layer between `gcworklist-api` and its consumers.
//!
//! - **[`WorklistSource`]**: the callback-driven contract a worklist browser
//!   programs against. Every operation returns a [`TaskId`] immediately and
//!   reports later, possibly from a worker thread.
//!
//! - **[`GrandChallengeSource`]**: the Grand Challenge backend. Worklist CRUD,
//!   patient/study/image listings, image file download, and schemas learned
//!   at runtime because the API publishes none.
//!
//! - **[`SourceConfig`]**: runtime connection settings. This crate never
//!   reads configuration files; `gcworklist-config` builds these.

pub mod config;
pub mod error;
pub mod grand_challenge;
pub mod source;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{GrandChallengeUrls, SourceConfig, TlsVerification};
pub use error::CoreError;
pub use grand_challenge::GrandChallengeSource;
pub use source::{
    FileReceiver, ProgressObserver, ResourceKind, SourceType, StatusObserver, TableReceiver,
    WorklistSource,
};

// Types that appear in the source contract.
pub use gcworklist_api::{
    AuthScheme, AuthState, Credentials, DataTable, FieldSelection, TaskId, code,
};

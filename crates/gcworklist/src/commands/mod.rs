//! Command dispatch: bridges CLI args -> source operations -> output formatting.

pub mod auth;
pub mod config_cmd;
pub mod images;
pub mod records;
pub mod schema;
pub mod util;
pub mod worklists;

use gcworklist_core::{AuthState, GrandChallengeSource, SourceConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Connect to the server described by `config`.
///
/// Rejected credentials fail fast; an unverified connection (unreachable
/// probe, session auth) is allowed through and fails on first use.
pub async fn connect(
    config: SourceConfig,
    profile: &str,
) -> Result<GrandChallengeSource, CliError> {
    let base_url = config.urls.base_url.clone();
    let source = GrandChallengeSource::connect(config).await?;
    match source.authentication_status() {
        AuthState::InvalidCredentials => Err(CliError::AuthFailed {
            profile: profile.into(),
        }),
        state => {
            tracing::debug!(%base_url, %state, "connected");
            Ok(source)
        }
    }
}

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    source: &GrandChallengeSource,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Worklists(args) => worklists::handle(source, args, global).await,
        Command::Patients(args) => records::handle_patients(source, args, global).await,
        Command::Studies(args) => records::handle_studies(source, args, global).await,
        Command::Images(args) => images::handle(source, args, global).await,
        Command::Schema(args) => schema::handle(source, &args, global),
        // Handled before a connection is made.
        Command::Auth(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

//! Credential checks.

use gcworklist_core::{AuthScheme, AuthState, GrandChallengeSource};
use serde_json::json;

use crate::cli::{AuthArgs, AuthCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: AuthArgs, global: &GlobalOpts, profile: &str) -> Result<(), CliError> {
    match args.command {
        AuthCommand::Status => {
            let config = crate::config::build_source_config(global)?;
            let base_url = config.urls.base_url.clone();
            let scheme = config.scheme;
            let source = GrandChallengeSource::connect(config).await?;
            let state = source.authentication_status();

            let record = status_record(&base_url, scheme, state);
            let out = match global.output {
                OutputFormat::Json => output::render_json(&record)?,
                OutputFormat::Yaml => output::render_yaml(&record)?,
                OutputFormat::Plain => state.to_string(),
                OutputFormat::Table => {
                    format!("Server:  {base_url}\nScheme:  {scheme}\nState:   {state}")
                }
            };
            output::print_output(&out, global.quiet);

            match state {
                AuthState::InvalidCredentials => Err(CliError::AuthFailed {
                    profile: profile.into(),
                }),
                AuthState::Authenticated | AuthState::Unauthenticated => Ok(()),
            }
        }
    }
}

fn status_record(base_url: &str, scheme: AuthScheme, state: AuthState) -> serde_json::Value {
    json!({
        "base_url": base_url,
        "scheme": scheme.to_string(),
        "state": state.to_string(),
    })
}

//! CLI configuration: thin wrapper around `gcworklist_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--base-url, --token, --insecure, --timeout, --download-dir).

use gcworklist_config::{Profile, ResourcePaths};
use gcworklist_core::{AuthScheme, Credentials, SourceConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use gcworklist_config::{Config, config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `SourceConfig` from the config file, the active profile and
/// CLI overrides.
///
/// Without a matching profile the flags alone must name a base URL.
pub fn build_source_config(global: &GlobalOpts) -> Result<SourceConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() && !cfg.profiles.is_empty() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }
        None => match global.base_url {
            Some(ref url) => new_profile(url.clone()),
            None => {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
        },
    };

    apply_overrides(&mut profile, global);
    let mut source =
        gcworklist_config::profile_to_source_config(&profile, &profile_name, &cfg.defaults)?;

    // A --token flag always wins over keyring and env lookups.
    if let Some(ref token) = global.token {
        source.scheme = AuthScheme::Token;
        source.credentials = Credentials::token(token.clone());
    }
    if global.insecure {
        source.tls = TlsVerification::DangerAcceptInvalid;
    }
    Ok(source)
}

/// A token profile for `base_url` with every other setting left to defaults.
pub fn new_profile(base_url: String) -> Profile {
    Profile {
        base_url,
        auth: AuthScheme::Token.to_string(),
        token: None,
        token_env: None,
        username: None,
        password: None,
        paths: ResourcePaths::default(),
        probe_path: None,
        ca_cert: None,
        insecure: None,
        timeout: None,
        download_dir: None,
    }
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref url) = global.base_url {
        profile.base_url.clone_from(url);
    }
    if let Some(ref token) = global.token {
        profile.auth = AuthScheme::Token.to_string();
        profile.token = Some(token.clone());
        profile.token_env = None;
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if let Some(ref dir) = global.download_dir {
        profile.download_dir = Some(dir.clone());
    }
}

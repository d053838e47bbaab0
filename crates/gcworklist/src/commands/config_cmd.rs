//! Config subcommand handlers.

use std::fmt::Write;
use std::path::Path;

use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    if let Some(ref dir) = cfg.defaults.download_dir {
        let _ = writeln!(out, "download_dir = \"{}\"", dir.display());
    }

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "base_url = \"{}\"", p.base_url);
        let _ = writeln!(out, "auth = \"{}\"", p.auth);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        for (key, path) in [
            ("worklists", &p.paths.worklists),
            ("patients", &p.paths.patients),
            ("studies", &p.paths.studies),
            ("images", &p.paths.images),
        ] {
            if let Some(path) = path {
                let _ = writeln!(out, "paths.{key} = \"{path}\"");
            }
        }
        if let Some(ref probe) = p.probe_path {
            let _ = writeln!(out, "probe_path = \"{probe}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ref dir) = p.download_dir {
            let _ = writeln!(out, "download_dir = \"{}\"", dir.display());
        }
    }

    out
}

/// Read the config file as written, without env overlays.
fn read_file_config(path: &Path) -> Result<Config, CliError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| CliError::Config {
        message: format!("{}: {e}", path.display()),
    })
}

fn init(global: &GlobalOpts, token_env: Option<&String>, force: bool) -> Result<(), CliError> {
    let base_url = global
        .base_url
        .clone()
        .ok_or_else(|| CliError::Validation {
            field: "base-url".into(),
            reason: "config init needs --base-url".into(),
        })?;
    let name = global.profile.clone().unwrap_or_else(|| "default".into());

    let path = config::config_path();
    let mut cfg = read_file_config(&path)?;
    if cfg.profiles.contains_key(&name) && !force {
        return Err(CliError::Validation {
            field: "profile".into(),
            reason: format!("profile '{name}' already exists; pass --force to replace it"),
        });
    }

    let mut profile = config::new_profile(base_url);
    profile.token_env = token_env.cloned();
    profile.timeout = global.timeout;
    profile.download_dir.clone_from(&global.download_dir);
    if global.insecure {
        profile.insecure = Some(true);
    }
    gcworklist_config::resolve_urls(&profile)?;

    if let Some(ref token) = global.token {
        gcworklist_config::store_token(&name, &SecretString::from(token.clone()))?;
        util::note(
            &format!("Token stored in the system keyring as '{name}/token'"),
            global.quiet,
        );
    }

    if cfg.profiles.is_empty() {
        cfg.default_profile = Some(name.clone());
    }
    cfg.profiles.insert(name.clone(), profile);
    gcworklist_config::save_config_to(&cfg, &path)?;
    util::note(
        &format!("Wrote profile '{name}' to {}", path.display()),
        global.quiet,
    );
    Ok(())
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init {
            ref token_env,
            force,
        } => init(global, token_env.as_ref(), force),

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let path = config::config_path();
            if !path.exists() {
                return Err(CliError::NoConfig {
                    path: path.display().to_string(),
                });
            }
            let cfg = gcworklist_config::load_config_from(&path)?;
            output::print_output(format_config_redacted(&cfg).trim_end(), global.quiet);
            Ok(())
        }
    }
}

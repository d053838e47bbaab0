//! Clap derive structures for the `gcworklist` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gcworklist_core::{FieldSelection, ResourceKind};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// gcworklist -- browse and curate Grand Challenge reading worklists
#[derive(Debug, Parser)]
#[command(
    name = "gcworklist",
    version,
    about = "Manage Grand Challenge reading worklists from the command line",
    long_about = "Lists worklists, patients, studies and images on a Grand Challenge\n\
        deployment, edits worklists, and downloads image files.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "GCWORKLIST_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server base URL (overrides profile)
    #[arg(long, short = 'u', env = "GCWORKLIST_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// API token (overrides profile)
    #[arg(long, env = "GCWORKLIST_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "GCWORKLIST_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "GCWORKLIST_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "GCWORKLIST_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Directory for downloaded image files (overrides profile)
    #[arg(long, env = "GCWORKLIST_DOWNLOAD_DIR", global = true)]
    pub download_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
    /// Plain text, first column one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and edit worklists
    #[command(alias = "wl")]
    Worklists(WorklistsArgs),

    /// List patients
    #[command(alias = "pt")]
    Patients(PatientsArgs),

    /// List studies
    #[command(alias = "st")]
    Studies(StudiesArgs),

    /// List and download images
    #[command(alias = "img")]
    Images(ImagesArgs),

    /// Show the columns learned for a resource
    Schema(SchemaArgs),

    /// Check credentials against the server
    Auth(AuthArgs),

    /// Create or inspect the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ColumnArgs {
    /// Include hidden columns
    #[arg(long, short = 'a')]
    pub all: bool,
}

impl ColumnArgs {
    pub fn selection(&self) -> FieldSelection {
        if self.all {
            FieldSelection::All
        } else {
            FieldSelection::Visible
        }
    }
}

// ── Worklists ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WorklistsArgs {
    #[command(subcommand)]
    pub command: WorklistsCommand,
}

#[derive(Debug, Subcommand)]
pub enum WorklistsCommand {
    /// List worklists
    #[command(alias = "ls")]
    List(ColumnArgs),

    /// Create an empty worklist
    Add {
        /// Worklist title
        title: String,
    },

    /// Replace a worklist's title and image set
    Update {
        /// Worklist ID
        id: String,

        /// New title
        #[arg(long, short = 't')]
        title: String,

        /// Image ID to include (repeatable; omit to empty the worklist)
        #[arg(long = "image", short = 'i')]
        images: Vec<String>,
    },

    /// Delete a worklist
    #[command(alias = "rm")]
    Delete {
        /// Worklist ID
        id: String,
    },
}

// ── Patients / Studies ───────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PatientsArgs {
    #[command(subcommand)]
    pub command: PatientsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PatientsCommand {
    /// List patients, optionally restricted to one worklist
    #[command(alias = "ls")]
    List {
        /// Worklist ID filter
        #[arg(long, short = 'w')]
        worklist: Option<String>,

        #[command(flatten)]
        columns: ColumnArgs,
    },
}

#[derive(Debug, Args)]
pub struct StudiesArgs {
    #[command(subcommand)]
    pub command: StudiesCommand,
}

#[derive(Debug, Subcommand)]
pub enum StudiesCommand {
    /// List the studies of a patient
    #[command(alias = "ls")]
    List {
        /// Patient ID
        #[arg(long, short = 'P')]
        patient: String,

        #[command(flatten)]
        columns: ColumnArgs,
    },
}

// ── Images ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ImagesArgs {
    #[command(subcommand)]
    pub command: ImagesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ImagesCommand {
    /// List images, optionally filtered by worklist and study
    #[command(alias = "ls")]
    List {
        /// Worklist ID filter
        #[arg(long, short = 'w')]
        worklist: Option<String>,

        /// Study ID filter
        #[arg(long, short = 's')]
        study: Option<String>,

        #[command(flatten)]
        columns: ColumnArgs,
    },

    /// Download an image's first file
    #[command(alias = "dl")]
    Download {
        /// Image ID
        id: String,
    },
}

// ── Schema ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Resource to describe (all resources when omitted)
    pub resource: Option<ResourceArg>,

    #[command(flatten)]
    pub columns: ColumnArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResourceArg {
    #[value(alias = "worklist")]
    Worklists,
    #[value(alias = "patient")]
    Patients,
    #[value(alias = "study")]
    Studies,
    #[value(alias = "image")]
    Images,
}

impl From<ResourceArg> for ResourceKind {
    fn from(arg: ResourceArg) -> Self {
        match arg {
            ResourceArg::Worklists => Self::Worklist,
            ResourceArg::Patients => Self::Patient,
            ResourceArg::Studies => Self::Study,
            ResourceArg::Images => Self::Image,
        }
    }
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Probe the server and report the authentication state
    Status,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a profile for --base-url into the config file
    ///
    /// The profile name comes from --profile (default: "default"). A --token
    /// is stored in the system keyring, never in the file.
    Init {
        /// Environment variable to read the token from at run time
        #[arg(long)]
        token_env: Option<String>,

        /// Replace an existing profile of the same name
        #[arg(long)]
        force: bool,
    },

    /// Print the config file location
    Path,

    /// Display the configuration with secrets masked
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }
}

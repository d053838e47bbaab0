mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let profile = config::active_profile_name(&cli.global, &config::load_config_or_default());

    match cli.command {
        // Config commands don't need a server connection
        Command::Config(ref args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(ref args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "gcworklist", &mut std::io::stdout());
            Ok(())
        }

        Command::Auth(args) => commands::auth::handle(args, &cli.global, &profile).await,

        cmd => {
            let source_config = config::build_source_config(&cli.global)?;
            let source = commands::connect(source_config, &profile).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &source, &cli.global).await
        }
    }
}

//! Patient and study listings.

use gcworklist_core::{GrandChallengeSource, WorklistSource};

use crate::cli::{GlobalOpts, PatientsArgs, PatientsCommand, StudiesArgs, StudiesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle_patients(
    source: &GrandChallengeSource,
    args: PatientsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PatientsCommand::List { worklist, columns } => {
            let worklist = worklist.unwrap_or_default();
            let table = util::fetch_table(|rx| source.list_patients(&worklist, rx)).await?;
            let out = output::render_table(global.output, &table, columns.selection())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

pub async fn handle_studies(
    source: &GrandChallengeSource,
    args: StudiesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        StudiesCommand::List { patient, columns } => {
            let table = util::fetch_table(|rx| source.list_studies(&patient, rx)).await?;
            let out = output::render_table(global.output, &table, columns.selection())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

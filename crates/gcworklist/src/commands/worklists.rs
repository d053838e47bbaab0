//! Worklist command handlers.

use std::collections::BTreeSet;

use gcworklist_core::{GrandChallengeSource, WorklistSource};

use crate::cli::{GlobalOpts, WorklistsArgs, WorklistsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    source: &GrandChallengeSource,
    args: WorklistsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        WorklistsCommand::List(columns) => {
            let table = util::fetch_table(|rx| source.list_worklists(rx)).await?;
            let out = output::render_table(global.output, &table, columns.selection())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        WorklistsCommand::Add { title } => {
            util::await_status(&format!("create worklist '{title}'"), |observer| {
                source.add_worklist(&title, observer)
            })
            .await?;
            util::note("Worklist created", global.quiet);
            Ok(())
        }

        WorklistsCommand::Update { id, title, images } => {
            let images: BTreeSet<String> = images.into_iter().collect();
            util::await_status(&format!("update worklist '{id}'"), |observer| {
                source.update_worklist(&id, &title, &images, observer)
            })
            .await?;
            util::note(
                &format!("Worklist updated ({} images)", images.len()),
                global.quiet,
            );
            Ok(())
        }

        WorklistsCommand::Delete { id } => {
            if !util::confirm(&format!("Delete worklist '{id}'?"), global.yes)? {
                return Ok(());
            }
            util::await_status(&format!("delete worklist '{id}'"), |observer| {
                source.delete_worklist(&id, observer)
            })
            .await?;
            util::note("Worklist deleted", global.quiet);
            Ok(())
        }
    }
}

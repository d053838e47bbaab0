//! Image listing and download handlers.

use std::path::PathBuf;
use std::sync::Arc;

use gcworklist_core::{GrandChallengeSource, WorklistSource};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::oneshot;

use crate::cli::{GlobalOpts, ImagesArgs, ImagesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    source: &GrandChallengeSource,
    args: ImagesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ImagesCommand::List {
            worklist,
            study,
            columns,
        } => {
            let worklist = worklist.unwrap_or_default();
            let study = study.unwrap_or_default();
            let table = util::fetch_table(|rx| source.list_images(&worklist, &study, rx)).await?;
            let out = output::render_table(global.output, &table, columns.selection())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ImagesCommand::Download { id } => download(source, &id, global.quiet).await,
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

async fn download(source: &GrandChallengeSource, id: &str, quiet: bool) -> Result<(), CliError> {
    let bar = progress_bar(quiet);
    bar.set_message(format!("image {id}"));

    let (tx, rx) = oneshot::channel();
    let observer_bar = bar.clone();
    let task = source.image_file(
        id,
        Box::new(move |path: Option<PathBuf>| {
            let _ = tx.send(path);
        }),
        Arc::new(move |pct: u8| observer_bar.set_position(u64::from(pct))),
    );
    tracing::debug!(%task, image = id, "download queued");

    let path = rx.await.ok().flatten();
    bar.finish_and_clear();

    let path = path.ok_or_else(|| CliError::DownloadFailed { image: id.into() })?;
    output::print_output(&path.display().to_string(), quiet);
    Ok(())
}

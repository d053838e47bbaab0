//! Shared helpers for command handlers.
//!
//! The source reports through one-shot callbacks; these bridge them back
//! into `async` results for the CLI.

use gcworklist_core::{DataTable, StatusObserver, TableReceiver, TaskId, code};
use tokio::sync::oneshot;

use crate::error::CliError;

fn dropped() -> CliError {
    CliError::ApiError {
        code: code::REQUEST_ERROR,
        message: "the request was cancelled before it reported".into(),
    }
}

/// Run a listing and wait for its table.
///
/// A non-zero code becomes [`CliError::RequestFailed`].
pub async fn fetch_table(
    start: impl FnOnce(TableReceiver) -> TaskId,
) -> Result<DataTable, CliError> {
    let (tx, rx) = oneshot::channel();
    let task = start(Box::new(move |table: DataTable, code: i32| {
        let _ = tx.send((table, code));
    }));
    tracing::debug!(%task, "listing queued");

    let (table, code) = rx.await.map_err(|_| dropped())?;
    if code == code::SUCCESS {
        Ok(table)
    } else {
        Err(CliError::RequestFailed { code })
    }
}

/// Run a mutation and wait for its verdict.
pub async fn await_status(
    action: &str,
    start: impl FnOnce(StatusObserver) -> TaskId,
) -> Result<(), CliError> {
    let (tx, rx) = oneshot::channel();
    let task = start(Box::new(move |accepted: bool| {
        let _ = tx.send(accepted);
    }));
    tracing::debug!(%task, action, "mutation queued");

    if rx.await.map_err(|_| dropped())? {
        Ok(())
    } else {
        Err(CliError::Rejected {
            action: action.into(),
        })
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Print a status line to stderr unless `--quiet` was passed.
pub fn note(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn failed_listings_carry_their_code() {
        let err = fetch_table(|receiver| {
            receiver(DataTable::new(), 500);
            TaskId::NONE
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::RequestFailed { code: 500 }));
    }

    #[tokio::test]
    async fn dropped_callbacks_are_errors() {
        let err = fetch_table(|receiver| {
            drop(receiver);
            TaskId::NONE
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::ApiError { .. }));
    }

    #[tokio::test]
    async fn refused_mutations_are_rejections() {
        let err = await_status("delete worklist w1", |observer| {
            observer(false);
            TaskId::NONE
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::Rejected { .. }));

        await_status("add worklist", |observer| {
            observer(true);
            TaskId::NONE
        })
        .await
        .unwrap();
    }

    #[test]
    fn yes_flag_skips_prompt() {
        assert!(confirm("Delete?", true).unwrap());
    }
}

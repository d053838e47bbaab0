//! Output formatting: table, JSON, YAML, plain.
//!
//! Every listing arrives as a `DataTable`, so rendering works on its
//! columns and rows directly rather than on typed records.

use std::io::{self, Write};

use gcworklist_core::{DataTable, FieldSelection};
use tabled::{builder::Builder, settings::Style};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render a table in the chosen format, restricted to `selection`.
///
/// - `table`: a rounded `tabled` grid with a header row
/// - `json` / `yaml`: an array of `{column: value}` records
/// - `plain`: the first selected column, one value per line
pub fn render_table(
    format: OutputFormat,
    table: &DataTable,
    selection: FieldSelection,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(render_grid(table, selection)),
        OutputFormat::Json => render_json(&table.to_records(selection)),
        OutputFormat::Yaml => render_yaml(&table.to_records(selection)),
        OutputFormat::Plain => Ok(render_plain(table, selection)),
    }
}

/// Render a list of names, e.g. a schema's columns.
pub fn render_names(format: OutputFormat, names: &[String]) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(names),
        OutputFormat::Yaml => render_yaml(names),
        OutputFormat::Table | OutputFormat::Plain => Ok(names.join("\n")),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn selected_indices(table: &DataTable, selection: FieldSelection) -> Vec<usize> {
    table
        .column_names(selection)
        .iter()
        .filter_map(|name| table.column_index(name))
        .collect()
}

fn render_grid(table: &DataTable, selection: FieldSelection) -> String {
    let picked = selected_indices(table, selection);
    if picked.is_empty() {
        return String::new();
    }

    let mut builder = Builder::default();
    builder.push_record(table.column_names(selection));
    for row in table.rows() {
        builder.push_record(
            picked
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default()),
        );
    }
    builder.build().with(Style::rounded()).to_string()
}

fn render_plain(table: &DataTable, selection: FieldSelection) -> String {
    let Some(&first) = selected_indices(table, selection).first() else {
        return String::new();
    };
    table
        .rows()
        .filter_map(|row| row.get(first).map(String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Render(e.to_string()))
}

pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn patients() -> DataTable {
        let mut table = DataTable::with_columns(["id", "name", "sex"]);
        table.show_only(&["name"]);
        table
            .insert(vec!["p1".into(), "Alice".into(), "F".into()])
            .unwrap();
        table
            .insert(vec!["p2".into(), "Bob".into(), "M".into()])
            .unwrap();
        table
    }

    #[test]
    fn grid_shows_only_visible_columns() {
        let out = render_table(OutputFormat::Table, &patients(), FieldSelection::Visible).unwrap();
        assert!(out.contains("Alice"));
        assert!(!out.contains("p1"));

        let out = render_table(OutputFormat::Table, &patients(), FieldSelection::All).unwrap();
        assert!(out.contains("p1") && out.contains("sex"));
    }

    #[test]
    fn plain_prints_first_selected_column() {
        let out = render_table(OutputFormat::Plain, &patients(), FieldSelection::All).unwrap();
        assert_eq!(out, "p1\np2");
    }

    #[test]
    fn json_emits_records() {
        let out = render_table(OutputFormat::Json, &patients(), FieldSelection::Visible).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, serde_json::json!([{"name": "Alice"}, {"name": "Bob"}]));
    }

    #[test]
    fn unknown_shape_renders_nothing() {
        let out = render_table(OutputFormat::Table, &DataTable::new(), FieldSelection::All).unwrap();
        assert!(out.is_empty());
    }
}

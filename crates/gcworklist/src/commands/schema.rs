//! Schema inspection.

use gcworklist_core::{GrandChallengeSource, ResourceKind, WorklistSource};
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

use crate::cli::{GlobalOpts, OutputFormat, SchemaArgs};
use crate::error::CliError;
use crate::output;

pub fn handle(
    source: &GrandChallengeSource,
    args: &SchemaArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let selection = args.columns.selection();

    let out = if let Some(resource) = args.resource {
        output::render_names(global.output, &source.headers(resource.into(), selection))?
    } else {
        let schemas: Map<String, Value> = ResourceKind::iter()
            .map(|kind| {
                let names = source.headers(kind, selection);
                (kind.to_string(), Value::from(names))
            })
            .collect();
        match global.output {
            OutputFormat::Json => output::render_json(&schemas)?,
            OutputFormat::Yaml => output::render_yaml(&schemas)?,
            OutputFormat::Table | OutputFormat::Plain => schemas
                .iter()
                .map(|(kind, names)| format!("{kind}: {}", join_names(names)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}

fn join_names(names: &Value) -> String {
    names
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

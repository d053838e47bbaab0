// JSON → DataTable normalization
//
// The API publishes no schema, so tables are shaped by the data itself:
// columns come from the first record's keys (in declaration order) unless
// the caller seeded the table with a known schema. List endpoints may wrap
// their records in a `{count, next, results}` page envelope, in which case
// every `next` link is followed, one page at a time, until it is null.

use std::future::Future;

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::Error;
use crate::request::Response;
use crate::table::{DataTable, TableError};

/// Name of the OPTIONS action block whose keys describe writable fields.
pub const SCHEMA_ACTION: &str = "POST";

/// Anything that can fetch the next page of a paginated listing.
pub trait PageSource: Sync {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<Response, Error>> + Send;
}

/// Convert a list or detail response into rows of `table`, following pagination.
///
/// If `table` has no columns they are inferred from the first record before
/// any row is inserted. Cells are matched to columns by key; keys missing
/// from a record become empty cells.
pub async fn response_to_table<P: PageSource>(
    pages: &P,
    response: &Response,
    table: &mut DataTable,
) -> Result<(), Error> {
    parse_json_response(pages, response, table, insert_records).await
}

/// Like [`response_to_table`], but every row holds exactly `fields`, in order.
///
/// An empty table takes `fields` as its columns. A record lacking one of the
/// fields is a structural error.
pub async fn response_to_filtered_table<P: PageSource>(
    pages: &P,
    response: &Response,
    table: &mut DataTable,
    fields: &[&str],
) -> Result<(), Error> {
    if table.column_count() == 0 {
        *table = DataTable::with_columns(fields.iter().copied());
    }
    if table.column_count() != fields.len() {
        return Err(TableError::RowWidth {
            expected: table.column_count(),
            got: fields.len(),
        }
        .into());
    }

    parse_json_response(pages, response, table, |json, table| {
        insert_filtered(json, table, fields)
    })
    .await
}

/// Replace `table` with an empty table whose columns are the writable fields
/// advertised by an OPTIONS response.
///
/// The document is searched depth-first in key order for the first object
/// keyed [`SCHEMA_ACTION`]; the first match wins.
pub fn options_response_to_table_schema(
    response: &Response,
    table: &mut DataTable,
) -> Result<(), Error> {
    response.require_success()?;
    let json: Value = response.json()?;
    let actions = find_tag(&json, SCHEMA_ACTION).ok_or_else(|| {
        Error::parse(format!("no '{SCHEMA_ACTION}' block in OPTIONS response"))
    })?;
    *table = DataTable::with_columns(actions.keys().cloned());
    Ok(())
}

/// Learn a schema from a sample listing: columns from the first record, no rows.
///
/// Only the first page is read. An empty listing leaves `table` untouched.
pub fn response_to_table_schema(response: &Response, table: &mut DataTable) -> Result<(), Error> {
    response.require_success()?;
    let json: Value = response.json()?;
    let records = if is_page_envelope(&json) {
        page_results(&json)?
    } else {
        &json
    };

    let first = match records {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(records),
        other => {
            return Err(Error::parse(format!(
                "expected records, got {}",
                kind_of(other)
            )));
        }
    };
    if let Some(record) = first {
        *table = DataTable::with_columns(as_record(record)?.keys().cloned());
    }
    Ok(())
}

/// Depth-first, declaration-order search for the first object value keyed `tag`.
pub fn find_tag<'a>(json: &'a Value, tag: &str) -> Option<&'a Map<String, Value>> {
    match json {
        Value::Object(map) => {
            for (key, value) in map {
                if key == tag {
                    if let Value::Object(found) = value {
                        return Some(found);
                    }
                }
                if let Some(found) = find_tag(value, tag) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(|item| find_tag(item, tag)),
        _ => None,
    }
}

/// Render a JSON value as a table cell.
///
/// Null is empty, strings lose their quotes, arrays become comma-joined
/// cells, anything else is its JSON text.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

// ── Envelope handling ───────────────────────────────────────────────

async fn parse_json_response<P, F>(
    pages: &P,
    response: &Response,
    table: &mut DataTable,
    mut parse: F,
) -> Result<(), Error>
where
    P: PageSource,
    F: FnMut(&Value, &mut DataTable) -> Result<(), Error>,
{
    response.require_success()?;
    let mut json: Value = response.json()?;
    if !is_page_envelope(&json) {
        return parse(&json, table);
    }

    let mut page = 1_usize;
    loop {
        parse(page_results(&json)?, table)?;

        let Some(next) = next_link(&json)? else {
            break;
        };
        page += 1;
        trace!(page, %next, "following pagination link");

        let response = pages.fetch_page(&next).await?;
        response.require_success()?;
        json = response.json()?;
        if !is_page_envelope(&json) {
            return Err(Error::parse(format!(
                "page {page} is not a pagination envelope"
            )));
        }
    }
    Ok(())
}

fn is_page_envelope(json: &Value) -> bool {
    json.as_object().is_some_and(|map| {
        map.contains_key("count") && map.contains_key("next") && map.contains_key("results")
    })
}

fn page_results(json: &Value) -> Result<&Value, Error> {
    match json.get("results") {
        Some(results @ Value::Array(_)) => Ok(results),
        Some(other) => Err(Error::parse(format!(
            "'results' should be an array, got {}",
            kind_of(other)
        ))),
        None => Err(Error::parse("missing 'results'")),
    }
}

fn next_link(json: &Value) -> Result<Option<String>, Error> {
    match json.get("next") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(url)) => Ok(Some(url.clone())),
        Some(other) => Err(Error::parse(format!(
            "'next' should be a URL or null, got {}",
            kind_of(other)
        ))),
    }
}

// ── Record handling ─────────────────────────────────────────────────

fn insert_records(json: &Value, table: &mut DataTable) -> Result<(), Error> {
    match json {
        Value::Array(records) => {
            if table.column_count() == 0 {
                if let Some(first) = records.first() {
                    *table = DataTable::with_columns(as_record(first)?.keys().cloned());
                }
            }
            for record in records {
                let row = record_to_row(as_record(record)?, table);
                table.insert(row)?;
            }
            Ok(())
        }
        Value::Object(record) => {
            if table.column_count() == 0 {
                *table = DataTable::with_columns(record.keys().cloned());
            }
            let row = record_to_row(record, table);
            table.insert(row)?;
            Ok(())
        }
        other => Err(Error::parse(format!(
            "expected a record or an array of records, got {}",
            kind_of(other)
        ))),
    }
}

fn insert_filtered(json: &Value, table: &mut DataTable, fields: &[&str]) -> Result<(), Error> {
    let records = match json {
        Value::Array(records) => records.as_slice(),
        Value::Object(_) => std::slice::from_ref(json),
        other => {
            return Err(Error::parse(format!(
                "expected an array of records, got {}",
                kind_of(other)
            )));
        }
    };

    for record in records {
        let record = as_record(record)?;
        let row = fields
            .iter()
            .map(|field| {
                record
                    .get(*field)
                    .map(cell_text)
                    .ok_or_else(|| Error::parse(format!("record has no '{field}' field")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        table.insert(row)?;
    }
    Ok(())
}

fn record_to_row(record: &Map<String, Value>, table: &DataTable) -> Vec<String> {
    table
        .columns()
        .iter()
        .map(|column| record.get(&column.name).map(cell_text).unwrap_or_default())
        .collect()
}

fn as_record(value: &Value) -> Result<&Map<String, Value>, Error> {
    value
        .as_object()
        .ok_or_else(|| Error::parse(format!("expected a record, got {}", kind_of(value))))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::error::code;
    use crate::table::FieldSelection;

    /// Serves canned pages keyed by URL.
    #[derive(Default)]
    struct CannedPages {
        pages: HashMap<String, Response>,
    }

    impl CannedPages {
        fn with(mut self, url: &str, body: &Value) -> Self {
            self.pages.insert(url.to_owned(), response(StatusCode::OK, body));
            self
        }
    }

    impl PageSource for CannedPages {
        fn fetch_page(&self, url: &str) -> impl Future<Output = Result<Response, Error>> + Send {
            let page = self.pages.get(url).cloned().ok_or(Error::Status {
                status: 404,
                url: url.to_owned(),
            });
            async move { page }
        }
    }

    fn response(status: StatusCode, body: &Value) -> Response {
        Response {
            status,
            url: Url::parse("http://gc.test/api/v1/").unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from(serde_json::to_vec(body).unwrap()),
        }
    }

    fn rows(table: &DataTable) -> Vec<Vec<String>> {
        table.rows().map(<[String]>::to_vec).collect()
    }

    #[tokio::test]
    async fn single_page_envelope_infers_columns() {
        let body = json!({
            "count": 2,
            "next": null,
            "results": [{"id": "1", "name": "A"}, {"id": "2", "name": "B"}]
        });
        let mut table = DataTable::new();
        response_to_table(&CannedPages::default(), &response(StatusCode::OK, &body), &mut table)
            .await
            .unwrap();

        assert_eq!(table.column_names(FieldSelection::All), vec!["id", "name"]);
        assert_eq!(rows(&table), vec![vec!["1", "A"], vec!["2", "B"]]);
    }

    #[tokio::test]
    async fn pagination_appends_pages_in_order() {
        let first = json!({
            "count": 3,
            "next": "http://gc.test/api/v1/patients/?offset=2",
            "results": [{"pk": "1", "name": "a"}, {"pk": "2", "name": "b"}]
        });
        let pages = CannedPages::default().with(
            "http://gc.test/api/v1/patients/?offset=2",
            &json!({"count": 3, "next": null, "results": [{"pk": "3", "name": "c"}]}),
        );

        let mut table = DataTable::new();
        response_to_table(&pages, &response(StatusCode::OK, &first), &mut table)
            .await
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(
            rows(&table),
            vec![vec!["1", "a"], vec!["2", "b"], vec!["3", "c"]]
        );
    }

    #[tokio::test]
    async fn broken_next_link_keeps_earlier_rows() {
        let first = json!({
            "count": 2,
            "next": "http://gc.test/missing",
            "results": [{"pk": "1"}]
        });
        let mut table = DataTable::new();
        let err = response_to_table(
            &CannedPages::default(),
            &response(StatusCode::OK, &first),
            &mut table,
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), 404);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn bare_object_inserts_one_row() {
        let body = json!({"pk": 7, "name": "slide", "files": ["a.tif", "b.tif"], "study": null});
        let mut table = DataTable::new();
        response_to_table(&CannedPages::default(), &response(StatusCode::OK, &body), &mut table)
            .await
            .unwrap();

        assert_eq!(
            table.column_names(FieldSelection::All),
            vec!["pk", "name", "files", "study"]
        );
        assert_eq!(rows(&table), vec![vec!["7", "slide", "a.tif,b.tif", ""]]);
    }

    #[tokio::test]
    async fn seeded_schema_aligns_cells_by_name() {
        let mut table = DataTable::with_columns(["name", "pk", "sex"]);
        table.show_only(&["name"]);
        let body = json!([{"pk": "1", "name": "Doe", "birth": "1970"}]);

        response_to_table(&CannedPages::default(), &response(StatusCode::OK, &body), &mut table)
            .await
            .unwrap();

        assert_eq!(rows(&table), vec![vec!["Doe", "1", ""]]);
        assert_eq!(table.column_names(FieldSelection::Visible), vec!["name"]);
    }

    #[tokio::test]
    async fn filtered_rows_hold_only_requested_fields() {
        let body = json!([{"pk": "7", "name": "x", "extra": "ignored"}]);
        let mut table = DataTable::new();
        response_to_filtered_table(
            &CannedPages::default(),
            &response(StatusCode::OK, &body),
            &mut table,
            &["pk", "name"],
        )
        .await
        .unwrap();

        assert_eq!(table.column_names(FieldSelection::All), vec!["pk", "name"]);
        assert_eq!(rows(&table), vec![vec!["7", "x"]]);
    }

    #[tokio::test]
    async fn filtered_record_missing_a_field_is_a_parse_error() {
        let body = json!({"count": 1, "next": null, "results": [{"pk": "7"}]});
        let mut table = DataTable::new();
        let err = response_to_filtered_table(
            &CannedPages::default(),
            &response(StatusCode::OK, &body),
            &mut table,
            &["pk", "name"],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), code::PARSE_ERROR);
    }

    #[tokio::test]
    async fn non_record_payloads_are_parse_errors() {
        let mut table = DataTable::new();
        let err = response_to_table(
            &CannedPages::default(),
            &response(StatusCode::OK, &json!("just a string")),
            &mut table,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), code::PARSE_ERROR);

        let err = response_to_table(
            &CannedPages::default(),
            &response(StatusCode::OK, &json!({"count": 1, "next": 5, "results": []})),
            &mut table,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), code::PARSE_ERROR);
    }

    #[tokio::test]
    async fn error_status_is_passed_through() {
        let mut table = DataTable::new();
        let err = response_to_table(
            &CannedPages::default(),
            &response(StatusCode::FORBIDDEN, &json!({"detail": "nope"})),
            &mut table,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), 403);
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn options_schema_takes_the_post_block() {
        let body = json!({"name": "Worklist List", "actions": {"POST": {"title": {}, "images": {}}}});
        let mut table = DataTable::with_columns(["stale"]);
        options_response_to_table_schema(&response(StatusCode::OK, &body), &mut table).unwrap();

        assert_eq!(
            table.column_names(FieldSelection::All),
            vec!["title", "images"]
        );
        assert!(table.is_empty());
    }

    #[test]
    fn options_schema_without_post_is_a_parse_error() {
        let body = json!({"actions": {"PUT": {"title": {}}}});
        let mut table = DataTable::new();
        let err =
            options_response_to_table_schema(&response(StatusCode::OK, &body), &mut table)
                .unwrap_err();
        assert_eq!(err.code(), code::PARSE_ERROR);
    }

    #[test]
    fn tag_search_prefers_the_first_match_in_declaration_order() {
        let body = json!({
            "actions": {
                "POST": {"title": {}},
                "nested": {"POST": {"deeper": {}}}
            },
            "POST": {"later": {}}
        });
        let found = find_tag(&body, "POST").unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), ["title"]);
    }

    #[test]
    fn tag_search_descends_before_moving_on() {
        let body = json!({
            "renders": ["application/json"],
            "meta": [{"POST": {"from_array": {}}}],
            "POST": {"shallow_but_later": {}}
        });
        let found = find_tag(&body, "POST").unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), ["from_array"]);
    }

    #[test]
    fn tag_search_skips_non_object_matches() {
        let body = json!({"POST": "not allowed", "actions": {"POST": {"title": {}}}});
        let found = find_tag(&body, "POST").unwrap();
        assert!(found.contains_key("title"));
        assert!(find_tag(&json!([1, 2, 3]), "POST").is_none());
    }

    #[test]
    fn sample_schema_reads_only_the_first_record() {
        let body = json!({
            "count": 40,
            "next": "http://gc.test/api/v1/studies/?offset=1",
            "results": [{"pk": "s1", "name": "CT", "patient": "p1"}]
        });
        let mut table = DataTable::new();
        response_to_table_schema(&response(StatusCode::OK, &body), &mut table).unwrap();
        assert_eq!(
            table.column_names(FieldSelection::All),
            vec!["pk", "name", "patient"]
        );
        assert!(table.is_empty());

        let mut untouched = DataTable::new();
        response_to_table_schema(&response(StatusCode::OK, &json!([])), &mut untouched).unwrap();
        assert_eq!(untouched.column_count(), 0);
    }

    #[test]
    fn cells_follow_the_serialization_rules() {
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&json!("quoted \"inside\"")), "quoted \"inside\"");
        assert_eq!(cell_text(&json!(12.5)), "12.5");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&json!(["a", 1, null])), "a,1,");
        assert_eq!(cell_text(&json!({"k": "v"})), "{\"k\":\"v\"}");
    }
}

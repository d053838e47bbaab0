// Generic in-memory table
//
// Every resource the worklist API returns is flattened into the same shape:
// named, ordered columns and rows of string cells. The column set doubles as
// the resource's schema; a table with zero columns means "shape unknown".

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("row has {got} cells but the table has {expected} columns")]
    RowWidth { expected: usize, got: usize },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

/// Which columns a header query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldSelection {
    #[default]
    All,
    Visible,
    Invisible,
}

/// Column metadata. Visibility is a display hint only; hidden columns keep
/// their data and remain addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub visible: bool,
}

impl Column {
    fn matches(&self, selection: FieldSelection) -> bool {
        match selection {
            FieldSelection::All => true,
            FieldSelection::Visible => self.visible,
            FieldSelection::Invisible => !self.visible,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTable {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    /// An empty table with an unknown shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with the given visible columns and no rows.
    ///
    /// Duplicate names are dropped, keeping the first occurrence.
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<Column> = Vec::new();
        for name in names {
            let name = name.into();
            if columns.iter().all(|c| c.name != name) {
                columns.push(Column {
                    name,
                    visible: true,
                });
            }
        }
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Copy of the column set without any rows.
    pub fn schema(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order, filtered by visibility.
    pub fn column_names(&self, selection: FieldSelection) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.matches(selection))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn set_column_visibility(&mut self, name: &str, visible: bool) -> Result<(), TableError> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_owned()))?;
        column.visible = visible;
        Ok(())
    }

    /// Hide every column except `keep`. Columns missing from the table are ignored.
    pub fn show_only(&mut self, keep: &[&str]) {
        for column in &mut self.columns {
            column.visible = keep.contains(&column.name.as_str());
        }
    }

    /// Append a row. The row must have exactly one cell per column.
    pub fn insert(&mut self, row: Vec<String>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Cell lookup by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    /// Drop all rows, keeping the columns.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Rows as JSON objects restricted to the selected columns.
    pub fn to_records(&self, selection: FieldSelection) -> Vec<Map<String, Value>> {
        let picked: Vec<(usize, &Column)> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matches(selection))
            .collect();

        self.rows
            .iter()
            .map(|row| {
                picked
                    .iter()
                    .filter_map(|(i, c)| {
                        row.get(*i)
                            .map(|cell| (c.name.clone(), Value::String(cell.clone())))
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    fn patients() -> DataTable {
        let mut table = DataTable::with_columns(["pk", "name", "sex"]);
        table
            .insert(vec!["1".into(), "Doe".into(), "F".into()])
            .unwrap();
        table
            .insert(vec!["2".into(), "Roe".into(), String::new()])
            .unwrap();
        table
    }

    #[test]
    fn rows_must_match_the_column_count() {
        let mut table = DataTable::with_columns(["pk", "name"]);
        let err = table.insert(vec!["1".into()]).unwrap_err();
        assert_eq!(
            err,
            TableError::RowWidth {
                expected: 2,
                got: 1
            }
        );
        assert!(table.is_empty());
    }

    #[test]
    fn empty_table_accepts_only_empty_rows() {
        let mut table = DataTable::new();
        assert_eq!(table.column_count(), 0);
        assert!(table.insert(vec!["x".into()]).is_err());
    }

    #[test]
    fn duplicate_column_names_collapse() {
        let table = DataTable::with_columns(["id", "name", "id"]);
        assert_eq!(table.column_names(FieldSelection::All), vec!["id", "name"]);
    }

    #[test]
    fn hidden_columns_keep_their_data() {
        let mut table = patients();
        table.show_only(&["name"]);

        assert_eq!(table.column_names(FieldSelection::Visible), vec!["name"]);
        assert_eq!(
            table.column_names(FieldSelection::Invisible),
            vec!["pk", "sex"]
        );
        assert_eq!(table.value(0, "pk"), Some("1"));
        assert_eq!(table.row(1).unwrap(), ["2", "Roe", ""]);
    }

    #[test]
    fn visibility_of_unknown_column_is_an_error() {
        let mut table = patients();
        assert_eq!(
            table.set_column_visibility("age", false),
            Err(TableError::UnknownColumn("age".into()))
        );
        table.set_column_visibility("sex", false).unwrap();
        assert_eq!(
            table.column_names(FieldSelection::Visible),
            vec!["pk", "name"]
        );
    }

    #[test]
    fn schema_and_clear_drop_rows_only() {
        let mut table = patients();
        let schema = table.schema();
        assert_eq!(schema.columns(), table.columns());
        assert!(schema.is_empty());

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 3);
    }

    #[test]
    fn records_follow_the_selection() {
        let mut table = patients();
        table.show_only(&["name"]);

        let records = table.to_records(FieldSelection::Visible);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].len(), 1);
        assert_eq!(records[0]["name"], "Doe");

        let all = table.to_records(FieldSelection::All);
        let keys: Vec<&String> = all[1].keys().collect();
        assert_eq!(keys, ["pk", "name", "sex"]);
    }
}

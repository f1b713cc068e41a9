use std::fmt::Display;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::types::EnrichedTable;
use crate::utils::{format_float, render_table};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Refusing to run a statement that modifies the database: {0}")]
    NotReadOnly(String),
    #[error("Database unavailable: {0}")]
    Unavailable(String),
}

/// Writes `table` as CSV with a leading, unnamed row-index column.
/// An existing file at `path` is replaced.
pub fn save_flat(table: &EnrichedTable, path: impl AsRef<Path>) -> Result<(), LoadError> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(std::iter::once("").chain(table.headers()))?;

    for (i, row) in table.rows().iter().enumerate() {
        let record: Vec<String> = [i.to_string(), row.name.clone()]
            .into_iter()
            .chain(row.values.iter().map(|v| format_float(*v)))
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single SQLite connection owned by one pipeline run.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn close(self) -> Result<(), LoadError> {
        self.conn.close().map_err(|(_, e)| LoadError::Database(e))
    }
}

/// Replaces `table_name` with the rows and columns of `table`.
///
/// Drop, create and inserts run in one transaction, so a failed load leaves
/// the previous table in place.
pub fn save_relational(
    table: &EnrichedTable,
    store: &Store,
    table_name: &str,
) -> Result<(), LoadError> {
    let ident = quote_ident(table_name);
    let column_defs: Vec<String> =
        std::iter::once(format!("{} TEXT", quote_ident(table.name_column())))
            .chain(
                table
                    .metric_columns()
                    .iter()
                    .map(|c| format!("{} REAL", quote_ident(c))),
            )
            .collect();
    let placeholders: Vec<String> = (1..=column_defs.len())
        .map(|i| format!("?{}", i))
        .collect();

    let tx = store.conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {ident};
         CREATE TABLE {ident} ({});",
        column_defs.join(", ")
    ))?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {ident} VALUES ({})",
            placeholders.join(", ")
        ))?;
        for row in table.rows() {
            let values = std::iter::once(Value::Text(row.name.clone()))
                .chain(row.values.iter().map(|v| Value::Real(*v)));
            stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;

    log::info!("Loaded {} rows into {}", table.len(), table_name);
    Ok(())
}

/// Column names and rows of a read-only query, in result order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Text values of the first column, skipping non-text cells.
    pub fn first_column_text(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| match row.first() {
                Some(Value::Text(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format_float(*f),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

impl Display for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.rows.is_empty() {
            return write!(f, "Empty result\nColumns: [{}]", self.columns.join(", "));
        }
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(value_text).collect())
            .collect();
        write!(f, "{}", render_table(&self.columns, &cells))
    }
}

impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&QueryRow {
                columns: &self.columns,
                values: row,
            })?;
        }
        seq.end()
    }
}

struct QueryRow<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for QueryRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            match value {
                Value::Null => map.serialize_entry(column, &())?,
                Value::Integer(i) => map.serialize_entry(column, i)?,
                Value::Real(f) => map.serialize_entry(column, f)?,
                Value::Text(s) => map.serialize_entry(column, s)?,
                Value::Blob(b) => map.serialize_entry(column, b)?,
            }
        }
        map.end()
    }
}

/// Runs a read-only statement and collects every row.
pub fn run_query(query: &str, store: &Store) -> Result<QueryResult, LoadError> {
    let mut stmt = store.conn.prepare(query)?;
    if !stmt.readonly() {
        return Err(LoadError::NotReadOnly(query.to_string()));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<Result<Vec<_>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryResult { columns, rows })
}

use std::fmt::Display;
use std::str::FromStr;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::utils::{format_float, render_table};

#[derive(Debug, thiserror::Error)]
#[error("Invalid dataset '{0}'. Accepted values: 'banks', 'gdp'")]
pub struct DatasetParseError(String);

/// Source tables this crate knows how to locate and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Banks,
    Gdp,
}

impl Dataset {
    /// Prefix of the environment variables that configure this dataset.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Dataset::Banks => "BANKS",
            Dataset::Gdp => "GDP",
        }
    }

    pub fn locator(&self) -> TableLocator {
        match self {
            Dataset::Banks => TableLocator::default(),
            // The archived GDP page carries two layout tables before the ranking,
            // reports millions with thousands separators and puts footnote links
            // after the country anchor.
            Dataset::Gdp => TableLocator {
                body_selector: "tbody".to_string(),
                table_index: 2,
                header_rows: 1,
                name_cell: 0,
                name_anchor: AnchorPick::First,
                metric_cell: 2,
                thousands_separator: Some(','),
                scale: 0.001,
                skip_incomplete: true,
            },
        }
    }

    pub fn columns(&self) -> ColumnScheme {
        match self {
            Dataset::Banks => ColumnScheme {
                name: "Name".to_string(),
                prefix: "MC".to_string(),
                suffix: "Billion".to_string(),
                base_unit: "USD".to_string(),
            },
            Dataset::Gdp => ColumnScheme {
                name: "Country".to_string(),
                prefix: "GDP".to_string(),
                suffix: "Billions".to_string(),
                base_unit: "USD".to_string(),
            },
        }
    }
}

impl FromStr for Dataset {
    type Err = DatasetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "banks" => Ok(Dataset::Banks),
            "gdp" | "countries" => Ok(Dataset::Gdp),
            _ => Err(DatasetParseError(s.to_string())),
        }
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dataset::Banks => write!(f, "Largest banks by market capitalization"),
            Dataset::Gdp => write!(f, "Countries by nominal GDP"),
        }
    }
}

/// Markup text as returned by the fetcher. Dropped once extraction is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument(String);

impl RawDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One extracted table row before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub name: String,
    pub metric: f64,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>, metric: f64) -> Self {
        Self {
            name: name.into(),
            metric,
        }
    }
}

/// Which anchor of the name cell carries the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPick {
    First,
    #[default]
    Last,
}

/// Where the entity table lives in a document and how its cells are read.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLocator {
    /// CSS selector for the table body element.
    pub body_selector: String,
    /// Which match of `body_selector` to use, zero-based.
    pub table_index: usize,
    /// Leading rows that are headers rather than data.
    pub header_rows: usize,
    /// Zero-based `td` index holding the entity name.
    pub name_cell: usize,
    pub name_anchor: AnchorPick,
    /// Zero-based `td` index holding the metric.
    pub metric_cell: usize,
    pub thousands_separator: Option<char>,
    /// Multiplier applied to the parsed metric, e.g. 0.001 for millions to billions.
    pub scale: f64,
    /// Skip rows that fail structural checks instead of failing the extraction.
    pub skip_incomplete: bool,
}

impl Default for TableLocator {
    fn default() -> Self {
        Self {
            body_selector: "tbody".to_string(),
            table_index: 0,
            header_rows: 1,
            name_cell: 1,
            name_anchor: AnchorPick::Last,
            metric_cell: 2,
            thousands_separator: None,
            scale: 1.0,
            skip_incomplete: false,
        }
    }
}

/// Naming of the output columns: `<prefix>_<UNIT>_<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnScheme {
    pub name: String,
    pub prefix: String,
    pub suffix: String,
    pub base_unit: String,
}

impl ColumnScheme {
    pub fn metric_column(&self, unit: &str) -> String {
        format!("{}_{}_{}", self.prefix, unit, self.suffix)
    }

    pub fn base_column(&self) -> String {
        self.metric_column(&self.base_unit)
    }
}

/// Unit code to multiplier, in source order. The first rate seen for a code wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: Vec<(String, f64)>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and keeps the existing rate when `unit` is already present.
    pub fn insert(&mut self, unit: impl Into<String>, rate: f64) -> bool {
        let unit = unit.into();
        if self.get(&unit).is_some() {
            return false;
        }
        self.rates.push((unit, rate));
        true
    }

    pub fn get(&self, unit: &str) -> Option<f64> {
        self.rates
            .iter()
            .find(|(code, _)| code == unit)
            .map(|(_, rate)| *rate)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.rates.iter().map(|(code, _)| code.as_str())
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut table = RateTable::new();
        for (unit, rate) in iter {
            table.insert(unit, rate);
        }
        table
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub name: String,
    /// One value per metric column, aligned with [`EnrichedTable::metric_columns`].
    pub values: Vec<f64>,
}

/// Extracted records with one converted column per rate unit.
///
/// The first metric column is always the base metric; derived columns follow in
/// rate table order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedTable {
    name_column: String,
    metric_columns: Vec<String>,
    rows: Vec<EnrichedRow>,
}

impl EnrichedTable {
    pub(crate) fn new(
        name_column: String,
        metric_columns: Vec<String>,
        rows: Vec<EnrichedRow>,
    ) -> Self {
        Self {
            name_column,
            metric_columns,
            rows,
        }
    }

    pub fn name_column(&self) -> &str {
        &self.name_column
    }

    pub fn metric_columns(&self) -> &[String] {
        &self.metric_columns
    }

    /// Name column followed by every metric column.
    pub fn headers(&self) -> Vec<&str> {
        std::iter::once(self.name_column.as_str())
            .chain(self.metric_columns.iter().map(String::as_str))
            .collect()
    }

    pub fn rows(&self) -> &[EnrichedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.metric_columns.iter().position(|c| c == column)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| r.values[index])
    }
}

impl Display for EnrichedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<String> = self.headers().into_iter().map(String::from).collect();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                std::iter::once(row.name.clone())
                    .chain(row.values.iter().map(|v| format_float(*v)))
                    .collect()
            })
            .collect();
        write!(f, "{}", render_table(&headers, &cells))?;
        write!(
            f,
            "\n[{} rows x {} columns]",
            self.rows.len(),
            headers.len()
        )
    }
}

impl Serialize for EnrichedTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowView { table: self, row })?;
        }
        seq.end()
    }
}

struct RowView<'a> {
    table: &'a EnrichedTable,
    row: &'a EnrichedRow,
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.table.metric_columns.len() + 1))?;
        map.serialize_entry(&self.table.name_column, &self.row.name)?;
        for (column, value) in self.table.metric_columns.iter().zip(&self.row.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::types::{AnchorPick, EntityRecord, RawDocument, TableLocator};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    #[error("No element matching '{selector}' at index {index}")]
    TableNotFound { selector: String, index: usize },
    #[error("Row {row}: missing required field: {field}")]
    MissingField { row: usize, field: String },
    #[error("Row {row}: invalid metric '{text}'")]
    InvalidMetric { row: usize, text: String },
}

static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("invalid selector: tr"));

static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("invalid selector: td"));

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("invalid selector: a"));

static RE_FOOTNOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("invalid regex: footnote"));

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reads (name, metric) pairs from the table body selected by `locator`.
///
/// Header rows are skipped and document order is kept. Unless the locator
/// allows skipping incomplete rows, the first structurally broken row fails
/// the whole extraction.
pub fn extract(
    doc: &RawDocument,
    locator: &TableLocator,
) -> Result<Vec<EntityRecord>, ParseError> {
    let document = Html::parse_document(doc.as_str());
    let body_selector = Selector::parse(&locator.body_selector).map_err(|e| {
        ParseError::InvalidSelector(format!("{}: {}", locator.body_selector, e))
    })?;

    let body = document
        .select(&body_selector)
        .nth(locator.table_index)
        .ok_or_else(|| ParseError::TableNotFound {
            selector: locator.body_selector.clone(),
            index: locator.table_index,
        })?;

    let mut records = Vec::new();

    for (i, row) in body
        .select(&ROW_SELECTOR)
        .enumerate()
        .skip(locator.header_rows)
    {
        let cells: Vec<ElementRef> = row.select(&CELL_SELECTOR).collect();

        if cells.is_empty() && locator.skip_incomplete {
            log::debug!("Row {} has no data cells, skipping", i);
            continue;
        }

        match parse_row(i, &cells, locator) {
            Ok(record) => records.push(record),
            Err(e) if locator.skip_incomplete => log::warn!("Skipping row: {}", e),
            Err(e) => return Err(e),
        }
    }

    log::info!("Extracted {} records", records.len());
    Ok(records)
}

fn parse_row(
    row: usize,
    cells: &[ElementRef],
    locator: &TableLocator,
) -> Result<EntityRecord, ParseError> {
    let name_cell = cells
        .get(locator.name_cell)
        .ok_or_else(|| ParseError::MissingField {
            row,
            field: format!("name cell {}", locator.name_cell),
        })?;

    let mut anchors = name_cell.select(&ANCHOR_SELECTOR);
    let anchor = match locator.name_anchor {
        AnchorPick::First => anchors.next(),
        AnchorPick::Last => anchors.last(),
    };
    let name = anchor
        .map(|a| normalize_whitespace(&elem_text(a)))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ParseError::MissingField {
            row,
            field: "name link".to_string(),
        })?;

    let metric_cell = cells
        .get(locator.metric_cell)
        .ok_or_else(|| ParseError::MissingField {
            row,
            field: format!("metric cell {}", locator.metric_cell),
        })?;
    let metric = parse_metric(row, &elem_text(*metric_cell), locator)?;

    Ok(EntityRecord { name, metric })
}

fn parse_metric(row: usize, text: &str, locator: &TableLocator) -> Result<f64, ParseError> {
    let mut cleaned = RE_FOOTNOTE.replace_all(text, "").trim().to_string();
    if let Some(separator) = locator.thousands_separator {
        cleaned.retain(|c| c != separator);
    }

    let invalid = || ParseError::InvalidMetric {
        row,
        text: text.trim().to_string(),
    };

    let value = cleaned.parse::<f64>().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }

    Ok(value * locator.scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dataset;

    const BANKS_HTML: &str = r#"
        <html><body>
        <table class="wikitable">
          <tbody>
            <tr><th>Rank</th><th>Bank name</th><th>Market cap (US$ billion)</th></tr>
            <tr>
              <td>1</td>
              <td><span class="flagicon"><a href="/wiki/United_States"><img alt="US"></a></span>
                  <a href="/wiki/JPMorgan_Chase">JPMorgan Chase</a></td>
              <td>432.92
              </td>
            </tr>
            <tr>
              <td>2</td>
              <td><a href="/wiki/United_States">US</a> <a href="/wiki/Bank_of_America">Bank of America</a></td>
              <td>231.52</td>
            </tr>
            <tr>
              <td>3</td>
              <td><a href="/wiki/ICBC">Industrial and Commercial
                  Bank of China</a></td>
              <td>194.56[1]</td>
            </tr>
          </tbody>
        </table>
        <table><tbody><tr><td>other</td></tr></tbody></table>
        </body></html>
    "#;

    #[test]
    fn test_extract_bank_rows_in_order() {
        let doc = RawDocument::new(BANKS_HTML);
        let records = extract(&doc, &TableLocator::default()).expect("Failed to extract");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], EntityRecord::new("JPMorgan Chase", 432.92));
        assert_eq!(records[1], EntityRecord::new("Bank of America", 231.52));
        assert_eq!(
            records[2],
            EntityRecord::new("Industrial and Commercial Bank of China", 194.56)
        );
    }

    #[test]
    fn test_extract_missing_table_body() {
        let doc = RawDocument::new("<html><body><p>No tables here</p></body></html>");
        let result = extract(&doc, &TableLocator::default());
        assert!(matches!(result, Err(ParseError::TableNotFound { index: 0, .. })));
    }

    #[test]
    fn test_extract_missing_anchor_fails() {
        let html = r#"
            <table><tbody>
              <tr><th>Rank</th><th>Bank</th><th>Cap</th></tr>
              <tr><td>1</td><td>Plain text bank</td><td>10.0</td></tr>
            </tbody></table>
        "#;
        let result = extract(&RawDocument::new(html), &TableLocator::default());
        assert!(matches!(result, Err(ParseError::MissingField { row: 1, .. })));
    }

    #[test]
    fn test_extract_missing_cell_fails() {
        let html = r#"
            <table><tbody>
              <tr><th>Rank</th><th>Bank</th><th>Cap</th></tr>
              <tr><td>1</td><td><a href="/a">Bank A</a></td></tr>
            </tbody></table>
        "#;
        let result = extract(&RawDocument::new(html), &TableLocator::default());
        match result {
            Err(ParseError::MissingField { row, field }) => {
                assert_eq!(row, 1);
                assert!(field.contains("metric"));
            }
            other => panic!("Expected missing metric cell, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_rejects_bad_and_negative_metrics() {
        for metric in ["n/a", "-5.0", "inf"] {
            let html = format!(
                r#"<table><tbody>
                  <tr><th>Rank</th><th>Bank</th><th>Cap</th></tr>
                  <tr><td>1</td><td><a href="/a">Bank A</a></td><td>{}</td></tr>
                </tbody></table>"#,
                metric
            );
            let result = extract(&RawDocument::new(html), &TableLocator::default());
            assert!(
                matches!(result, Err(ParseError::InvalidMetric { row: 1, .. })),
                "metric '{}' should be rejected",
                metric
            );
        }
    }

    #[test]
    fn test_extract_header_only_table_is_empty() {
        let html = "<table><tbody><tr><th>Rank</th></tr></tbody></table>";
        let records =
            extract(&RawDocument::new(html), &TableLocator::default()).expect("Failed to extract");
        assert!(records.is_empty());
    }

    #[test]
    fn test_extract_invalid_selector() {
        let locator = TableLocator {
            body_selector: "tbody[".to_string(),
            ..TableLocator::default()
        };
        let result = extract(&RawDocument::new(BANKS_HTML), &locator);
        assert!(matches!(result, Err(ParseError::InvalidSelector(_))));
    }

    #[test]
    fn test_extract_gdp_preset_skips_incomplete_rows() {
        let html = r##"
            <table><tbody><tr><td>legend</td></tr></tbody></table>
            <table><tbody><tr><td>legend</td></tr></tbody></table>
            <table class="wikitable">
              <tbody>
                <tr><th>Country/Territory</th><th>UN region</th><th>IMF</th></tr>
                <tr><th>Estimate</th><th>Year</th></tr>
                <tr><td>World</td><td>—</td><td>104,476,432</td></tr>
                <tr>
                  <td><span class="flagicon"><img alt=""></span> <a href="/wiki/United_States">United States</a></td>
                  <td><a href="/wiki/Americas">Americas</a></td>
                  <td>26,854,599</td>
                </tr>
                <tr>
                  <td><a href="/wiki/China">China</a><sup><a href="#n1">[n 1]</a></sup></td>
                  <td><a href="/wiki/Asia">Asia</a></td>
                  <td>19,373,586</td>
                </tr>
                <tr>
                  <td><a href="/wiki/Afghanistan">Afghanistan</a></td>
                  <td><a href="/wiki/Asia">Asia</a></td>
                  <td>—</td>
                </tr>
              </tbody>
            </table>
        "##;

        let records = extract(&RawDocument::new(html), &Dataset::Gdp.locator())
            .expect("Failed to extract GDP rows");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "United States");
        assert_eq!(records[0].metric, 26854599.0 * 0.001);
        assert_eq!(records[1].name, "China");
        assert_eq!(records[1].metric, 19373586.0 * 0.001);
    }
}

use crate::types::{ColumnScheme, EnrichedRow, EnrichedTable, EntityRecord, RateTable};

/// Adds one `metric * rate` column per unit in `rates`.
///
/// A unit that names the base column (`USD` for the bundled datasets) is
/// applied to that column in place instead of producing a duplicate.
pub fn transform(
    records: &[EntityRecord],
    rates: &RateTable,
    columns: &ColumnScheme,
) -> EnrichedTable {
    let mut metric_columns = vec![columns.base_column()];
    let mut slots = Vec::with_capacity(rates.len());

    for (unit, rate) in rates.iter() {
        let column = columns.metric_column(unit);
        let slot = match metric_columns.iter().position(|c| *c == column) {
            Some(existing) => existing,
            None => {
                metric_columns.push(column);
                metric_columns.len() - 1
            }
        };
        slots.push((slot, rate));
    }

    let rows = records
        .iter()
        .map(|record| {
            let mut values = vec![record.metric; metric_columns.len()];
            for &(slot, rate) in &slots {
                values[slot] = record.metric * rate;
            }
            EnrichedRow {
                name: record.name.clone(),
                values,
            }
        })
        .collect();

    EnrichedTable::new(columns.name.clone(), metric_columns, rows)
}

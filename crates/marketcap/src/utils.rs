/// Shortest representation that round-trips, in positional notation and
/// always with a fractional part for finite integral values (`100.0`,
/// `432.92`, `150000000000000000.0`).
pub fn format_float(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Renders rows as a right-aligned text grid with a leading row-index column.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let index_width = rows.len().saturating_sub(1).to_string().len();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);

    let mut line = " ".repeat(index_width);
    for (header, width) in headers.iter().zip(&widths) {
        line.push_str(&format!("  {:>width$}", header, width = *width));
    }
    lines.push(line);

    for (i, row) in rows.iter().enumerate() {
        let mut line = format!("{:<width$}", i, width = index_width);
        for (cell, width) in row.iter().zip(&widths) {
            line.push_str(&format!("  {:>width$}", cell, width = *width));
        }
        lines.push(line);
    }

    lines.join("\n")
}

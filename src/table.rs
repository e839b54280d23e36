//! Plain-text table rendering for query command output.

use std::borrow::Cow;
use std::fmt::Write as _;

/// Renders a header, a dashed separator and the rows. Columns whose non-empty
/// cells are all numeric are right-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(sanitize_cell(cell).chars().count());
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }
    let numeric = (0..column_count)
        .map(|idx| {
            let mut cells = rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|cell| !cell.is_empty())
                .peekable();
            cells.peek().is_some()
                && cells.all(|cell| cell.trim_end_matches('%').parse::<f64>().is_ok())
        })
        .collect::<Vec<_>>();

    let mut output = String::new();
    let header_align = vec![false; column_count];
    let _ = writeln!(output, "{}", format_row(headers, &widths, &header_align));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &header_align));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .zip(right_align)
        .map(|((value, width), right)| {
            let cell = sanitize_cell(value);
            if *right {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

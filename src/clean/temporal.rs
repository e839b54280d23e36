use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::{
    data::{Cell, ColumnType, format_float, parse_iso_date},
    frame::Frame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateEncoding {
    /// Eight digits, `YYYYMMDD`, as found in the raw export.
    Compact,
    /// `YYYY-MM-DD`, as written to the cleaned CSV.
    Iso,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateConversion {
    pub from: ColumnType,
    pub parsed: usize,
    pub unknown: usize,
}

fn compact_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid date pattern"))
}

pub fn parse_compact_date(value: &str) -> Option<NaiveDate> {
    let captures = compact_pattern().captures(value.trim())?;
    let year = captures[1].parse().ok()?;
    let month = captures[2].parse().ok()?;
    let day = captures[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_cell(cell: &Cell, encoding: DateEncoding) -> Option<NaiveDate> {
    let raw = match cell {
        Cell::Date(date) => return Some(*date),
        Cell::Text(text) => text.clone(),
        Cell::Integer(value) => value.to_string(),
        Cell::Float(value) => format_float(*value),
        Cell::Boolean(_) => return None,
    };
    match encoding {
        DateEncoding::Compact => parse_compact_date(&raw),
        DateEncoding::Iso => parse_iso_date(&raw),
    }
}

/// Converts `column` to a date column. Values that do not match the encoding
/// become unknown. Returns `None` when the column is absent.
pub fn normalize_dates(
    frame: &mut Frame,
    column: &str,
    encoding: DateEncoding,
) -> Option<DateConversion> {
    let column = frame.column_mut(column)?;
    let from = column.datatype;
    let mut parsed = 0usize;
    let mut unknown = 0usize;
    for cell in &mut column.cells {
        let Some(current) = cell.as_ref() else {
            continue;
        };
        match parse_cell(current, encoding) {
            Some(date) => {
                *cell = Some(Cell::Date(date));
                parsed += 1;
            }
            None => {
                *cell = None;
                unknown += 1;
            }
        }
    }
    column.datatype = ColumnType::Date;
    Some(DateConversion {
        from,
        parsed,
        unknown,
    })
}

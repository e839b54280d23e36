use std::{
    fmt,
    hash::{Hash, Hasher},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnType::Text => "Text",
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Boolean => "Boolean",
            ColumnType::Date => "Date",
        };
        f.write_str(label)
    }
}

/// A single known cell value. Unknown cells are represented as `None` by the
/// containers that hold cells, never as a variant here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Cell {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Cell::Text(_) => ColumnType::Text,
            Cell::Integer(_) => ColumnType::Integer,
            Cell::Float(_) => ColumnType::Float,
            Cell::Boolean(_) => ColumnType::Boolean,
            Cell::Date(_) => ColumnType::Date,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Integer(i) => i.to_string(),
            Cell::Float(f) => format_float(*f),
            Cell::Boolean(b) => b.to_string(),
            Cell::Date(d) => d.format(ISO_DATE_FORMAT).to_string(),
        }
    }
}

// Floats compare by bit pattern so that `Cell` can key hash sets during
// distinct counting and row deduplication. Signed zeros are folded together.
fn float_key(value: f64) -> u64 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a == b,
            (Cell::Integer(a), Cell::Integer(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => float_key(*a) == float_key(*b),
            (Cell::Boolean(a), Cell::Boolean(b)) => a == b,
            (Cell::Date(a), Cell::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Text(s) => s.hash(state),
            Cell::Integer(i) => i.hash(state),
            Cell::Float(f) => float_key(*f).hash(state),
            Cell::Boolean(b) => b.hash(state),
            Cell::Date(d) => d.hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn format_float(value: f64) -> String {
    if is_integral(value) {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Whole-valued and representable as `i64`.
pub fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e18
}

pub fn parse_integer(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Parses a finite number; `nan`/`inf` spellings are rejected.
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}

pub fn parse_boolean_literal(value: &str) -> Option<bool> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn float_cells_hash_consistently_with_equality() {
        let mut set = HashSet::new();
        set.insert(Cell::Float(0.0));
        set.insert(Cell::Float(-0.0));
        set.insert(Cell::Float(2.5));
        set.insert(Cell::Float(2.5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn heterogeneous_cells_are_distinct() {
        assert_ne!(Cell::Integer(1), Cell::Float(1.0));
        assert_ne!(Cell::Text("1".into()), Cell::Integer(1));
    }

    #[test]
    fn as_display_renders_whole_floats_without_fraction() {
        assert_eq!(Cell::Float(3.0).as_display(), "3");
        assert_eq!(Cell::Float(3.25).as_display(), "3.25");
        let date = NaiveDate::from_ymd_opt(1991, 4, 5).unwrap();
        assert_eq!(Cell::Date(date).as_display(), "1991-04-05");
        assert_eq!(Cell::Boolean(false).as_display(), "false");
    }

    #[test]
    fn parse_number_rejects_non_finite_spellings() {
        assert_eq!(parse_number(" 4.5 "), Some(4.5));
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn is_integral_guards_range() {
        assert!(is_integral(42.0));
        assert!(!is_integral(42.5));
        assert!(!is_integral(1.0e19));
    }
}

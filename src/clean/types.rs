//! Column-wide type optimization: text→numeric promotion, float→integer
//! narrowing and yes/no→boolean coercion. Each decision rewrites the whole
//! column and is never revisited per value.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::{
    data::{Cell, ColumnType, is_integral, parse_number},
    frame::{Column, Frame},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeChange {
    PromotedToNumeric { column: String, unparsable: usize },
    NarrowedToInteger { column: String },
    CoercedToBoolean { column: String },
}

pub fn optimize_types(
    frame: &mut Frame,
    promotion_ratio: f64,
    vocabulary: &BTreeMap<String, bool>,
) -> Vec<TypeChange> {
    let mut changes = Vec::new();
    for column in frame.columns_mut() {
        if let Some(unparsable) = promote_numeric(column, promotion_ratio) {
            changes.push(TypeChange::PromotedToNumeric {
                column: column.name.clone(),
                unparsable,
            });
        }
        if narrow_integers(column) {
            changes.push(TypeChange::NarrowedToInteger {
                column: column.name.clone(),
            });
        }
    }
    for column in frame.columns_mut() {
        if coerce_boolean(column, vocabulary) {
            changes.push(TypeChange::CoercedToBoolean {
                column: column.name.clone(),
            });
        }
    }
    changes
}

/// Converts a text column to `Float` when strictly more than `ratio` of its
/// non-missing cells parse as numbers. Returns how many cells could not be
/// parsed and became unknown.
pub fn promote_numeric(column: &mut Column, ratio: f64) -> Option<usize> {
    if column.datatype != ColumnType::Text {
        return None;
    }
    let present = column.non_missing_count();
    if present == 0 {
        return None;
    }
    let parseable = column
        .non_missing()
        .filter_map(Cell::as_text)
        .filter(|text| parse_number(text).is_some())
        .count();
    let share = parseable as f64 / present as f64;
    if share <= ratio {
        return None;
    }
    debug!(
        "Promoting '{}' to numeric ({parseable}/{present} parseable)",
        column.name
    );
    for cell in &mut column.cells {
        *cell = cell
            .as_ref()
            .and_then(Cell::as_text)
            .and_then(parse_number)
            .map(Cell::Float);
    }
    column.datatype = ColumnType::Float;
    Some(present - parseable)
}

/// Narrows a `Float` column whose known values are all whole numbers.
pub fn narrow_integers(column: &mut Column) -> bool {
    if column.datatype != ColumnType::Float {
        return false;
    }
    let integral = {
        let mut values = column.non_missing().filter_map(Cell::as_f64).peekable();
        values.peek().is_some() && values.all(is_integral)
    };
    if !integral {
        return false;
    }
    for cell in &mut column.cells {
        if let Some(Cell::Float(value)) = cell {
            *cell = Some(Cell::Integer(*value as i64));
        }
    }
    column.datatype = ColumnType::Integer;
    true
}

/// Coerces a text column whose distinct values all belong to `vocabulary`.
pub fn coerce_boolean(column: &mut Column, vocabulary: &BTreeMap<String, bool>) -> bool {
    if column.datatype != ColumnType::Text {
        return false;
    }
    let distinct = column
        .non_missing()
        .filter_map(Cell::as_text)
        .map(str::to_lowercase)
        .collect::<HashSet<_>>();
    if distinct.is_empty() || !distinct.iter().all(|value| vocabulary.contains_key(value)) {
        return false;
    }
    for cell in &mut column.cells {
        *cell = cell
            .as_ref()
            .and_then(Cell::as_text)
            .and_then(|text| vocabulary.get(&text.to_lowercase()).copied())
            .map(Cell::Boolean);
    }
    column.datatype = ColumnType::Boolean;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn text_column(name: &str, values: &[&str]) -> Column {
        Column::new(
            name,
            ColumnType::Text,
            values
                .iter()
                .map(|v| Some(Cell::Text(v.to_string())))
                .collect(),
        )
    }

    #[test]
    fn mostly_numeric_text_is_promoted_with_one_unknown() {
        let mut column = text_column("proof_cut", &["3", "4", "?", "5"]);
        assert_eq!(promote_numeric(&mut column, 0.5), Some(1));
        assert_eq!(column.datatype, ColumnType::Float);
        assert_eq!(
            column.cells,
            vec![
                Some(Cell::Float(3.0)),
                Some(Cell::Float(4.0)),
                None,
                Some(Cell::Float(5.0))
            ]
        );
    }

    #[test]
    fn half_numeric_text_stays_text() {
        let mut column = text_column("mixed", &["1", "a", "2", "b"]);
        assert_eq!(promote_numeric(&mut column, 0.5), None);
        assert_eq!(column.datatype, ColumnType::Text);
    }

    #[test]
    fn whole_floats_narrow_and_keep_unknown() {
        let mut column = Column::new(
            "press",
            ColumnType::Float,
            vec![Some(Cell::Float(3.0)), Some(Cell::Float(4.0)), None],
        );
        assert!(narrow_integers(&mut column));
        assert_eq!(column.datatype, ColumnType::Integer);
        assert_eq!(
            column.cells,
            vec![Some(Cell::Integer(3)), Some(Cell::Integer(4)), None]
        );
    }

    #[test]
    fn fractional_or_empty_float_columns_do_not_narrow() {
        let mut fractional = Column::new(
            "viscosity",
            ColumnType::Float,
            vec![Some(Cell::Float(3.0)), Some(Cell::Float(4.5))],
        );
        assert!(!narrow_integers(&mut fractional));
        let mut empty = Column::new("empty", ColumnType::Float, vec![None, None]);
        assert!(!narrow_integers(&mut empty));
    }

    #[test]
    fn yes_no_columns_become_boolean() {
        let vocabulary = PipelineConfig::default().boolean_vocabulary;
        let mut column = Column::new(
            "grain_screened",
            ColumnType::Text,
            vec![
                Some(Cell::Text("yes".into())),
                None,
                Some(Cell::Text("NO".into())),
            ],
        );
        assert!(coerce_boolean(&mut column, &vocabulary));
        assert_eq!(
            column.cells,
            vec![Some(Cell::Boolean(true)), None, Some(Cell::Boolean(false))]
        );

        let mut other = text_column("band_type", &["yes", "maybe"]);
        assert!(!coerce_boolean(&mut other, &vocabulary));
    }

    #[test]
    fn optimize_types_reports_promotion_then_narrowing() {
        let mut frame = Frame::new(vec![
            text_column("press", &["802", "813", "?"]),
            text_column("ink", &["yes", "no", "yes"]),
        ])
        .unwrap();
        let changes = optimize_types(
            &mut frame,
            0.5,
            &PipelineConfig::default().boolean_vocabulary,
        );
        assert_eq!(
            changes,
            vec![
                TypeChange::PromotedToNumeric {
                    column: "press".into(),
                    unparsable: 1
                },
                TypeChange::NarrowedToInteger {
                    column: "press".into()
                },
                TypeChange::CoercedToBoolean {
                    column: "ink".into()
                },
            ]
        );
    }
}

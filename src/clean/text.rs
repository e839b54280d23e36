use std::collections::BTreeMap;

use crate::{
    data::{Cell, ColumnType},
    frame::Frame,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSummary {
    pub columns: usize,
    pub collapsed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedReplacement {
    pub column: String,
    pub from: String,
    pub to: String,
    pub cells: usize,
}

/// Lower-cases and trims every text cell. Cells whose canonical form is empty
/// or one of `unknown_literals` (such as `nan`) become unknown.
pub fn canonicalize_text(frame: &mut Frame, unknown_literals: &[String]) -> TextSummary {
    let mut summary = TextSummary::default();
    for column in frame.columns_mut() {
        if column.datatype != ColumnType::Text {
            continue;
        }
        summary.columns += 1;
        for cell in &mut column.cells {
            let Some(Cell::Text(text)) = cell else {
                continue;
            };
            let canonical = text.trim().to_lowercase();
            if canonical.is_empty()
                || unknown_literals.iter().any(|literal| *literal == canonical)
            {
                *cell = None;
                summary.collapsed += 1;
            } else {
                *text = canonical;
            }
        }
    }
    summary
}

/// Applies exact per-column text substitutions, reporting only those that hit.
pub fn apply_value_replacements(
    frame: &mut Frame,
    replacements: &BTreeMap<String, BTreeMap<String, String>>,
) -> Vec<AppliedReplacement> {
    let mut applied = Vec::new();
    for (column_name, mapping) in replacements {
        let Some(column) = frame.column_mut(column_name) else {
            continue;
        };
        if column.datatype != ColumnType::Text {
            continue;
        }
        for (from, to) in mapping {
            let mut hits = 0usize;
            for cell in &mut column.cells {
                if let Some(Cell::Text(text)) = cell
                    && text == from
                {
                    *text = to.clone();
                    hits += 1;
                }
            }
            if hits > 0 {
                applied.push(AppliedReplacement {
                    column: column_name.clone(),
                    from: from.clone(),
                    to: to.clone(),
                    cells: hits,
                });
            }
        }
    }
    applied
}

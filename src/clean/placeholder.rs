use crate::{data::Cell, frame::Frame};

/// Replaces every text cell exactly equal to `token` with the unknown marker
/// and returns how many cells were replaced.
pub fn normalize_placeholders(frame: &mut Frame, token: &str) -> usize {
    let mut replaced = 0usize;
    for column in frame.columns_mut() {
        for cell in &mut column.cells {
            if matches!(cell, Some(Cell::Text(text)) if text == token) {
                *cell = None;
                replaced += 1;
            }
        }
    }
    replaced
}

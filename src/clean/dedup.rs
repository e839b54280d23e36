use std::collections::HashSet;

use crate::frame::Frame;

/// Drops exact duplicate rows, keeping the first occurrence. Returns the
/// number of rows removed.
pub fn deduplicate_rows(frame: &mut Frame) -> usize {
    let keep = {
        let mut seen = HashSet::with_capacity(frame.row_count());
        (0..frame.row_count())
            .map(|row_idx| seen.insert(frame.row(row_idx)))
            .collect::<Vec<_>>()
    };
    let removed = keep.iter().filter(|flag| !**flag).count();
    if removed > 0 {
        frame.retain_rows(&keep);
    }
    removed
}

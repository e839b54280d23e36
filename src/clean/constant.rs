use crate::frame::Frame;

/// Columns with at most one distinct non-missing value.
pub fn constant_columns(frame: &Frame) -> Vec<String> {
    frame
        .columns()
        .iter()
        .filter(|column| column.distinct_non_missing() <= 1)
        .map(|column| column.name.clone())
        .collect()
}

pub fn drop_constant_columns(frame: &mut Frame) -> Vec<String> {
    let constant = constant_columns(frame);
    if constant.is_empty() {
        return constant;
    }
    frame.drop_columns(&constant)
}

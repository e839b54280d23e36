use anyhow::{Context, Result};

use crate::{
    cli::FrequencyArgs,
    classify::AttributeKind,
    data::format_float,
    search::resolve_attribute,
    store::{EavStore, NumericSummary},
    table,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeProfile {
    Counts { total: i64, values: Vec<(String, i64)> },
    Summary(Option<NumericSummary>),
}

pub fn profile_attribute(
    store: &EavStore,
    attribute: &str,
    top: usize,
) -> Result<AttributeProfile> {
    let (kind, id) = resolve_attribute(store, attribute)?;
    match kind {
        AttributeKind::String => {
            let total = store
                .value_counts(id, 0)
                .with_context(|| format!("Counting values of '{attribute}'"))?
                .iter()
                .map(|(_, count)| count)
                .sum();
            let values = store
                .value_counts(id, top)
                .with_context(|| format!("Counting values of '{attribute}'"))?;
            Ok(AttributeProfile::Counts { total, values })
        }
        AttributeKind::Numeric => {
            let summary = store
                .numeric_summary(id)
                .with_context(|| format!("Summarizing '{attribute}'"))?;
            Ok(AttributeProfile::Summary(summary))
        }
    }
}

pub fn render_rows(attribute: &str, profile: &AttributeProfile) -> (Vec<String>, Vec<Vec<String>>) {
    match profile {
        AttributeProfile::Counts { total, values } => {
            let headers = ["attribute", "value", "count", "percent"]
                .map(String::from)
                .to_vec();
            let rows = values
                .iter()
                .map(|(value, count)| {
                    let percent = if *total > 0 {
                        (*count as f64 / *total as f64) * 100.0
                    } else {
                        0.0
                    };
                    vec![
                        attribute.to_string(),
                        value.clone(),
                        count.to_string(),
                        format!("{percent:.2}%"),
                    ]
                })
                .collect();
            (headers, rows)
        }
        AttributeProfile::Summary(summary) => {
            let headers = ["attribute", "count", "min", "max", "mean"]
                .map(String::from)
                .to_vec();
            let row = match summary {
                Some(summary) => vec![
                    attribute.to_string(),
                    summary.count.to_string(),
                    format_float(summary.min),
                    format_float(summary.max),
                    format_number(summary.mean),
                ],
                None => vec![
                    attribute.to_string(),
                    "0".to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                ],
            };
            (headers, vec![row])
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

pub fn execute(args: &FrequencyArgs) -> Result<()> {
    let store = crate::open_existing_store(&args.db)?;
    let profile = profile_attribute(&store, &args.attribute, args.top)?;
    let (headers, rows) = render_rows(&args.attribute, &profile);
    table::print_table(&headers, &rows);
    Ok(())
}

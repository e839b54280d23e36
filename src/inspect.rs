use anyhow::{Context, Result};

use crate::{
    cli::InspectArgs,
    data::format_float,
    store::{EavStore, RunDetail},
    table,
};

pub fn run_detail(store: &EavStore, run_id: i64) -> Result<RunDetail> {
    Ok(store.run_detail(run_id)?)
}

/// One row per attribute, string attributes first, each group by name.
pub fn detail_rows(detail: &RunDetail) -> Vec<Vec<String>> {
    let timestamp = vec![
        "timestamp".to_string(),
        "-".to_string(),
        detail.timestamp.clone().unwrap_or_default(),
    ];
    let strings = detail
        .strings
        .iter()
        .map(|(name, value)| vec![name.clone(), "string".to_string(), value.clone()]);
    let numerics = detail
        .numerics
        .iter()
        .map(|(name, value)| vec![name.clone(), "numeric".to_string(), format_float(*value)]);
    std::iter::once(timestamp)
        .chain(strings)
        .chain(numerics)
        .collect()
}

pub fn execute(args: &InspectArgs) -> Result<()> {
    let store = crate::open_existing_store(&args.db)?;
    let detail = run_detail(&store, args.run_id)?;
    if args.json {
        let json = serde_json::to_string_pretty(&detail).context("Serializing run detail")?;
        println!("{json}");
    } else {
        let headers = vec![
            "attribute".to_string(),
            "kind".to_string(),
            "value".to_string(),
        ];
        table::print_table(&headers, &detail_rows(&detail));
    }
    Ok(())
}

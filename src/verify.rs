use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::{
    cli::VerifyArgs,
    config::PipelineConfig,
    store::{EavStore, StoredValue, TableCounts},
    table,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotCheckResult {
    pub run_id: i64,
    pub attribute: String,
    pub value: Option<StoredValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub counts: TableCounts,
    pub spot_check: SpotCheckResult,
}

pub fn verify(store: &EavStore, run_id: i64, attribute: &str) -> Result<VerificationReport> {
    let counts = store.table_counts().context("Counting table rows")?;
    let value = store
        .value_for(run_id, attribute)
        .with_context(|| format!("Spot-checking run {run_id} attribute '{attribute}'"))?;
    Ok(VerificationReport {
        counts,
        spot_check: SpotCheckResult {
            run_id,
            attribute: attribute.to_string(),
            value,
        },
    })
}

pub fn log_report(report: &VerificationReport) {
    for (table, rows) in report.counts.rows() {
        info!("Table {table}: {rows} row(s)");
    }
    let check = &report.spot_check;
    match &check.value {
        Some(value) => info!(
            "Spot check: run {} {} = '{value}'",
            check.run_id, check.attribute
        ),
        None => warn!(
            "Spot check: run {} has no value for '{}'",
            check.run_id, check.attribute
        ),
    }
}

pub fn render_report(report: &VerificationReport) -> String {
    let headers = vec!["table".to_string(), "rows".to_string()];
    let rows = report
        .counts
        .rows()
        .iter()
        .map(|(table, count)| vec![table.to_string(), count.to_string()])
        .collect::<Vec<_>>();
    let mut output = table::render_table(&headers, &rows);
    let check = &report.spot_check;
    let value = check
        .value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<none>".to_string());
    output.push('\n');
    output.push_str(&format!(
        "spot check: run {} {} = {value}\n",
        check.run_id, check.attribute
    ));
    output
}

pub fn execute(args: &VerifyArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let store = crate::open_existing_store(&args.db)?;
    let run_id = args.run_id.unwrap_or(config.spot_check.run_id);
    let attribute = args
        .attribute
        .as_deref()
        .unwrap_or(config.spot_check.attribute.as_str());
    let report = verify(&store, run_id, attribute)?;
    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .context("Serializing verification report")?;
        println!("{json}");
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

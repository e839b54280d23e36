//! Wide reconstruction of the EAV tables: one row per run, one column per
//! registered attribute, unknown cells as empty fields.

use anyhow::{Context, Result};
use log::info;

use crate::{cli::ExportArgs, io_utils, store::WideTable};

pub fn wide_headers(table: &WideTable) -> Vec<String> {
    ["run_id", "timestamp"]
        .into_iter()
        .map(String::from)
        .chain(table.attributes.iter().map(|(_, name)| name.clone()))
        .collect()
}

pub fn wide_records(table: &WideTable) -> impl Iterator<Item = Vec<String>> + '_ {
    table.runs.iter().map(|run| {
        [run.run_id.to_string(), run.timestamp.clone().unwrap_or_default()]
            .into_iter()
            .chain(
                run.values
                    .iter()
                    .map(|value| value.as_ref().map(ToString::to_string).unwrap_or_default()),
            )
            .collect()
    })
}

pub fn execute(args: &ExportArgs) -> Result<()> {
    let store = crate::open_existing_store(&args.db)?;
    let table = store.reconstruct().context("Reconstructing wide table")?;
    let delimiter = match (&args.output, args.delimiter) {
        (_, Some(delimiter)) => delimiter,
        (Some(path), None) => io_utils::resolve_input_delimiter(path, None),
        (None, None) => b',',
    };
    let mut writer = io_utils::open_csv_writer(args.output.as_deref(), delimiter)?;
    writer
        .write_record(wide_headers(&table))
        .context("Writing output headers")?;
    for (idx, record) in wide_records(&table).enumerate() {
        writer
            .write_record(&record)
            .with_context(|| format!("Writing output row {}", idx + 2))?;
    }
    writer.flush().context("Flushing output writer")?;
    info!(
        "Exported {} run(s) x {} attribute(s)",
        table.runs.len(),
        table.attributes.len()
    );
    Ok(())
}

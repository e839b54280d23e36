//! Single-process clean → load → verify. The cleaned frame is frozen once and
//! handed to the loader in memory, so run ids come from the same row order
//! the cleaned CSV is written in.

use anyhow::{Context, Result};
use log::info;

use crate::{
    classify::Classification,
    clean::{self, CleaningOutcome},
    cli::RunArgs,
    config::PipelineConfig,
    frame::Frame,
    io_utils,
    load::{self, LoadSummary},
    report::CleaningReport,
    store::EavStore,
    verify::{self, VerificationReport},
};

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub report: CleaningReport,
    pub classification: Classification,
    pub load: LoadSummary,
    pub verification: VerificationReport,
}

/// Cleans `frame`, loads it into `store` and verifies the result. The cleaned
/// frame is passed to `on_cleaned` before it is frozen.
pub fn run_pipeline(
    frame: Frame,
    store: &EavStore,
    config: &PipelineConfig,
    source: &str,
    on_cleaned: impl FnOnce(&Frame) -> Result<()>,
) -> Result<PipelineOutcome> {
    let CleaningOutcome { frame, report } = clean::clean_frame(frame, config, source);
    on_cleaned(&frame)?;
    let table = frame.freeze(&config.timestamp_column);
    let (classification, load) = load::load_into(store, &table, config)?;
    let verification = verify::verify(
        store,
        config.spot_check.run_id,
        &config.spot_check.attribute,
    )?;
    Ok(PipelineOutcome {
        report,
        classification,
        load,
        verification,
    })
}

pub fn execute(args: &RunArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let frame = clean::read_raw_frame(
        &args.input,
        args.delimiter,
        args.input_encoding.as_deref(),
        &config,
    )?;
    let store = load::open_store(&args.db, args.replace)?;
    let source = args.input.display().to_string();
    let outcome = run_pipeline(frame, &store, &config, &source, |cleaned| {
        if let Some(path) = &args.output {
            let delimiter = io_utils::resolve_input_delimiter(path, None);
            cleaned
                .write_csv(Some(path), delimiter)
                .with_context(|| format!("Writing cleaned CSV to {path:?}"))?;
            info!("Cleaned CSV written to {path:?}");
        }
        Ok(())
    })?;
    outcome
        .report
        .write_to(&args.report)
        .with_context(|| format!("Writing cleaning report to {:?}", args.report))?;
    info!(
        "Loaded {} run(s), {} string value(s), {} numeric value(s)",
        outcome.load.runs, outcome.load.string_values, outcome.load.numeric_values
    );
    verify::log_report(&outcome.verification);
    Ok(())
}

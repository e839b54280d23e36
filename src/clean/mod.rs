//! Cleaning pipeline over a raw run export.
//!
//! Phases run in a fixed order over one in-memory [`Frame`]:
//!
//! 1. placeholder tokens → unknown
//! 2. compact `YYYYMMDD` timestamps → dates
//! 3. constant columns dropped
//! 4. text lower-cased/trimmed, `nan` literals → unknown, configured
//!    replacements applied
//! 5. fuzzy near-duplicate repair of one categorical column
//! 6. type optimization (numeric promotion, integer narrowing, booleans)
//! 7. exact duplicate rows dropped
//!
//! Each phase appends its outcome to the [`CleaningReport`].

pub mod constant;
pub mod dedup;
pub mod fuzzy;
pub mod placeholder;
pub mod temporal;
pub mod text;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    cli::CleanArgs,
    config::PipelineConfig,
    frame::Frame,
    io_utils,
    report::{CleaningReport, ReportTag},
};

use self::{
    fuzzy::FuzzyResolver,
    temporal::DateEncoding,
    types::TypeChange,
};

#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub frame: Frame,
    pub report: CleaningReport,
}

pub fn clean_frame(mut frame: Frame, config: &PipelineConfig, source: &str) -> CleaningOutcome {
    let mut report = CleaningReport::new(source, frame.row_count(), frame.column_count());

    let replaced = placeholder::normalize_placeholders(&mut frame, &config.placeholder);
    info!("Replaced {replaced} '{}' placeholder cell(s)", config.placeholder);
    report.push(
        ReportTag::NullManagement,
        format!(
            "{replaced} '{}' placeholder cell(s) set to unknown.",
            config.placeholder
        ),
    );

    match temporal::normalize_dates(&mut frame, &config.timestamp_column, DateEncoding::Compact) {
        Some(conversion) => {
            debug!(
                "Parsed {} timestamp(s); {} unparsable",
                conversion.parsed, conversion.unknown
            );
            report.push(
                ReportTag::Schema,
                format!(
                    "'{}' column converted {} -> Date (YYYY-MM-DD).",
                    config.timestamp_column, conversion.from
                ),
            );
        }
        None => warn!(
            "Timestamp column '{}' not found; runs will carry no timestamp",
            config.timestamp_column
        ),
    }

    let dropped = constant::drop_constant_columns(&mut frame);
    if !dropped.is_empty() {
        info!("Dropped {} constant column(s)", dropped.len());
        report.push(
            ReportTag::Schema,
            format!(
                "Constant columns without variation dropped: [{}]",
                dropped.iter().map(|name| format!("'{name}'")).join(", ")
            ),
        );
    }

    let summary = text::canonicalize_text(&mut frame, &config.unknown_literals);
    debug!(
        "Canonicalized {} text column(s); {} blank or unknown cell(s) collapsed",
        summary.columns, summary.collapsed
    );
    report.push(
        ReportTag::TextNormalization,
        "All text lower-cased and surrounding whitespace trimmed.",
    );
    for applied in text::apply_value_replacements(&mut frame, &config.value_replacements) {
        report.push(
            ReportTag::TypoCleanup,
            format!(
                "Configured replacement in '{}': '{}' -> '{}' ({} cell(s)).",
                applied.column, applied.from, applied.to, applied.cells
            ),
        );
    }

    if let Some(column_name) = config.fuzzy.column.as_deref() {
        resolve_fuzzy_duplicates(&mut frame, config, column_name, &mut report);
    }

    for change in types::optimize_types(
        &mut frame,
        config.numeric_promotion_ratio,
        &config.boolean_vocabulary,
    ) {
        match change {
            TypeChange::PromotedToNumeric { column, unparsable } => {
                debug!("'{column}' promoted to numeric; {unparsable} unparsable cell(s)");
                report.push(
                    ReportTag::Schema,
                    format!("'{column}' column coerced to numeric (Float)."),
                );
            }
            TypeChange::NarrowedToInteger { column } => report.push(
                ReportTag::Optimize,
                format!("'{column}' column narrowed Float -> nullable Integer."),
            ),
            TypeChange::CoercedToBoolean { column } => report.push(
                ReportTag::Schema,
                format!("'{column}' column fixed to Boolean."),
            ),
        }
    }

    let removed = dedup::deduplicate_rows(&mut frame);
    if removed > 0 {
        info!("Removed {removed} duplicate row(s)");
        report.push(
            ReportTag::Cleanup,
            format!("{removed} duplicate row(s) removed."),
        );
    }

    report.finish(frame.row_count(), frame.column_count());
    CleaningOutcome { frame, report }
}

fn resolve_fuzzy_duplicates(
    frame: &mut Frame,
    config: &PipelineConfig,
    column_name: &str,
    report: &mut CleaningReport,
) {
    let Some(column) = frame.column_mut(column_name) else {
        debug!("Fuzzy column '{column_name}' not present; skipping typo repair");
        return;
    };
    report.push(
        ReportTag::TypoCleanup,
        format!("Running fuzzy matching on the '{column_name}' column..."),
    );
    let strategy = config.fuzzy.metric.strategy();
    let resolver = FuzzyResolver::new(
        strategy.as_ref(),
        config.fuzzy.threshold,
        config.fuzzy.max_matches,
    );
    let corrections = resolver.resolve(column);
    if corrections.is_empty() {
        debug!("No near-duplicate spellings found in '{column_name}'");
    }
    for correction in corrections {
        debug!(
            "'{}' ({}) -> '{}' ({}) at similarity {:.3}",
            correction.from,
            correction.from_count,
            correction.to,
            correction.to_count,
            correction.score
        );
        report.push_detail(format!(
            "Typo corrected: '{}' -> '{}'",
            correction.from, correction.to
        ));
    }
}

/// Reads a raw export with the configured header renames applied.
pub fn read_raw_frame(
    path: &Path,
    delimiter: Option<u8>,
    encoding: Option<&str>,
    config: &PipelineConfig,
) -> Result<Frame> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let encoding = io_utils::resolve_encoding(encoding)?;
    info!(
        "Reading '{}' with delimiter '{}'",
        path.display(),
        crate::printable_delimiter(delimiter)
    );
    Frame::read_csv(path, delimiter, encoding, &config.column_renames)
        .with_context(|| format!("Reading raw export {path:?}"))
}

pub fn execute(args: &CleanArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let frame = read_raw_frame(
        &args.input,
        args.delimiter,
        args.input_encoding.as_deref(),
        &config,
    )?;
    let source = args.input.display().to_string();
    let CleaningOutcome { frame, report } = clean_frame(frame, &config, &source);

    let output_delimiter = io_utils::resolve_input_delimiter(
        args.output.as_deref().unwrap_or(args.input.as_path()),
        args.output_delimiter,
    );
    frame
        .write_csv(args.output.as_deref(), output_delimiter)
        .context("Writing cleaned CSV")?;
    report
        .write_to(&args.report)
        .with_context(|| format!("Writing cleaning report to {:?}", args.report))?;
    info!(
        "Cleaned {} row(s) x {} column(s); report written to {:?}",
        frame.row_count(),
        frame.column_count(),
        args.report
    );
    Ok(())
}

//! EAV loader: one run per row of the frozen table, one fact per known cell.
//!
//! Every attribute id is resolved against the registry before anything is
//! written. Runs, string facts and numeric facts are then written in three
//! passes over the same [`RunTable`], committing every `batch_size` rows.
//! A failure rolls back only the open batch.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, anyhow};
use encoding_rs::UTF_8;
use log::{debug, info};
use serde::Serialize;

use crate::{
    classify::{self, AttributeKind, Classification},
    cli::LoadArgs,
    clean::temporal::{self, DateEncoding},
    config::PipelineConfig,
    frame::{Frame, RunTable},
    io_utils,
    registry::Registry,
    store::{AttributeId, EavStore, StoreError, ValueBatch},
    verify,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub runs: usize,
    pub string_values: usize,
    pub numeric_values: usize,
    pub batches: usize,
}

/// Holds at most one open batch and commits it whenever it reaches the
/// configured size.
struct CommitWindow<'s> {
    store: &'s EavStore,
    batch: Option<ValueBatch<'s>>,
    size: usize,
    batches: usize,
}

impl<'s> CommitWindow<'s> {
    fn new(store: &'s EavStore, size: usize) -> Self {
        Self {
            store,
            batch: None,
            size: size.max(1),
            batches: 0,
        }
    }

    fn batch(&mut self) -> Result<&mut ValueBatch<'s>, StoreError> {
        let batch = match self.batch.take() {
            Some(batch) => batch,
            None => self.store.begin_batch()?,
        };
        Ok(self.batch.insert(batch))
    }

    fn checkpoint(&mut self) -> Result<(), StoreError> {
        if self
            .batch
            .as_ref()
            .is_some_and(|batch| batch.pending() >= self.size)
        {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if let Some(batch) = self.batch.take() {
            let written = batch.commit()?;
            self.batches += 1;
            debug!("Committed batch {} ({written} row(s))", self.batches);
        }
        Ok(())
    }
}

pub fn load_table(
    store: &EavStore,
    table: &RunTable,
    classification: &Classification,
    registry: &Registry,
    batch_size: usize,
) -> Result<LoadSummary> {
    let resolve = |kind: AttributeKind| -> Result<Vec<(usize, AttributeId)>> {
        classification
            .of_kind(kind)
            .map(|column| -> Result<(usize, AttributeId)> {
                let id = registry.lookup(&column.name, kind)?;
                Ok((column.index, id))
            })
            .collect()
    };
    let string_targets = resolve(AttributeKind::String)?;
    let numeric_targets = resolve(AttributeKind::Numeric)?;

    let mut window = CommitWindow::new(store, batch_size);
    let mut summary = LoadSummary::default();

    for row in table.rows() {
        window
            .batch()?
            .insert_run(row.id(), row.timestamp())
            .with_context(|| format!("Inserting run {}", row.id()))?;
        window.checkpoint()?;
        summary.runs += 1;
    }
    window.flush()?;
    info!("Inserted {} run(s)", summary.runs);

    for row in table.rows() {
        for &(column_idx, attribute) in &string_targets {
            let Some(cell) = row.cell(column_idx) else {
                continue;
            };
            window
                .batch()?
                .insert_text(row.id(), attribute, &cell.as_display())
                .with_context(|| {
                    format!("Inserting string value for run {} attribute {attribute}", row.id())
                })?;
            window.checkpoint()?;
            summary.string_values += 1;
        }
    }
    window.flush()?;
    info!("Inserted {} string value(s)", summary.string_values);

    for row in table.rows() {
        for &(column_idx, attribute) in &numeric_targets {
            let Some(cell) = row.cell(column_idx) else {
                continue;
            };
            let value = cell.as_f64().ok_or_else(|| {
                anyhow!(
                    "Run {} holds non-numeric value '{cell}' for numeric attribute {attribute}",
                    row.id()
                )
            })?;
            window
                .batch()?
                .insert_number(row.id(), attribute, value)
                .with_context(|| {
                    format!("Inserting numeric value for run {} attribute {attribute}", row.id())
                })?;
            window.checkpoint()?;
            summary.numeric_values += 1;
        }
    }
    window.flush()?;
    info!("Inserted {} numeric value(s)", summary.numeric_values);

    summary.batches = window.batches;
    Ok(summary)
}

/// Classifies the table, registers its attributes and loads it.
pub fn load_into(
    store: &EavStore,
    table: &RunTable,
    config: &PipelineConfig,
) -> Result<(Classification, LoadSummary)> {
    let classification = classify::classify_columns(table.columns(), config);
    info!(
        "Classified {} string and {} numeric attribute(s)",
        classification.names(AttributeKind::String).len(),
        classification.names(AttributeKind::Numeric).len()
    );
    let mut registry = Registry::from_store(store).context("Reading attribute dictionary")?;
    registry
        .register_all(store, &classification)
        .context("Registering attributes")?;
    let summary = load_table(
        store,
        table,
        &classification,
        &registry,
        config.commit_batch_size,
    )?;
    Ok((classification, summary))
}

/// Reads a cleaned CSV back into a frozen table. Dates in the timestamp
/// column are expected in ISO form.
pub fn read_cleaned_table(
    path: &Path,
    delimiter: Option<u8>,
    config: &PipelineConfig,
) -> Result<RunTable> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let mut frame = Frame::read_csv(path, delimiter, UTF_8, &BTreeMap::new())
        .with_context(|| format!("Reading cleaned CSV {path:?}"))?;
    if let Some(conversion) =
        temporal::normalize_dates(&mut frame, &config.timestamp_column, DateEncoding::Iso)
    {
        debug!(
            "Parsed {} timestamp(s); {} unparsable",
            conversion.parsed, conversion.unknown
        );
    }
    Ok(frame.freeze(&config.timestamp_column))
}

pub fn open_store(path: &Path, replace: bool) -> Result<EavStore> {
    let mut store =
        EavStore::open(path).with_context(|| format!("Opening EAV database {path:?}"))?;
    if replace {
        info!("Clearing existing runs from {path:?}");
        store.clear_runs().context("Clearing existing runs")?;
    }
    Ok(store)
}

pub fn execute(args: &LoadArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let table = read_cleaned_table(&args.input, args.delimiter, &config)?;
    info!(
        "Loading {} run(s) from {:?} into {:?}",
        table.len(),
        args.input,
        args.db
    );
    let store = open_store(&args.db, args.replace)?;
    let (_, summary) = load_into(&store, &table, &config)?;
    info!(
        "Loaded {} run(s), {} string value(s), {} numeric value(s) in {} batch(es)",
        summary.runs, summary.string_values, summary.numeric_values, summary.batches
    );
    let report = verify::verify(&store, config.spot_check.run_id, &config.spot_check.attribute)?;
    verify::log_report(&report);
    Ok(())
}

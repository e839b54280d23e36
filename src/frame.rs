//! Column-major in-memory table used by the cleaning phases, and the frozen,
//! id-carrying [`RunTable`] handed to everything downstream of cleaning.
//!
//! Cells are `Option<Cell>`: `None` is the single unknown marker. Reading a CSV
//! maps empty fields to `None` and infers a column type the way a dataframe
//! reader would (integers, then floats, then `true`/`false`, else text).
//!
//! Row order becomes identity exactly once, in [`Frame::freeze`]. After that the
//! registry pass, the entity pass and both value passes all read the same
//! immutable sequence of [`RunRow`]s, each carrying its [`RunId`].

use std::{collections::BTreeMap, collections::HashSet, fmt, path::Path};

use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDate;
use encoding_rs::Encoding;
use log::debug;
use serde::Serialize;

use crate::{
    data::{Cell, ColumnType, parse_boolean_literal, parse_integer, parse_number},
    io_utils,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: ColumnType,
    pub cells: Vec<Option<Cell>>,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: ColumnType, cells: Vec<Option<Cell>>) -> Self {
        Self {
            name: name.into(),
            datatype,
            cells,
        }
    }

    /// Builds a typed column from raw text, empty fields becoming unknown.
    pub fn from_raw(name: impl Into<String>, raw: Vec<Option<String>>) -> Self {
        let datatype = infer_column_type(&raw);
        let cells = raw
            .into_iter()
            .map(|value| value.and_then(|text| convert_raw(text, datatype)))
            .collect();
        Self::new(name, datatype, cells)
    }

    pub fn non_missing(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    pub fn non_missing_count(&self) -> usize {
        self.non_missing().count()
    }

    pub fn distinct_non_missing(&self) -> usize {
        self.non_missing().collect::<HashSet<_>>().len()
    }
}

fn infer_column_type(raw: &[Option<String>]) -> ColumnType {
    let present = raw.iter().flatten().collect::<Vec<_>>();
    if present.is_empty() {
        return ColumnType::Text;
    }
    if present.iter().all(|v| parse_integer(v).is_some()) {
        ColumnType::Integer
    } else if present.iter().all(|v| parse_number(v).is_some()) {
        ColumnType::Float
    } else if present.iter().all(|v| parse_boolean_literal(v).is_some()) {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

fn convert_raw(text: String, datatype: ColumnType) -> Option<Cell> {
    match datatype {
        ColumnType::Integer => parse_integer(&text).map(Cell::Integer),
        ColumnType::Float => parse_number(&text).map(Cell::Float),
        ColumnType::Boolean => parse_boolean_literal(&text).map(Cell::Boolean),
        ColumnType::Text | ColumnType::Date => Some(Cell::Text(text)),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
    row_count: usize,
}

impl Frame {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            ensure!(
                column.cells.len() == row_count,
                "Column '{}' has {} cell(s) but the table has {} row(s)",
                column.name,
                column.cells.len(),
                row_count
            );
            if !seen.insert(column.name.as_str()) {
                bail!("Duplicate column name '{}'", column.name);
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Builds a frame from textual records, inferring column types. Empty
    /// strings are unknown.
    pub fn from_records(headers: &[&str], records: &[Vec<&str>]) -> Result<Self> {
        let mut raw = vec![Vec::with_capacity(records.len()); headers.len()];
        for (row_idx, record) in records.iter().enumerate() {
            ensure!(
                record.len() == headers.len(),
                "Record {} has {} field(s), expected {}",
                row_idx + 1,
                record.len(),
                headers.len()
            );
            for (col_idx, value) in record.iter().enumerate() {
                raw[col_idx].push((!value.is_empty()).then(|| value.to_string()));
            }
        }
        let columns = headers
            .iter()
            .zip(raw)
            .map(|(name, values)| Column::from_raw(*name, values))
            .collect();
        Self::new(columns)
    }

    pub fn read_csv(
        path: &Path,
        delimiter: u8,
        encoding: &'static Encoding,
        renames: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding)?
            .into_iter()
            .map(|header| {
                let trimmed = header.trim();
                match renames.get(trimmed) {
                    Some(renamed) => {
                        debug!("Renaming column '{trimmed}' -> '{renamed}'");
                        renamed.clone()
                    }
                    None => trimmed.to_string(),
                }
            })
            .collect::<Vec<_>>();

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
            let decoded = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {}", row_idx + 2))?;
            for (col_idx, value) in decoded.into_iter().enumerate() {
                raw[col_idx].push((!value.is_empty()).then_some(value));
            }
        }

        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, values)| Column::from_raw(name, values))
            .collect();
        Self::new(columns).with_context(|| format!("Assembling table from {path:?}"))
    }

    pub fn write_csv(&self, path: Option<&Path>, delimiter: u8) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, delimiter)?;
        writer
            .write_record(self.headers())
            .context("Writing output headers")?;
        for row_idx in 0..self.row_count {
            let record = self.columns.iter().map(|column| {
                column.cells[row_idx]
                    .as_ref()
                    .map(Cell::as_display)
                    .unwrap_or_default()
            });
            writer
                .write_record(record)
                .with_context(|| format!("Writing output row {}", row_idx + 2))?;
        }
        writer.flush().context("Flushing output writer")?;
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Removes the named columns, returning the names actually dropped in
    /// table order.
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let mut dropped = Vec::new();
        self.columns.retain(|column| {
            if names.contains(&column.name) {
                dropped.push(column.name.clone());
                false
            } else {
                true
            }
        });
        dropped
    }

    pub fn row(&self, row_idx: usize) -> Vec<Option<&Cell>> {
        self.columns
            .iter()
            .map(|column| column.cells[row_idx].as_ref())
            .collect()
    }

    /// Keeps the rows whose flag is set, preserving order.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.row_count);
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.cells.retain(|_| flags.next().copied().unwrap_or(false));
        }
        self.row_count = keep.iter().filter(|flag| **flag).count();
    }

    /// Fixes row order as run identity: row `n` (1-based) becomes run `n`.
    /// The timestamp column, when present, moves out of the attribute columns
    /// into each row's timestamp.
    pub fn freeze(self, timestamp_column: &str) -> RunTable {
        let Frame { columns, row_count } = self;
        let (timestamps, attributes): (Vec<Column>, Vec<Column>) = columns
            .into_iter()
            .partition(|column| column.name == timestamp_column);
        let timestamps = timestamps.into_iter().next();

        let headers = attributes
            .iter()
            .map(|column| ColumnHeader {
                name: column.name.clone(),
                datatype: column.datatype,
            })
            .collect();

        let mut attribute_cells = attributes
            .into_iter()
            .map(|column| column.cells.into_iter())
            .collect::<Vec<_>>();
        let mut timestamp_cells = timestamps.map(|column| column.cells.into_iter());

        let mut rows = Vec::with_capacity(row_count);
        for position in 0..row_count {
            let timestamp = match timestamp_cells.as_mut().and_then(|cells| cells.next()) {
                Some(Some(Cell::Date(date))) => Some(date),
                _ => None,
            };
            let cells = attribute_cells
                .iter_mut()
                .map(|cells| cells.next().flatten())
                .collect();
            rows.push(RunRow {
                id: RunId::from_position(position),
                timestamp,
                cells,
            });
        }
        RunTable {
            columns: headers,
            rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunId(pub i64);

impl RunId {
    pub fn from_position(position: usize) -> Self {
        RunId(position as i64 + 1)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub name: String,
    pub datatype: ColumnType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    id: RunId,
    timestamp: Option<NaiveDate>,
    cells: Vec<Option<Cell>>,
}

impl RunRow {
    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn timestamp(&self) -> Option<NaiveDate> {
        self.timestamp
    }

    pub fn cell(&self, column_idx: usize) -> Option<&Cell> {
        self.cells.get(column_idx).and_then(Option::as_ref)
    }
}

/// Immutable, ordered cleaned table. There are no mutating methods: ids are
/// fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTable {
    columns: Vec<ColumnHeader>,
    rows: Vec<RunRow>,
}

impl RunTable {
    pub fn columns(&self) -> &[ColumnHeader] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[RunRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

//! SQLite-backed EAV store.
//!
//! One [`EavStore`] owns one connection and is passed explicitly to every
//! component that reads or writes the database. The schema is created by an
//! embedded migration and versioned through `PRAGMA user_version`.

use std::{collections::BTreeMap, collections::HashMap, fmt, path::Path};

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::Serialize;
use thiserror::Error;

use crate::{
    classify::AttributeKind,
    data::{ISO_DATE_FORMAT, format_float},
    frame::RunId,
};

pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("run {0} not found")]
    RunNotFound(i64),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AttributeId(pub i64);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted fact value as read back from either value table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredValue::Text(text) => f.write_str(text),
            StoredValue::Number(value) => f.write_str(&format_float(*value)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub runs: i64,
    pub string_attributes: i64,
    pub numeric_attributes: i64,
    pub string_values: i64,
    pub numeric_values: i64,
}

impl TableCounts {
    pub fn rows(&self) -> [(&'static str, i64); 5] {
        [
            ("runs", self.runs),
            ("string_attributes", self.string_attributes),
            ("numeric_attributes", self.numeric_attributes),
            ("string_values", self.string_values),
            ("numeric_values", self.numeric_values),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetail {
    pub run_id: i64,
    pub timestamp: Option<String>,
    pub strings: BTreeMap<String, String>,
    pub numerics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub run_id: i64,
    pub timestamp: Option<String>,
    pub value: StoredValue,
}

/// Bounds applied to a numeric attribute search; unset bounds do not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericFilter {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub equals: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: i64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRun {
    pub run_id: i64,
    pub timestamp: Option<String>,
    /// Aligned with [`WideTable::attributes`]; `None` where no fact exists.
    pub values: Vec<Option<StoredValue>>,
}

/// Runs pivoted back into one row per run and one column per attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    pub attributes: Vec<(AttributeKind, String)>,
    pub runs: Vec<WideRun>,
}

fn kind_tables(kind: AttributeKind) -> (&'static str, &'static str) {
    match kind {
        AttributeKind::String => ("string_attributes", "string_values"),
        AttributeKind::Numeric => ("numeric_attributes", "numeric_values"),
    }
}

pub struct EavStore {
    conn: Connection,
}

impl EavStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchemaVersion {
                found: current,
                supported: SCHEMA_VERSION,
            });
        }
        if current < 1 {
            let sql = include_str!("../migrations/0001_eav_schema.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
        }
        Ok(())
    }

    /// Inserts the name into its kind's dictionary unless already present and
    /// returns the (possibly pre-existing) id.
    pub fn upsert_attribute(
        &self,
        kind: AttributeKind,
        name: &str,
    ) -> Result<AttributeId, StoreError> {
        let (attributes, _) = kind_tables(kind);
        self.conn.execute(
            &format!("INSERT OR IGNORE INTO {attributes} (name) VALUES (?1)"),
            params![name],
        )?;
        let id = self.conn.query_row(
            &format!("SELECT attribute_id FROM {attributes} WHERE name = ?1"),
            params![name],
            |row| row.get(0),
        )?;
        Ok(AttributeId(id))
    }

    pub fn find_attribute(
        &self,
        kind: AttributeKind,
        name: &str,
    ) -> Result<Option<AttributeId>, StoreError> {
        let (attributes, _) = kind_tables(kind);
        Ok(self
            .conn
            .query_row(
                &format!("SELECT attribute_id FROM {attributes} WHERE name = ?1"),
                params![name],
                |row| row.get(0),
            )
            .optional()?
            .map(AttributeId))
    }

    pub fn attributes(
        &self,
        kind: AttributeKind,
    ) -> Result<Vec<(AttributeId, String)>, StoreError> {
        let (attributes, _) = kind_tables(kind);
        let mut statement = self.conn.prepare(&format!(
            "SELECT attribute_id, name FROM {attributes} ORDER BY attribute_id"
        ))?;
        let rows = statement.query_map([], |row| Ok((AttributeId(row.get(0)?), row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Removes every run and fact row. The attribute dictionaries are kept so
    /// ids stay stable across reloads.
    pub fn clear_runs(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM string_values", [])?;
        tx.execute("DELETE FROM numeric_values", [])?;
        tx.execute("DELETE FROM runs", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Opens a write transaction borrowing the connection immutably. Only one
    /// batch may be open at a time.
    pub fn begin_batch(&self) -> Result<ValueBatch<'_>, StoreError> {
        Ok(ValueBatch {
            tx: Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)?,
            pending: 0,
        })
    }

    pub fn table_counts(&self) -> Result<TableCounts, StoreError> {
        let count = |table: &str| -> Result<i64, StoreError> {
            Ok(self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        };
        Ok(TableCounts {
            runs: count("runs")?,
            string_attributes: count("string_attributes")?,
            numeric_attributes: count("numeric_attributes")?,
            string_values: count("string_values")?,
            numeric_values: count("numeric_values")?,
        })
    }

    pub fn run_detail(&self, run_id: i64) -> Result<RunDetail, StoreError> {
        let timestamp: Option<String> = self
            .conn
            .query_row(
                "SELECT timestamp FROM runs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::RunNotFound(run_id))?;

        let mut statement = self.conn.prepare(
            "SELECT a.name, v.value FROM string_values v \
             JOIN string_attributes a ON a.attribute_id = v.attribute_id \
             WHERE v.run_id = ?1",
        )?;
        let strings = statement
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<String, String>, _>>()?;

        let mut statement = self.conn.prepare(
            "SELECT a.name, v.value FROM numeric_values v \
             JOIN numeric_attributes a ON a.attribute_id = v.attribute_id \
             WHERE v.run_id = ?1",
        )?;
        let numerics = statement
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<BTreeMap<String, f64>, _>>()?;

        Ok(RunDetail {
            run_id,
            timestamp,
            strings,
            numerics,
        })
    }

    /// Looks the attribute up in the string dictionary first, then the
    /// numeric one.
    pub fn value_for(
        &self,
        run_id: i64,
        attribute: &str,
    ) -> Result<Option<StoredValue>, StoreError> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT v.value FROM string_values v \
                 JOIN string_attributes a ON a.attribute_id = v.attribute_id \
                 WHERE v.run_id = ?1 AND a.name = ?2",
                params![run_id, attribute],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(text) = text {
            return Ok(Some(StoredValue::Text(text)));
        }
        let number: Option<f64> = self
            .conn
            .query_row(
                "SELECT v.value FROM numeric_values v \
                 JOIN numeric_attributes a ON a.attribute_id = v.attribute_id \
                 WHERE v.run_id = ?1 AND a.name = ?2",
                params![run_id, attribute],
                |row| row.get(0),
            )
            .optional()?;
        Ok(number.map(StoredValue::Number))
    }

    pub fn search_text(
        &self,
        attribute: AttributeId,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let pattern = format!("%{}%", escape_like(needle));
        let mut statement = self.conn.prepare(
            "SELECT v.run_id, r.timestamp, v.value FROM string_values v \
             LEFT JOIN runs r ON r.run_id = v.run_id \
             WHERE v.attribute_id = ?1 AND v.value LIKE ?2 ESCAPE '\\' \
             ORDER BY v.run_id LIMIT ?3",
        )?;
        let hits = statement.query_map(params![attribute.0, pattern, limit as i64], |row| {
            Ok(SearchHit {
                run_id: row.get(0)?,
                timestamp: row.get(1)?,
                value: StoredValue::Text(row.get(2)?),
            })
        })?;
        Ok(hits.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn search_numeric(
        &self,
        attribute: AttributeId,
        filter: NumericFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let mut statement = self.conn.prepare(
            "SELECT v.run_id, r.timestamp, v.value FROM numeric_values v \
             LEFT JOIN runs r ON r.run_id = v.run_id \
             WHERE v.attribute_id = ?1 \
               AND (?2 IS NULL OR v.value >= ?2) \
               AND (?3 IS NULL OR v.value <= ?3) \
               AND (?4 IS NULL OR v.value = ?4) \
             ORDER BY v.run_id LIMIT ?5",
        )?;
        let hits = statement.query_map(
            params![
                attribute.0,
                filter.min,
                filter.max,
                filter.equals,
                limit as i64
            ],
            |row| {
                Ok(SearchHit {
                    run_id: row.get(0)?,
                    timestamp: row.get(1)?,
                    value: StoredValue::Number(row.get(2)?),
                })
            },
        )?;
        Ok(hits.collect::<Result<Vec<_>, _>>()?)
    }

    /// Distinct values of a string attribute, most frequent first. `top == 0`
    /// returns all of them.
    pub fn value_counts(
        &self,
        attribute: AttributeId,
        top: usize,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let limit = if top == 0 { -1 } else { top as i64 };
        let mut statement = self.conn.prepare(
            "SELECT value, COUNT(*) AS occurrences FROM string_values \
             WHERE attribute_id = ?1 \
             GROUP BY value ORDER BY occurrences DESC, value ASC LIMIT ?2",
        )?;
        let rows = statement.query_map(params![attribute.0, limit], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn numeric_summary(
        &self,
        attribute: AttributeId,
    ) -> Result<Option<NumericSummary>, StoreError> {
        let (count, min, max, mean): (i64, Option<f64>, Option<f64>, Option<f64>) =
            self.conn.query_row(
                "SELECT COUNT(value), MIN(value), MAX(value), AVG(value) FROM numeric_values \
                 WHERE attribute_id = ?1",
                params![attribute.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        Ok(match (min, max, mean) {
            (Some(min), Some(max), Some(mean)) if count > 0 => Some(NumericSummary {
                count,
                min,
                max,
                mean,
            }),
            _ => None,
        })
    }

    /// Pivots the fact tables back into wide form. String attributes come
    /// first, then numeric ones, each in id order; runs are in id order.
    pub fn reconstruct(&self) -> Result<WideTable, StoreError> {
        let mut attributes = Vec::new();
        let mut positions = HashMap::new();
        for kind in [AttributeKind::String, AttributeKind::Numeric] {
            for (id, name) in self.attributes(kind)? {
                positions.insert((kind, id), attributes.len());
                attributes.push((kind, name));
            }
        }

        let mut statement = self
            .conn
            .prepare("SELECT run_id, timestamp FROM runs ORDER BY run_id")?;
        let mut runs = statement
            .query_map([], |row| {
                Ok(WideRun {
                    run_id: row.get(0)?,
                    timestamp: row.get(1)?,
                    values: vec![None; attributes.len()],
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let rows_by_run = runs
            .iter()
            .enumerate()
            .map(|(idx, run)| (run.run_id, idx))
            .collect::<HashMap<_, _>>();

        let mut statement = self
            .conn
            .prepare("SELECT run_id, attribute_id, value FROM string_values")?;
        let facts = statement.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
        })?;
        for fact in facts {
            let (run_id, attribute_id, value) = fact?;
            if let (Some(&row), Some(&column)) = (
                rows_by_run.get(&run_id),
                positions.get(&(AttributeKind::String, AttributeId(attribute_id))),
            ) {
                runs[row].values[column] = Some(StoredValue::Text(value));
            }
        }

        let mut statement = self
            .conn
            .prepare("SELECT run_id, attribute_id, value FROM numeric_values")?;
        let facts = statement.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, f64>(2)?))
        })?;
        for fact in facts {
            let (run_id, attribute_id, value) = fact?;
            if let (Some(&row), Some(&column)) = (
                rows_by_run.get(&run_id),
                positions.get(&(AttributeKind::Numeric, AttributeId(attribute_id))),
            ) {
                runs[row].values[column] = Some(StoredValue::Number(value));
            }
        }

        Ok(WideTable { attributes, runs })
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// One open write transaction. Dropping it without [`ValueBatch::commit`]
/// rolls back everything written through it.
pub struct ValueBatch<'conn> {
    tx: Transaction<'conn>,
    pending: usize,
}

impl ValueBatch<'_> {
    pub fn insert_run(
        &mut self,
        run: RunId,
        timestamp: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        let timestamp = timestamp.map(|date| date.format(ISO_DATE_FORMAT).to_string());
        self.tx
            .prepare_cached("INSERT INTO runs (run_id, timestamp) VALUES (?1, ?2)")?
            .execute(params![run.0, timestamp])?;
        self.pending += 1;
        Ok(())
    }

    pub fn insert_text(
        &mut self,
        run: RunId,
        attribute: AttributeId,
        value: &str,
    ) -> Result<(), StoreError> {
        self.tx
            .prepare_cached(
                "INSERT INTO string_values (run_id, attribute_id, value) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![run.0, attribute.0, value])?;
        self.pending += 1;
        Ok(())
    }

    pub fn insert_number(
        &mut self,
        run: RunId,
        attribute: AttributeId,
        value: f64,
    ) -> Result<(), StoreError> {
        self.tx
            .prepare_cached(
                "INSERT INTO numeric_values (run_id, attribute_id, value) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![run.0, attribute.0, value])?;
        self.pending += 1;
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Commits and returns the number of rows written in this batch.
    pub fn commit(self) -> Result<usize, StoreError> {
        let written = self.pending;
        self.tx.commit()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn migration_sets_user_version_and_is_repeatable() {
        let store = EavStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        store.migrate().unwrap();
        assert_eq!(store.table_counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let store = EavStore::open_in_memory().unwrap();
        store.conn.execute("PRAGMA user_version = 7", []).unwrap();
        let err = store.migrate().unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedSchemaVersion { found: 7, supported: 1 }
        ));
    }

    #[test]
    fn upsert_attribute_reuses_existing_id() {
        let store = EavStore::open_in_memory().unwrap();
        let first = store.upsert_attribute(AttributeKind::String, "customer").unwrap();
        let second = store.upsert_attribute(AttributeKind::String, "customer").unwrap();
        let numeric = store.upsert_attribute(AttributeKind::Numeric, "viscosity").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            store.find_attribute(AttributeKind::Numeric, "viscosity").unwrap(),
            Some(numeric)
        );
        assert_eq!(store.find_attribute(AttributeKind::Numeric, "customer").unwrap(), None);
        assert_eq!(store.table_counts().unwrap().string_attributes, 1);
    }

    #[test]
    fn dropped_batch_rolls_back_and_committed_batch_persists() {
        let store = EavStore::open_in_memory().unwrap();
        let mut batch = store.begin_batch().unwrap();
        batch.insert_run(RunId(1), date(1990, 1, 2)).unwrap();
        assert_eq!(batch.commit().unwrap(), 1);

        {
            let mut batch = store.begin_batch().unwrap();
            batch.insert_run(RunId(2), None).unwrap();
            assert!(batch.insert_run(RunId(1), None).is_err());
        }
        assert_eq!(store.table_counts().unwrap().runs, 1);
    }

    #[test]
    fn run_detail_and_value_lookup() {
        let store = EavStore::open_in_memory().unwrap();
        let customer = store.upsert_attribute(AttributeKind::String, "customer").unwrap();
        let viscosity = store.upsert_attribute(AttributeKind::Numeric, "viscosity").unwrap();
        let mut batch = store.begin_batch().unwrap();
        batch.insert_run(RunId(1), date(1990, 4, 5)).unwrap();
        batch.insert_text(RunId(1), customer, "kmart").unwrap();
        batch.insert_number(RunId(1), viscosity, 46.0).unwrap();
        batch.commit().unwrap();

        let detail = store.run_detail(1).unwrap();
        assert_eq!(detail.timestamp.as_deref(), Some("1990-04-05"));
        assert_eq!(detail.strings.get("customer").map(String::as_str), Some("kmart"));
        assert_eq!(detail.numerics.get("viscosity"), Some(&46.0));
        assert!(matches!(store.run_detail(9), Err(StoreError::RunNotFound(9))));

        assert_eq!(
            store.value_for(1, "viscosity").unwrap(),
            Some(StoredValue::Number(46.0))
        );
        assert_eq!(store.value_for(1, "press").unwrap(), None);
    }

    #[test]
    fn searches_and_summaries() {
        let store = EavStore::open_in_memory().unwrap();
        let customer = store.upsert_attribute(AttributeKind::String, "customer").unwrap();
        let viscosity = store.upsert_attribute(AttributeKind::Numeric, "viscosity").unwrap();
        let mut batch = store.begin_batch().unwrap();
        for (run, name, value) in [(1, "kmart", 40.0), (2, "sears", 50.0), (3, "kmart", 60.0)] {
            batch.insert_run(RunId(run), None).unwrap();
            batch.insert_text(RunId(run), customer, name).unwrap();
            batch.insert_number(RunId(run), viscosity, value).unwrap();
        }
        batch.commit().unwrap();

        let hits = store.search_text(customer, "mar", 100).unwrap();
        assert_eq!(hits.iter().map(|h| h.run_id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(store.search_text(customer, "%", 100).unwrap().is_empty());

        let filter = NumericFilter {
            min: Some(45.0),
            ..NumericFilter::default()
        };
        let hits = store.search_numeric(viscosity, filter, 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].run_id, 2);

        assert_eq!(
            store.value_counts(customer, 0).unwrap(),
            vec![("kmart".to_string(), 2), ("sears".to_string(), 1)]
        );
        let summary = store.numeric_summary(viscosity).unwrap().unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, 50.0);
    }

    #[test]
    fn reconstruct_pivots_and_clear_runs_keeps_dictionary() {
        let mut store = EavStore::open_in_memory().unwrap();
        let customer = store.upsert_attribute(AttributeKind::String, "customer").unwrap();
        let viscosity = store.upsert_attribute(AttributeKind::Numeric, "viscosity").unwrap();
        let mut batch = store.begin_batch().unwrap();
        batch.insert_run(RunId(1), None).unwrap();
        batch.insert_run(RunId(2), date(1991, 2, 3)).unwrap();
        batch.insert_text(RunId(1), customer, "kmart").unwrap();
        batch.insert_number(RunId(2), viscosity, 4.5).unwrap();
        batch.commit().unwrap();

        let wide = store.reconstruct().unwrap();
        assert_eq!(
            wide.attributes,
            vec![
                (AttributeKind::String, "customer".to_string()),
                (AttributeKind::Numeric, "viscosity".to_string())
            ]
        );
        assert_eq!(
            wide.runs[0].values,
            vec![Some(StoredValue::Text("kmart".into())), None]
        );
        assert_eq!(
            wide.runs[1].values,
            vec![None, Some(StoredValue::Number(4.5))]
        );

        store.clear_runs().unwrap();
        let counts = store.table_counts().unwrap();
        assert_eq!(counts.runs + counts.string_values + counts.numeric_values, 0);
        assert_eq!(counts.string_attributes + counts.numeric_attributes, 2);
    }
}

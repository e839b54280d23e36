//! Pipeline configuration persisted as YAML.
//!
//! Every field carries a default, so a configuration file only needs to name
//! what it changes. The defaults describe the cylinder-band production export
//! the pipeline was built for.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::similarity::SimilarityMetric;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reserved token that marks a missing cell in the raw export.
    pub placeholder: String,
    pub timestamp_column: String,
    /// Text that means "unknown" once values have been canonicalized.
    pub unknown_literals: Vec<String>,
    /// Header corrections applied while reading the raw export.
    pub column_renames: BTreeMap<String, String>,
    /// Exact per-column value substitutions applied after canonicalization.
    pub value_replacements: BTreeMap<String, BTreeMap<String, String>>,
    pub fuzzy: FuzzyConfig,
    /// Share of parseable non-missing cells above which a text column is
    /// promoted to numeric.
    pub numeric_promotion_ratio: f64,
    pub boolean_vocabulary: BTreeMap<String, bool>,
    /// Numeric columns that hold categorical codes and must load as strings.
    pub string_overrides: BTreeSet<String>,
    pub commit_batch_size: usize,
    pub spot_check: SpotCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Column to repair; `None` disables the resolver.
    pub column: Option<String>,
    pub threshold: f64,
    pub max_matches: usize,
    pub metric: SimilarityMetric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotCheck {
    pub run_id: i64,
    pub attribute: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let boolean_vocabulary = [("yes", true), ("no", false), ("true", true), ("false", false)]
            .into_iter()
            .map(|(token, value)| (token.to_string(), value))
            .collect();
        let string_overrides = [
            "grain_screened",
            "proof_on_ctd_ink",
            "direct_steam",
            "type_on_cylinder",
            "job_number",
            "press",
            "unit_number",
            "plating_tank",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        let mut value_replacements = BTreeMap::new();
        value_replacements.insert(
            "paper_mill_location".to_string(),
            BTreeMap::from([("scandanavian".to_string(), "scandinavian".to_string())]),
        );
        Self {
            placeholder: "?".to_string(),
            timestamp_column: "timestamp".to_string(),
            unknown_literals: vec!["nan".to_string()],
            column_renames: BTreeMap::from([("humifity".to_string(), "humidity".to_string())]),
            value_replacements,
            fuzzy: FuzzyConfig::default(),
            numeric_promotion_ratio: 0.5,
            boolean_vocabulary,
            string_overrides,
            commit_batch_size: 1000,
            spot_check: SpotCheck::default(),
        }
    }
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            column: Some("customer".to_string()),
            threshold: 0.85,
            max_matches: 5,
            metric: SimilarityMetric::SequenceRatio,
        }
    }
}

impl Default for SpotCheck {
    fn default() -> Self {
        Self {
            run_id: 1,
            attribute: "customer".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let file = File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing config YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing config to YAML string")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.fuzzy.threshold),
            "Fuzzy threshold must be within [0, 1], got {}",
            self.fuzzy.threshold
        );
        ensure!(
            self.fuzzy.max_matches > 0,
            "Fuzzy max_matches must be positive"
        );
        ensure!(
            (0.0..1.0).contains(&self.numeric_promotion_ratio),
            "numeric_promotion_ratio must be within [0, 1), got {}",
            self.numeric_promotion_ratio
        );
        ensure!(
            self.commit_batch_size > 0,
            "commit_batch_size must be positive"
        );
        ensure!(
            !self.timestamp_column.trim().is_empty(),
            "timestamp_column cannot be empty"
        );
        Ok(())
    }

    pub fn is_string_override(&self, column: &str) -> bool {
        self.string_overrides.contains(column)
    }
}

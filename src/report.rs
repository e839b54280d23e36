//! Ordered, tagged cleaning report written verbatim to a text artifact.

use std::{fmt, path::Path};

use anyhow::Result;

use crate::io_utils;

const RULE_WIDTH: usize = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTag {
    NullManagement,
    Schema,
    TextNormalization,
    TypoCleanup,
    Optimize,
    Cleanup,
}

impl fmt::Display for ReportTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReportTag::NullManagement => "NULL_MGT",
            ReportTag::Schema => "SCHEMA",
            ReportTag::TextNormalization => "TEXT_NORM",
            ReportTag::TypoCleanup => "TYPO_CLEAN",
            ReportTag::Optimize => "OPTIMIZE",
            ReportTag::Cleanup => "CLEANUP",
        };
        write!(f, "[{label}]")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    lines: Vec<String>,
}

impl CleaningReport {
    pub fn new(source: &str, rows: usize, columns: usize) -> Self {
        let lines = vec![
            "DATA CLEANING AND SCHEMA OPTIMIZATION REPORT".to_string(),
            "=".repeat(RULE_WIDTH),
            format!("Input file: {source}"),
            format!("Initial row count: {rows}"),
            format!("Initial column count: {columns}"),
            "-".repeat(RULE_WIDTH),
            String::new(),
        ];
        Self { lines }
    }

    pub fn push(&mut self, tag: ReportTag, message: impl fmt::Display) {
        self.lines.push(format!("{tag} {message}"));
    }

    /// Adds an indented detail line under the previous tagged entry.
    pub fn push_detail(&mut self, message: impl fmt::Display) {
        self.lines.push(format!("  - {message}"));
    }

    pub fn finish(&mut self, rows: usize, columns: usize) {
        self.lines.push(String::new());
        self.lines.push("=".repeat(RULE_WIDTH));
        self.lines.push("FINAL SUMMARY:".to_string());
        self.lines.push(format!("Final row count: {rows}"));
        self.lines.push(format!("Final column count: {columns}"));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines carrying the given tag, without the tag prefix.
    pub fn entries(&self, tag: ReportTag) -> Vec<&str> {
        let prefix = format!("{tag} ");
        self.lines
            .iter()
            .filter_map(|line| line.strip_prefix(prefix.as_str()))
            .collect()
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        io_utils::write_text_file(path, &self.render())
    }
}

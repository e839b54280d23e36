//! Partition of surviving columns into string- and numeric-valued attributes.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{config::PipelineConfig, data::ColumnType, frame::ColumnHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    String,
    Numeric,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::String => f.write_str("string"),
            AttributeKind::Numeric => f.write_str("numeric"),
        }
    }
}

/// Numbers are numeric attributes unless the column is a known categorical
/// code; everything else is stored as text.
pub fn classify(datatype: ColumnType, string_override: bool) -> AttributeKind {
    match datatype {
        ColumnType::Integer | ColumnType::Float if !string_override => AttributeKind::Numeric,
        ColumnType::Integer
        | ColumnType::Float
        | ColumnType::Text
        | ColumnType::Boolean
        | ColumnType::Date => AttributeKind::String,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedColumn {
    /// Position of the column in the frozen run table.
    pub index: usize,
    pub name: String,
    pub kind: AttributeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    columns: Vec<ClassifiedColumn>,
}

impl Classification {
    pub fn columns(&self) -> &[ClassifiedColumn] {
        &self.columns
    }

    pub fn of_kind(&self, kind: AttributeKind) -> impl Iterator<Item = &ClassifiedColumn> {
        self.columns.iter().filter(move |column| column.kind == kind)
    }

    pub fn names(&self, kind: AttributeKind) -> Vec<&str> {
        self.of_kind(kind).map(|column| column.name.as_str()).collect()
    }

    pub fn kind_of(&self, name: &str) -> Option<AttributeKind> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.kind)
    }
}

pub fn classify_columns(columns: &[ColumnHeader], config: &PipelineConfig) -> Classification {
    let columns = columns
        .iter()
        .enumerate()
        .filter(|(_, header)| header.name != config.timestamp_column)
        .map(|(index, header)| {
            let kind = classify(header.datatype, config.is_string_override(&header.name));
            debug!(
                "Column '{}' ({}) -> {kind} attribute",
                header.name, header.datatype
            );
            ClassifiedColumn {
                index,
                name: header.name.clone(),
                kind,
            }
        })
        .collect();
    Classification { columns }
}

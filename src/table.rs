//! Tabular row source: one JSON object per line, keys are column names.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::error::MatchError;

/// One table row.
pub type Row = Map<String, Value>;

/// In-memory table with the union of row keys as its columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Builds a table from rows. Columns are listed in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|column| column == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    /// Reads a JSON-lines file. Blank lines are skipped; every other line
    /// must be a JSON object.
    pub fn read_jsonl(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to read table {}", path.display()))
    }

    /// Parses JSON-lines from any buffered reader.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut rows = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let row: Row = serde_json::from_str(trimmed)
                .with_context(|| format!("line {} is not a JSON object", idx + 1))?;
            rows.push(row);
        }
        Ok(Self::from_rows(rows))
    }

    /// Column names in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `column` appears in any row.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fails with [`MatchError::MissingColumn`] unless `column` is present.
    pub fn require_column(&self, table: &'static str, column: &str) -> Result<(), MatchError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(MatchError::MissingColumn {
                table,
                column: column.to_string(),
            })
        }
    }

    /// Returns the first of `candidates` present in the table.
    pub fn require_any_column<'c>(
        &self,
        table: &'static str,
        candidates: &[&'c str],
    ) -> Result<&'c str, MatchError> {
        candidates
            .iter()
            .copied()
            .find(|candidate| self.has_column(candidate))
            .ok_or_else(|| MatchError::MissingColumn {
                table,
                column: candidates.join("|"),
            })
    }
}

/// Cell rendered as text. Missing and null cells are empty.
pub fn text_cell(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Cell coerced to a number. Strings have thousands separators stripped;
/// anything unparsable counts as 0.
pub fn numeric_cell(row: &Row, column: &str) -> f64 {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.replace(',', "").trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

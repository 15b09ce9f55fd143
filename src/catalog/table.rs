//! In-memory tables and the left join used to denormalize the catalog sheets.

use super::types::CatalogError;
use std::collections::{HashMap, HashSet};

/// A named sheet: a header row plus string cells, `None` for missing values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Build a table, padding or truncating every row to the header width.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Convenience constructor for literal tables; empty strings become missing values.
    pub fn from_literal(name: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            name,
            columns.iter().map(|column| column.to_string()).collect(),
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| normalize_cell(cell.to_string()))
                        .collect()
                })
                .collect(),
        )
    }

    /// Sheet name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header row.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows, each as wide as the header.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Position of `column` in the header, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|candidate| candidate == column)
    }

    /// Position of `column`, or [`CatalogError::MissingColumn`] naming this table.
    pub fn require_column(&self, column: &str) -> Result<usize, CatalogError> {
        self.column_index(column)
            .ok_or_else(|| CatalogError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Left-join `right` onto `self` on a shared key column.
    ///
    /// Every left row survives: once with empty right cells when nothing matches, or once per
    /// matching right row. Non-key columns present on both sides are renamed with `_x` (left)
    /// and `_y` (right). Missing keys never match.
    pub fn left_join(&self, right: &Table, key: &str) -> Result<Table, CatalogError> {
        let left_key = self.require_column(key)?;
        let right_key = right.require_column(key)?;

        let right_value_columns: Vec<usize> = (0..right.columns.len())
            .filter(|&idx| idx != right_key)
            .collect();
        let right_names: HashSet<&str> = right_value_columns
            .iter()
            .map(|&idx| right.columns[idx].as_str())
            .collect();
        let left_names: HashSet<&str> = self
            .columns
            .iter()
            .enumerate()
            .filter(|&(idx, _)| idx != left_key)
            .map(|(_, name)| name.as_str())
            .collect();

        let mut columns: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                if idx != left_key && right_names.contains(name.as_str()) {
                    format!("{name}_x")
                } else {
                    name.clone()
                }
            })
            .collect();
        columns.extend(right_value_columns.iter().map(|&idx| {
            let name = &right.columns[idx];
            if left_names.contains(name.as_str()) {
                format!("{name}_y")
            } else {
                name.clone()
            }
        }));

        let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
        for (row_idx, row) in right.rows.iter().enumerate() {
            if let Some(value) = row[right_key].as_deref() {
                index.entry(value).or_default().push(row_idx);
            }
        }

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let matches = row[left_key]
                .as_deref()
                .and_then(|value| index.get(value))
                .filter(|matches| !matches.is_empty());

            match matches {
                Some(matches) => {
                    for &right_idx in matches {
                        let right_row = &right.rows[right_idx];
                        let mut joined = row.clone();
                        joined.extend(right_value_columns.iter().map(|&idx| right_row[idx].clone()));
                        rows.push(joined);
                    }
                }
                None => {
                    let mut joined = row.clone();
                    joined.extend(std::iter::repeat_n(None, right_value_columns.len()));
                    rows.push(joined);
                }
            }
        }

        Ok(Table {
            name: format!("{} + {}", self.name, right.name),
            columns,
            rows,
        })
    }
}

/// Trim a raw cell, mapping blank text to a missing value.
pub(crate) fn normalize_cell(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == raw.len() {
        Some(raw)
    } else {
        Some(trimmed.to_string())
    }
}

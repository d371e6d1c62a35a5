use serde::{Deserialize, Serialize};

use crate::db::Row;

/// Rows flattened to strings for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DisplayTable {
    /// Columns are taken from the first record; later records are assumed to
    /// share them and missing keys render as `NULL`.
    pub fn from_rows(records: &[Row]) -> Self {
        let Some(first) = records.first() else {
            return Self::default();
        };

        let columns: Vec<String> = first.keys().cloned().collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|col| format_value(record.get(col)))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Plain-text grid for terminals.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "(no rows)\n".to_string();
        }

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(col.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect();
            format!("| {} |\n", padded.join(" | "))
        };

        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

        let mut out = line(&self.columns);
        out.push_str(&format!("|-{}-|\n", separator.join("-|-")));
        for row in &self.rows {
            out.push_str(&line(row));
        }
        out
    }
}

fn format_value(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "NULL".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(v @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => v.to_string(),
        Some(other) => other.to_string(),
    }
}

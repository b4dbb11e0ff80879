//! Supporting table artifacts attached to a requirement.
//!
//! Tables reach the engine in a few structurally-compatible shapes. Each shape
//! is a variant with its own explicit conversion into the canonical
//! [`TableArtifact`]; there is no open-ended shape sniffing beyond the
//! best-effort `Opaque` variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical table: a title, column headers, and string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableArtifact {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableArtifact {
    /// Renders as a titled, pipe-delimited block for prompts.
    pub fn render(&self) -> String {
        let mut out = format!("Table: {}\n", self.title);
        out.push_str(&self.columns.join(" | "));
        for row in &self.rows {
            out.push('\n');
            out.push_str(&row.join(" | "));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One editor-grid cell as held by the grid view model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub column: String,
    pub value: String,
}

/// The shapes a supporting table can arrive in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SupportingArtifact {
    /// Already canonical.
    Table(TableArtifact),
    /// Sparse cells from the editable grid.
    Grid { title: String, cells: Vec<GridCell> },
    /// Unknown JSON; converted best-effort.
    Opaque { title: String, value: Value },
}

impl SupportingArtifact {
    /// Converts any variant into the canonical table.
    pub fn to_table(&self) -> TableArtifact {
        match self {
            SupportingArtifact::Table(table) => table.clone(),
            SupportingArtifact::Grid { title, cells } => grid_to_table(title, cells),
            SupportingArtifact::Opaque { title, value } => opaque_to_table(title, value),
        }
    }
}

fn grid_to_table(title: &str, cells: &[GridCell]) -> TableArtifact {
    let mut columns: Vec<String> = Vec::new();
    for cell in cells {
        if !columns.contains(&cell.column) {
            columns.push(cell.column.clone());
        }
    }
    let row_count = cells.iter().map(|c| c.row + 1).max().unwrap_or(0);
    let mut rows = vec![vec![String::new(); columns.len()]; row_count];
    for cell in cells {
        if let Some(col) = columns.iter().position(|c| c == &cell.column) {
            rows[cell.row][col] = cell.value.clone();
        }
    }
    TableArtifact {
        title: title.to_string(),
        columns,
        rows,
    }
}

/// Accepts `{columns, rows}` objects or arrays of flat objects.
fn opaque_to_table(title: &str, value: &Value) -> TableArtifact {
    let mut table = TableArtifact {
        title: title.to_string(),
        ..TableArtifact::default()
    };

    if let Some(object) = value.as_object() {
        if let (Some(columns), Some(rows)) = (
            object.get("columns").and_then(Value::as_array),
            object.get("rows").and_then(Value::as_array),
        ) {
            table.columns = columns.iter().map(cell_text).collect();
            table.rows = rows
                .iter()
                .filter_map(Value::as_array)
                .map(|row| row.iter().map(cell_text).collect())
                .collect();
        }
        return table;
    }

    if let Some(records) = value.as_array() {
        for record in records.iter().filter_map(Value::as_object) {
            for key in record.keys() {
                if !table.columns.contains(key) {
                    table.columns.push(key.clone());
                }
            }
        }
        table.rows = records
            .iter()
            .filter_map(Value::as_object)
            .map(|record| {
                table
                    .columns
                    .iter()
                    .map(|col| record.get(col).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
    }

    table
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

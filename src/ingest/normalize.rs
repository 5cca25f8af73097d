//! Column normalizer: reconciles headers against an expected column set and
//! types every cell.

use serde::Serialize;

use super::reader::Table;
use crate::errors::AppError;

const NULL_SENTINELS: [&str; 6] = ["", "na", "n/a", "nan", "none", "null"];

/// A typed cell after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(format_number(*n)),
        }
    }

    pub fn as_number(&self) -> f64 {
        match self {
            Cell::Null => 0.0,
            Cell::Text(s) => coerce_number(s).unwrap_or(0.0),
            Cell::Number(n) => *n,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Render a float without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Whether a raw string stands for "no value".
pub fn is_null_sentinel(raw: &str) -> bool {
    let trimmed = raw.trim();
    NULL_SENTINELS
        .iter()
        .any(|s| trimmed.eq_ignore_ascii_case(s))
}

/// Year at the start of a value such as `2024` or `2024-2025`.
pub fn leading_year(raw: &str) -> Option<i32> {
    let digits: String = raw.trim().chars().take_while(char::is_ascii_digit).collect();
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

/// Keep digits and decimal points, then parse. `None` when nothing parseable remains.
pub fn coerce_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Expected shape of an uploaded table.
#[derive(Debug, Clone, Default)]
pub struct ColumnSpec {
    required: Vec<String>,
    defaults: Vec<(String, Cell)>,
    numeric: Vec<String>,
}

impl ColumnSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, columns: &[&str]) -> Self {
        self.required.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn optional(mut self, column: &str, default: Cell) -> Self {
        self.defaults.push((column.to_string(), default));
        self
    }

    pub fn numeric(mut self, columns: &[&str]) -> Self {
        self.numeric.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Required columns that the given headers do not provide.
    pub fn missing_columns(&self, headers: &[String]) -> Vec<String> {
        self.required
            .iter()
            .filter(|r| !headers.iter().any(|h| h == *r))
            .cloned()
            .collect()
    }

    fn default_for(&self, column: &str) -> Option<&Cell> {
        self.defaults
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    fn is_numeric(&self, column: &str) -> bool {
        self.numeric.iter().any(|n| n == column)
    }
}

/// A data-quality note attached to a source line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
}

/// One row with the full normalized column set, in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// 1-based line in the source file (the header is line 1)
    pub line: usize,
    cells: Vec<(String, Cell)>,
}

static NULL_CELL: Cell = Cell::Null;

impl NormalizedRow {
    pub fn new(line: usize, cells: Vec<(String, Cell)>) -> Self {
        Self { line, cells }
    }

    pub fn get(&self, column: &str) -> &Cell {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
            .unwrap_or(&NULL_CELL)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).as_text()
    }

    pub fn number(&self, column: &str) -> f64 {
        self.get(column).as_number()
    }

    /// Non-null cells whose column is not in `known`, as a JSON object.
    pub fn extra_fields(&self, known: &[&str]) -> serde_json::Map<String, serde_json::Value> {
        self.cells
            .iter()
            .filter(|(name, cell)| {
                !name.is_empty() && *cell != Cell::Null && !known.contains(&name.as_str())
            })
            .map(|(name, cell)| (name.clone(), cell.to_json()))
            .collect()
    }
}

/// Result of normalizing a table.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub columns: Vec<String>,
    pub rows: Vec<NormalizedRow>,
    pub issues: Vec<RowIssue>,
}

/// Validate headers and type every cell of `table` according to `spec`.
pub fn normalize(table: &Table, spec: &ColumnSpec) -> Result<NormalizedTable, AppError> {
    let missing = spec.missing_columns(&table.headers);
    if !missing.is_empty() {
        tracing::warn!("Rejecting upload, missing columns: {:?}", missing);
        return Err(AppError::MissingColumns(missing));
    }

    let injected: Vec<&(String, Cell)> = spec
        .defaults
        .iter()
        .filter(|(name, _)| !table.headers.contains(name))
        .collect();

    let mut columns = table.headers.clone();
    columns.extend(injected.iter().map(|(name, _)| name.clone()));

    let mut result = NormalizedTable {
        columns,
        ..Default::default()
    };

    for (index, raw_row) in table.rows.iter().enumerate() {
        let line = index + 2;
        let mut cells = Vec::with_capacity(result.columns.len());

        for (header, raw) in table.headers.iter().zip(raw_row.iter()) {
            let cell = normalize_cell(header, raw.as_deref(), spec, line, &mut result.issues);
            cells.push((header.clone(), cell));
        }
        for (name, default) in &injected {
            cells.push((name.clone(), default.clone()));
        }

        result.rows.push(NormalizedRow::new(line, cells));
    }

    if !result.issues.is_empty() {
        tracing::info!(
            "Normalized {} rows with {} coerced cells",
            result.rows.len(),
            result.issues.len()
        );
    }

    Ok(result)
}

fn normalize_cell(
    column: &str,
    raw: Option<&str>,
    spec: &ColumnSpec,
    line: usize,
    issues: &mut Vec<RowIssue>,
) -> Cell {
    let value = raw.map(str::trim).filter(|v| !is_null_sentinel(v));

    let Some(value) = value else {
        return match spec.default_for(column) {
            Some(default) => default.clone(),
            None if spec.is_numeric(column) => Cell::Number(0.0),
            None => Cell::Null,
        };
    };

    if !spec.is_numeric(column) {
        return Cell::text(value);
    }

    match coerce_number(value) {
        Some(number) => {
            if value.parse::<f64>().is_err() {
                tracing::debug!("Line {}: coerced '{}' in {} to {}", line, value, column, number);
                issues.push(RowIssue {
                    line,
                    column: Some(column.to_string()),
                    message: format!("'{}' read as {}", value, format_number(number)),
                });
            }
            Cell::Number(number)
        }
        None => {
            tracing::debug!("Line {}: non-numeric '{}' in {} set to 0", line, value, column);
            issues.push(RowIssue {
                line,
                column: Some(column.to_string()),
                message: format!("'{}' is not a number, 0 used", value),
            });
            Cell::Number(0.0)
        }
    }
}

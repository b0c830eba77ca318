use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::PlotError;

/// Cell texts treated as missing values.
const MISSING_MARKERS: &[&str] = &["", "na", "nan", "n/a", "null", "none", "#n/a"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Datetime,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Datetime => "datetime",
        }
    }
}

/// A single named column. Cells keep their source text; `values` holds the
/// parsed number for numeric columns and epoch seconds for datetime columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    cells: Vec<String>,
    values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<String>) -> Self {
        let (kind, values) = infer_kind(&cells);
        Self {
            name: name.into(),
            kind,
            cells,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    /// Numeric or datetime: anything that can sit on a continuous axis.
    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, ColumnKind::Numeric | ColumnKind::Datetime)
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self.kind {
            ColumnKind::Categorical => is_missing_text(&self.cells[row]),
            _ => self.values[row].is_none(),
        }
    }

    /// Continuous values, or `NotNumeric` for categorical columns.
    pub fn numeric(&self) -> Result<&[Option<f64>], PlotError> {
        if self.is_continuous() {
            Ok(&self.values)
        } else {
            Err(PlotError::NotNumeric(self.name.clone()))
        }
    }

    pub fn value(&self, row: usize) -> Option<f64> {
        self.values.get(row).copied().flatten()
    }

    /// Level label used when this column acts as a grouping variable.
    pub fn label(&self, row: usize) -> Option<String> {
        if self.is_missing(row) {
            return None;
        }
        match self.kind {
            ColumnKind::Numeric => self.values[row].map(format_number),
            _ => Some(self.cells[row].trim().to_string()),
        }
    }

    /// Distinct levels: sorted numerically for numeric columns, in order of
    /// first appearance otherwise.
    pub fn categorical_order(&self) -> Vec<String> {
        if self.kind == ColumnKind::Numeric {
            let mut values: Vec<f64> = self.values.iter().flatten().copied().collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();
            return values.into_iter().map(format_number).collect();
        }
        let mut seen = std::collections::HashSet::new();
        let mut order = Vec::new();
        for row in 0..self.len() {
            if let Some(label) = self.label(row) {
                if seen.insert(label.clone()) {
                    order.push(label);
                }
            }
        }
        order
    }

    /// Distinct levels sorted, as offered by multiselect widgets.
    pub fn sorted_levels(&self) -> Vec<String> {
        let mut levels = self.categorical_order();
        if self.kind != ColumnKind::Numeric {
            levels.sort();
        }
        levels
    }
}

/// In-memory table loaded once per session and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from a header row and string rows. Duplicate or blank
    /// header names are made unique.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = unique_headers(headers);
        let n_rows = rows.len();
        let mut per_column: Vec<Vec<String>> = vec![Vec::with_capacity(n_rows); headers.len()];
        for row in rows {
            for (idx, cells) in per_column.iter_mut().enumerate() {
                cells.push(row.get(idx).cloned().unwrap_or_default());
            }
        }
        let columns = headers
            .into_iter()
            .zip(per_column)
            .map(|(name, cells)| Column::new(name, cells))
            .collect();
        Self { columns, n_rows }
    }

    /// Create a dataset from a JSON array of objects
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("Input data must be a JSON array of objects"))?;

        if array.is_empty() {
            return Err(anyhow!("Input data array is empty"));
        }

        let first_obj = array[0]
            .as_object()
            .ok_or_else(|| anyhow!("Items in array must be objects"))?;
        let headers: Vec<String> = first_obj.keys().cloned().collect();

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Items in array must be objects"))?;
            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) | None => String::new(),
                    _ => return Err(anyhow!("Unsupported value type for field '{}'", header)),
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Ok(Self::from_rows(headers, rows))
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Exact match first, then ASCII case-insensitive.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn require(&self, name: &str) -> Result<&Column, PlotError> {
        self.column(name)
            .ok_or_else(|| PlotError::MissingColumn(name.to_string()))
    }

    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_numeric()).collect()
    }

    /// First `n` rows as text, for previews.
    pub fn head(&self, n: usize) -> Vec<Vec<&str>> {
        (0..self.n_rows.min(n))
            .map(|row| self.columns.iter().map(|c| c.cells[row].as_str()).collect())
            .collect()
    }
}

pub fn is_missing_text(cell: &str) -> bool {
    let trimmed = cell.trim();
    MISSING_MARKERS
        .iter()
        .any(|m| trimmed.eq_ignore_ascii_case(m))
}

/// Compact number formatting for labels: integers lose their fraction.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let text = format!("{:.6}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn infer_kind(cells: &[String]) -> (ColumnKind, Vec<Option<f64>>) {
    let present: Vec<&String> = cells.iter().filter(|c| !is_missing_text(c)).collect();
    if present.is_empty() {
        return (ColumnKind::Categorical, vec![None; cells.len()]);
    }

    if present.iter().all(|c| c.trim().parse::<f64>().is_ok()) {
        let values = cells
            .iter()
            .map(|c| {
                if is_missing_text(c) {
                    None
                } else {
                    c.trim().parse::<f64>().ok().filter(|v| v.is_finite())
                }
            })
            .collect();
        return (ColumnKind::Numeric, values);
    }

    if present.iter().all(|c| parse_datetime(c).is_some()) {
        let values = cells
            .iter()
            .map(|c| parse_datetime(c).map(|dt| dt.and_utc().timestamp() as f64))
            .collect();
        return (ColumnKind::Datetime, values);
    }

    (ColumnKind::Categorical, vec![None; cells.len()])
}

fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, h)| {
            let base = if h.trim().is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                h.trim().to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base.clone()
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dataset() -> Dataset {
        Dataset::from_rows(
            vec!["height".into(), "species".into(), "when".into(), "height".into()],
            vec![
                vec!["1.5".into(), "Adelie".into(), "2024-01-02".into(), "3".into()],
                vec!["NA".into(), "Gentoo".into(), "2024-01-03".into(), "4".into()],
                vec!["2".into(), "Adelie".into(), "".into(), "5".into()],
            ],
        )
    }

    #[test]
    fn test_infers_column_kinds() {
        let ds = make_dataset();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_cols(), 4);
        assert_eq!(ds.column("height").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(ds.column("species").unwrap().kind(), ColumnKind::Categorical);
        assert_eq!(ds.column("when").unwrap().kind(), ColumnKind::Datetime);
    }

    #[test]
    fn test_duplicate_headers_are_renamed() {
        let ds = make_dataset();
        assert_eq!(ds.headers(), vec!["height", "species", "when", "height.1"]);
    }

    #[test]
    fn test_missing_values() {
        let ds = make_dataset();
        let height = ds.column("height").unwrap();
        assert!(height.is_missing(1));
        assert_eq!(height.value(0), Some(1.5));
        assert!(ds.column("when").unwrap().is_missing(2));
    }

    #[test]
    fn test_categorical_order() {
        let ds = make_dataset();
        assert_eq!(
            ds.column("species").unwrap().categorical_order(),
            vec!["Adelie", "Gentoo"]
        );
        assert_eq!(
            ds.column("height.1").unwrap().categorical_order(),
            vec!["3", "4", "5"]
        );
    }

    #[test]
    fn test_numeric_access_on_categorical_fails() {
        let ds = make_dataset();
        let err = ds.column("species").unwrap().numeric().unwrap_err();
        assert!(matches!(err, PlotError::NotNumeric(_)));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let ds = make_dataset();
        assert!(ds.column("SPECIES").is_some());
        assert!(matches!(ds.require("mass"), Err(PlotError::MissingColumn(_))));
    }

    #[test]
    fn test_from_json() {
        let value = serde_json::json!([
            {"a": 1, "b": "x"},
            {"a": 2.5, "b": null}
        ]);
        let ds = Dataset::from_json(&value).unwrap();
        assert_eq!(ds.n_rows(), 2);
        assert!(ds.column("a").unwrap().is_numeric());
        assert!(ds.column("b").unwrap().is_missing(1));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.50), "2.5");
    }
}

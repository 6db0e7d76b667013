use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::fmt;

/// Semantic type inferred for a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Number,
    String,
    Date,
    Boolean,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Date => "date",
            DataType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

impl Value {
    /// Parse a raw cell according to the column type it belongs to.
    pub fn parse(raw: &str, data_type: DataType) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match data_type {
            DataType::Number => trimmed
                .parse::<f64>()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            DataType::Boolean => match parse_bool(trimmed) {
                Some(b) => Value::Bool(b),
                None => Value::Text(raw.to_string()),
            },
            DataType::Date | DataType::String => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell. Text is parsed; anything else is absent.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// String form used for grouping and labels.
    pub fn key(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// Natural ordering: nulls first, then booleans, numbers, dates, text.
    pub fn natural_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::Text(_) => 3,
            }
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Text(a), Value::Text(b)) => match (parse_date(a), parse_date(b)) {
                (Some(da), Some(db)) => da.cmp(&db),
                _ => a.cmp(b),
            },
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse a date cell using the formats the loader recognises.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Infer the semantic type of a column from its raw cells. Empty cells are ignored.
pub fn infer_type<'a, I>(cells: I) -> DataType
where
    I: IntoIterator<Item = &'a str>,
{
    let cells: Vec<&str> = cells
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if cells.is_empty() {
        return DataType::String;
    }
    if cells.iter().all(|c| c.parse::<f64>().is_ok()) {
        DataType::Number
    } else if cells.iter().all(|c| parse_bool(c).is_some()) {
        DataType::Boolean
    } else if cells.iter().all(|c| parse_date(c).is_some()) {
        DataType::Date
    } else {
        DataType::String
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// Row-oriented tabular data plus the inferred type of every column.
///
/// Immutable once handed to the pipeline; a reload replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset from already typed rows. Every row must carry one value per column.
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            anyhow::bail!(
                "Row {} has {} values but the dataset declares {} columns",
                i,
                row.len(),
                columns.len()
            );
        }
        Ok(Self { columns, rows })
    }

    /// Build a dataset from raw string cells, inferring column types.
    pub fn from_raw(headers: Vec<String>, raw_rows: Vec<Vec<String>>) -> Result<Self> {
        let columns: Vec<Column> = headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Column {
                data_type: infer_type(raw_rows.iter().filter_map(|r| r.get(idx).map(String::as_str))),
                name,
            })
            .collect();

        let mut rows = Vec::with_capacity(raw_rows.len());
        for (i, raw) in raw_rows.into_iter().enumerate() {
            if raw.len() != columns.len() {
                anyhow::bail!(
                    "Row {} has {} values but the header declares {} columns",
                    i + 1,
                    raw.len(),
                    columns.len()
                );
            }
            rows.push(
                raw.iter()
                    .zip(&columns)
                    .map(|(cell, col)| Value::parse(cell, col.data_type))
                    .collect(),
            );
        }
        Ok(Self { columns, rows })
    }

    /// Create a dataset from a JSON array of objects. Columns follow the key order of the first object.
    pub fn from_json(value: &Json) -> Result<Self> {
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

        let mut rows = Vec::new();
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Items in array must be objects"))?;

            let mut row = Vec::new();
            for header in &headers {
                let val_str = match obj.get(header) {
                    Some(Json::String(s)) => s.clone(),
                    Some(Json::Number(n)) => n.to_string(),
                    Some(Json::Bool(b)) => b.to_string(),
                    Some(Json::Null) | None => String::new(),
                    _ => return Err(anyhow!("Unsupported value type for field '{}'", header)),
                };
                row.push(val_str);
            }
            rows.push(row);
        }

        Self::from_raw(headers, rows)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Ordered column names; the identity used to decide whether a mapping survives a reload.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_type(&self, name: &str) -> Option<DataType> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.data_type)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up the cell of `row` under column `name`.
    pub fn value<'a>(&'a self, row: &'a [Value], name: &str) -> Option<&'a Value> {
        self.column_index(name).and_then(|idx| row.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_infer_types() {
        assert_eq!(infer_type(["1", "2.5", ""]), DataType::Number);
        assert_eq!(infer_type(["true", "FALSE"]), DataType::Boolean);
        assert_eq!(infer_type(["2020-01-01", "2020/02/01"]), DataType::Date);
        assert_eq!(infer_type(["a", "1"]), DataType::String);
        assert_eq!(infer_type(Vec::<&str>::new()), DataType::String);
    }

    #[test]
    fn test_from_raw_types_and_nulls() {
        let ds = Dataset::from_raw(
            vec!["x".into(), "name".into()],
            raw(&[&["1", "a"], &["", "b"]]),
        )
        .unwrap();
        assert_eq!(ds.column_type("x"), Some(DataType::Number));
        assert_eq!(ds.rows()[0][0], Value::Number(1.0));
        assert!(ds.rows()[1][0].is_null());
        assert_eq!(ds.column_names(), vec!["x", "name"]);
    }

    #[test]
    fn test_from_raw_ragged_row() {
        let result = Dataset::from_raw(vec!["a".into(), "b".into()], raw(&[&["1"]]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!([
            {"city": "Tokyo", "temp": 10},
            {"city": "Oslo", "temp": null}
        ]);
        let ds = Dataset::from_json(&json).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.column_type("temp"), Some(DataType::Number));
        let row = &ds.rows()[1];
        assert!(ds.value(row, "temp").unwrap().is_null());
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(Dataset::from_json(&serde_json::json!({"a": 1})).is_err());
        assert!(Dataset::from_json(&serde_json::json!([])).is_err());
    }

    #[test]
    fn test_natural_ordering() {
        let mut values = vec![
            Value::from("2020-03-01"),
            Value::from("2020-01-15"),
            Value::Null,
        ];
        values.sort_by(|a, b| a.natural_cmp(b));
        assert!(values[0].is_null());
        assert_eq!(values[1], Value::from("2020-01-15"));

        assert_eq!(Value::Number(2.0).natural_cmp(&Value::Number(10.0)), Ordering::Less);
    }

    #[test]
    fn test_as_f64_excludes_garbage() {
        assert_eq!(Value::from(" 3.5 ").as_f64(), Some(3.5));
        assert_eq!(Value::from("n/a").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }
}

use crate::data::Dataset;
use anyhow::{Context, Result};
use std::io::{self, Read};
use std::path::Path;

/// Raw CSV contents before type inference
#[derive(Debug, Clone)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvData {
    pub fn into_dataset(self) -> Result<Dataset> {
        Dataset::from_raw(self.headers, self.rows)
    }
}

/// Read CSV data from any reader. Requires a header row and at least one data row.
pub fn read_csv<R: Read>(reader: R) -> Result<CsvData> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", i + 1))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    if rows.is_empty() {
        anyhow::bail!("CSV must contain at least one data row");
    }

    Ok(CsvData { headers, rows })
}

pub fn read_csv_from_stdin() -> Result<CsvData> {
    read_csv(io::stdin().lock())
}

pub fn read_csv_from_path(path: &Path) -> Result<CsvData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file '{}'", path.display()))?;
    read_csv(file)
}

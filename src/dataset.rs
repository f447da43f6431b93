//! CSV dataset reading and writing.
//!
//! Datasets are header-first delimited files where one column holds the
//! search term and every other column is auxiliary data carried through the
//! pipeline verbatim.

use crate::store::Row;
use crate::util::ensure_dir;
use anyhow::{Context, Result, anyhow};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// The search term of every row, in input order.
    pub fn terms(&self, term_column: &str) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get(term_column).cloned().unwrap_or_default())
            .collect()
    }
}

/// Read a dataset, trimming cells and dropping rows with an empty search
/// term. Rows shorter than the header are padded with empty values.
pub fn read_dataset(path: &Path, term_column: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("reading dataset: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| "reading dataset headers")?
        .iter()
        .map(str::to_string)
        .filter(|h| !h.is_empty())
        .collect();

    if !headers.iter().any(|h| h == term_column) {
        return Err(anyhow!(
            "dataset {} has no '{}' column",
            path.display(),
            term_column
        ));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| "reading dataset row")?;
        let mut row = Row::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            row.insert(header.clone(), record.get(i).unwrap_or("").to_string());
        }
        if row.get(term_column).is_none_or(|t| t.is_empty()) {
            continue;
        }
        rows.push(row);
    }

    Ok(Dataset { headers, rows })
}

/// Write rows in the given column order, creating parent directories.
/// Fields missing from a row are written as empty.
pub fn write_dataset(path: &Path, schema: &[String], rows: &[Row]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("writing dataset: {}", path.display()))?;
    writer.write_record(schema)?;
    for row in rows {
        writer.write_record(
            schema
                .iter()
                .map(|field| row.get(field).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.flush().with_context(|| "flush dataset")?;
    Ok(())
}

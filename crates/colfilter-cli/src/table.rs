use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// One CSV record; field `i` belongs to header `i`.
pub type Record = Vec<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
}

pub fn load_csv(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_csv(file).with_context(|| format!("read {}", path.display()))
}

/// Reads a headed CSV document. Records are padded or truncated to the header width.
pub fn read_csv(input: impl Read) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .context("read header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("read record {}", index + 1))?;
        let mut row: Record = record.iter().map(str::to_string).collect();
        if row.len() != headers.len() {
            log::warn!(
                "record {} has {} field(s) but the header has {}; resizing",
                index + 1,
                row.len(),
                headers.len()
            );
            row.resize(headers.len(), String::new());
        }
        rows.push(row);
    }

    Ok(Table { headers, rows })
}

pub fn field(row: &Record, index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

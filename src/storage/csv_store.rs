use crate::model::{RawTable, StorageError};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads a CSV table. Rows may be shorter or longer than the header; missing
/// cells are absent from the row and extra cells are dropped.
pub fn read_table(path: &Path) -> Result<RawTable, StorageError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect());
    }
    debug!("Read {} rows from {}", records.len(), path.display());
    Ok(RawTable::from_records(headers, records))
}

/// Writes `table` with its header row, creating parent directories.
pub fn write_table(path: &Path, table: &RawTable) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        let record: Vec<&str> = table
            .headers
            .iter()
            .map(|h| row.get(h).unwrap_or(""))
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    debug!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

/// `*.csv` files directly inside `dir`, sorted by file name.
pub fn list_tables(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// File stem of a table, used as the source label in reports and charts.
pub fn source_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

use super::naming::format_timestamp;
use crate::core::DenseTable;

/// Write `table` to `path`: a `timestamp` column followed by the table's
/// columns, one line per row, unset cells left empty.
///
/// Column names are taken from the table as is. Under
/// `ColumnNaming::Qualified` they read `device:tag`, under `ColumnNaming::Bare`
/// just `tag`. Columns are ordered by device discovery order, then by the
/// order each tag was first seen within its device.
///
/// Goes through a temporary file and a rename so an interrupted write never
/// leaves a truncated log behind.
pub fn write_table(path: &Path, table: &DenseTable) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    let temp_path = path.with_extension("csv.tmp");
    {
        let file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        write_table_to(file, table)?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to move CSV into place at {}", path.display()))?;

    info!(path = %path.display(), rows = table.len(), columns = table.columns().len(), "wrote CSV");
    Ok(())
}

pub fn write_table_to<W: Write>(writer: W, table: &DenseTable) -> Result<()> {
    let mut csv_writer = ::csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(table.columns().len() + 1);
    header.push("timestamp");
    header.extend(table.columns().iter().map(String::as_str));
    csv_writer.write_record(&header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(row.cells.len() + 1);
        record.push(format_timestamp(&row.timestamp));
        record.extend(row.cells.iter().map(|cell| cell.clone().unwrap_or_default()));
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush().context("Failed to flush CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DenseRow;
    use chrono::{TimeZone, Utc};

    fn sample_table() -> DenseTable {
        DenseTable::new(
            vec!["mill:Load".to_string(), "mill:Mode".to_string()],
            vec![
                DenseRow {
                    timestamp: Utc.timestamp_millis_opt(1_000).unwrap(),
                    cells: vec![Some("12.5".to_string()), None],
                },
                DenseRow {
                    timestamp: Utc.timestamp_millis_opt(2_500).unwrap(),
                    cells: vec![Some("12.5".to_string()), Some("AUTO, MANUAL".to_string())],
                },
            ],
        )
    }

    #[test]
    fn test_csv_layout() {
        let mut out = Vec::new();
        write_table_to(&mut out, &sample_table()).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,mill:Load,mill:Mode");
        assert_eq!(lines[1], "1970-01-01T00:00:01.000Z,12.5,");
        assert_eq!(lines[2], "1970-01-01T00:00:02.500Z,12.5,\"AUTO, MANUAL\"");
    }

    #[test]
    fn test_write_table_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("output.csv");

        write_table(&path, &sample_table()).unwrap();

        let mut reader = ::csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);
        assert!(!path.with_extension("csv.tmp").exists());
    }
}

//! Plate-reader CSV ingest.
//!
//! Input layout (semicolon-delimited):
//!
//! ```text
//! sample;0;0.25;0.5;...
//! blank 1;0.051;0.049;0.050;...
//! wt_1;0.062;;0.071;...
//! ```
//!
//! The first header cell labels the name column and is ignored; the remaining
//! header cells are numeric timestamps. Empty or non-numeric measurement cells
//! are read as missing values.
//!
//! Side files for sample setup use the same delimiter and have no header:
//!
//! - names: `location;new name`
//! - blanks: `location;ref1,ref2,...` (references are names or locations)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::data::Dataset;
use crate::error::AppError;

pub const DELIMITER: u8 = b';';

/// Raw table as read from disk, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateTable {
    pub times: Vec<f64>,
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl PlateTable {
    pub fn into_dataset(self) -> Result<Dataset, AppError> {
        Ok(Dataset::new(self.times, self.rows)?)
    }
}

fn open(path: &Path, what: &str) -> Result<File, AppError> {
    File::open(path).map_err(|e| AppError::input(format!("Failed to open {what} '{}': {e}", path.display())))
}

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>()
        .ok()
        .or_else(|| cell.replace(',', ".").parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_times(headers: &StringRecord) -> Result<Vec<f64>, AppError> {
    headers
        .iter()
        .enumerate()
        .skip(1)
        .map(|(col, cell)| {
            parse_cell(cell).ok_or_else(|| {
                AppError::input(format!("Invalid timestamp '{cell}' in header column {}", col + 1))
            })
        })
        .collect()
}

/// Parse a plate table from any reader.
pub fn read_plate<R: Read>(reader: R) -> Result<PlateTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let times = parse_times(&headers)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, plus the header line.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::input(format!("CSV parse error on line {line}: {e}")))?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        let name = record.get(0).unwrap_or_default().to_string();
        let values = record.iter().skip(1).map(parse_cell).collect();
        rows.push((name, values));
    }

    debug!(samples = rows.len(), timestamps = times.len(), "read plate table");
    Ok(PlateTable { times, rows })
}

pub fn load_plate(path: &Path) -> Result<PlateTable, AppError> {
    read_plate(open(path, "CSV")?)
}

/// Load and validate a dataset in one step.
pub fn load_dataset(path: &Path) -> Result<Dataset, AppError> {
    load_plate(path)?.into_dataset()
}

/// Write a plate table in the ingest format.
pub fn write_plate(path: &Path, times: &[f64], rows: &[(String, Vec<Option<f64>>)]) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create CSV '{}': {e}", path.display())))?;

    let header = std::iter::once("sample".to_string()).chain(times.iter().map(|t| t.to_string()));
    writer
        .write_record(header)
        .map_err(|e| AppError::internal(format!("Failed to write CSV header: {e}")))?;
    for (name, values) in rows {
        let cells = std::iter::once(name.clone())
            .chain(values.iter().map(|v| v.map(|x| format!("{x:.6}")).unwrap_or_default()));
        writer
            .write_record(cells)
            .map_err(|e| AppError::internal(format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::internal(format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

fn read_pairs(path: &Path, what: &str) -> Result<Vec<(String, String)>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(open(path, what)?);

    let mut pairs = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| AppError::input(format!("Invalid {what} on line {line}: {e}")))?;
        let key = record.get(0).unwrap_or_default();
        if key.is_empty() || key.starts_with('#') {
            continue;
        }
        let value = record
            .get(1)
            .ok_or_else(|| AppError::input(format!("Invalid {what} on line {line}: expected 'location;value'")))?;
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

/// `(location, new name)` pairs.
pub fn read_name_map(path: &Path) -> Result<Vec<(String, String)>, AppError> {
    read_pairs(path, "name map")
}

/// `(location, blank references)` pairs; an empty list disables blanking for that sample.
pub fn read_blank_map(path: &Path) -> Result<Vec<(String, Vec<String>)>, AppError> {
    Ok(read_pairs(path, "blank map")?
        .into_iter()
        .map(|(loc, refs)| {
            let refs = refs
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
            (loc, refs)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_and_garbage_cells_become_none() {
        let text = "name;0;1;2\nA;0.1;;x\nB;0,2;0.3;0.4\n";
        let table = read_plate(text.as_bytes()).unwrap();
        assert_eq!(table.times, vec![0.0, 1.0, 2.0]);
        assert_eq!(table.rows[0], ("A".to_string(), vec![Some(0.1), None, None]));
        assert_eq!(table.rows[1].1, vec![Some(0.2), Some(0.3), Some(0.4)]);
    }

    #[test]
    fn bad_timestamp_header_is_input_error() {
        let err = read_plate("name;0;later\nA;1;2\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(err.message().contains("later"));
    }

    #[test]
    fn ragged_rows_are_rejected_by_the_dataset() {
        let table = read_plate("name;0;1;2\nA;1;2\n".as_bytes()).unwrap();
        assert!(table.into_dataset().is_err());
    }

    #[test]
    fn side_files_parse() {
        let mut names = tempfile::NamedTempFile::new().unwrap();
        writeln!(names, "# location;name\n1;wt_1\n2;-\n").unwrap();
        assert_eq!(
            read_name_map(names.path()).unwrap(),
            vec![("1".to_string(), "wt_1".to_string()), ("2".to_string(), "-".to_string())]
        );

        let mut blanks = tempfile::NamedTempFile::new().unwrap();
        writeln!(blanks, "3;1, blank 2\n4;").unwrap();
        let map = read_blank_map(blanks.path()).unwrap();
        assert_eq!(map[0], ("3".to_string(), vec!["1".to_string(), "blank 2".to_string()]));
        assert!(map[1].1.is_empty());
    }

    #[test]
    fn written_plate_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.csv");
        let rows = vec![
            ("blank".to_string(), vec![Some(0.05), Some(0.05)]),
            ("wt_1".to_string(), vec![None, Some(0.25)]),
        ];
        write_plate(&path, &[0.0, 0.5], &rows).unwrap();
        let table = load_plate(&path).unwrap();
        assert_eq!(table.times, vec![0.0, 0.5]);
        assert_eq!(table.rows, rows);
    }
}

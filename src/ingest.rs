use std::io::Read;
use std::path::Path;

use calamine::{open_workbook, Data, Range, Reader, Xlsx};

use crate::error::{ReportError, ReportResult};
use crate::models::InstallationRecord;

/// Reads a spreadsheet export into rows keyed by trimmed header text.
///
/// Ragged rows are accepted; missing trailing cells read as empty. Rows where
/// every cell is blank are dropped.
pub fn read_records<R: Read>(reader: R) -> ReportResult<Vec<InstallationRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut record = InstallationRecord::new();
        for (i, header) in headers.iter().enumerate() {
            record.insert(header.clone(), row.get(i).unwrap_or("").to_string());
        }
        records.push(record);
    }

    Ok(records)
}

pub fn read_csv_file(path: &Path) -> ReportResult<Vec<InstallationRecord>> {
    let file = std::fs::File::open(path)?;
    let records = read_records(file)?;
    tracing::info!(path = %path.display(), rows = records.len(), "imported installation rows");
    Ok(records)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(text) => text.clone(),
        Data::Int(value) => value.to_string(),
        // whole-number floats are how Excel stores most counts
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        other => other.to_string(),
    }
}

/// First row is the header; the rest follow the same rules as CSV rows.
pub fn records_from_range(range: &Range<Data>) -> Vec<InstallationRecord> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell_text(cell).trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        if cells.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut record = InstallationRecord::new();
        for (i, header) in headers.iter().enumerate() {
            record.insert(header.clone(), cells.get(i).cloned().unwrap_or_default());
        }
        records.push(record);
    }
    records
}

/// Reads the first worksheet of an `.xlsx` workbook.
pub fn read_xlsx_file(path: &Path) -> ReportResult<Vec<InstallationRecord>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_name = workbook.sheet_names().first().cloned().ok_or_else(|| {
        ReportError::MissingInput(format!("{} has no worksheets", path.display()))
    })?;
    let range = workbook.worksheet_range(&sheet_name)?;
    let records = records_from_range(&range);
    tracing::info!(path = %path.display(), sheet = %sheet_name, rows = records.len(), "imported installation rows");
    Ok(records)
}

/// Picks the reader by file extension: `.xlsx`/`.xlsm` as workbooks, anything else as CSV.
pub fn read_spreadsheet(path: &Path) -> ReportResult<Vec<InstallationRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => read_xlsx_file(path),
        _ => read_csv_file(path),
    }
}

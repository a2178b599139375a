//! Spreadsheet readers for manifest uploads.
//!
//! Both formats are reduced to the same shape: a trimmed header row and
//! one [`RawRow`] per non-empty data row, cells keyed by the canonical
//! column header so lookups in the validator are exact-match.

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

use super::{RawRow, MANIFEST_COLUMNS};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported file type '{0}': expected .csv or .xlsx")]
    UnsupportedFormat(String),

    #[error("could not read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not read workbook: {0}")]
    Xlsx(String),

    #[error("the file has no header row")]
    MissingHeader,
}

/// A parsed manifest file, format differences erased.
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Parse an uploaded manifest. The format is chosen by file extension,
/// case-insensitively.
pub fn parse_spreadsheet(file_name: &str, bytes: &[u8]) -> Result<Spreadsheet, ParseError> {
    match extension(file_name).as_deref() {
        Some("csv") => parse_csv(bytes),
        Some("xlsx") => parse_xlsx(bytes),
        _ => Err(ParseError::UnsupportedFormat(file_name.to_string())),
    }
}

fn extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
}

/// Map a raw header cell onto the expected column name it matches,
/// ignoring case. Unknown headers are kept as-is and simply never
/// consulted by the validator.
fn canonical_header(raw: &str) -> String {
    let trimmed = raw.trim();
    MANIFEST_COLUMNS
        .iter()
        .find(|expected| expected.eq_ignore_ascii_case(trimmed))
        .map(|expected| expected.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn parse_csv(bytes: &[u8]) -> Result<Spreadsheet, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(canonical_header)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::MissingHeader);
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let cells: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.clone(), cell.trim().to_string()))
            .collect();

        if cells.values().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(RawRow {
            // Header is spreadsheet row 1
            row_number: index + 2,
            cells,
        });
    }

    Ok(Spreadsheet { headers, rows })
}

fn parse_xlsx(bytes: &[u8]) -> Result<Spreadsheet, ParseError> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(cursor).map_err(|e: calamine::XlsxError| ParseError::Xlsx(e.to_string()))?;

    // Manifests are single-sheet files; read the first sheet.
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Xlsx("workbook has no sheets".to_string()))?
        .map_err(|e| ParseError::Xlsx(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .ok_or(ParseError::MissingHeader)?
        .iter()
        .map(|cell| canonical_header(&cell_to_string(cell)))
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::MissingHeader);
    }

    let mut rows = Vec::new();
    for (index, sheet_row) in sheet_rows.enumerate() {
        let cells: HashMap<String, String> = headers
            .iter()
            .zip(sheet_row.iter())
            .map(|(header, cell)| (header.clone(), cell_to_string(cell)))
            .collect();

        if cells.values().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(RawRow {
            row_number: index + 2,
            cells,
        });
    }

    Ok(Spreadsheet { headers, rows })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_csv() -> String {
        let mut csv = MANIFEST_COLUMNS.join(",");
        csv.push('\n');
        csv.push_str(
            "FD-2024-00017,Wei Chen,+8613900001111,\"18 Huanshi Road, Guangzhou\",Maria Santos,\
             +639175550101,Cebu,Cebu City,Lahug,23 Salinas Drive,12.5,0.04,AGENT,SEA,STANDARD,\
             DOOR_TO_DOOR,NO,,Kitchenware,1,,,,,\n",
        );
        csv.push_str(
            "FD-2024-00018,Wei Chen,+8613900001111,\"18 Huanshi Road, Guangzhou\",Jose Cruz,\
             +639175550102,Cebu,Mandaue,Tipolo,7 Plaridel St,3,0.01,AGENT,SEA,EXPRESS,PICKUP,\
             YES,200,Phone parts,2,,,,,\n",
        );
        // A row of empty cells, as spreadsheet exports often append
        csv.push_str(",,,,,,,,,,,,,,,,,,,,,,,,\n");
        csv
    }

    #[test]
    fn csv_rows_are_keyed_by_canonical_headers() {
        let sheet = parse_spreadsheet("manifest.csv", sample_csv().as_bytes()).unwrap();

        assert_eq!(sheet.headers.len(), MANIFEST_COLUMNS.len());
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].row_number, 2);
        assert_eq!(sheet.rows[1].row_number, 3);
        assert_eq!(
            sheet.rows[0].cells["Sender Address"],
            "18 Huanshi Road, Guangzhou"
        );
        assert_eq!(sheet.rows[1].cells["Tracking Number"], "FD-2024-00018");
    }

    #[test]
    fn header_matching_ignores_case() {
        let csv = "tracking number,SENDER NAME\nFD-2024-00017,Wei Chen\n";
        let sheet = parse_spreadsheet("m.CSV", csv.as_bytes()).unwrap();

        assert_eq!(sheet.headers[0], "Tracking Number");
        assert_eq!(sheet.headers[1], "Sender Name");
        assert_eq!(sheet.rows[0].cells["Sender Name"], "Wei Chen");
    }

    #[test]
    fn csv_from_disk_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_csv().as_bytes()).unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        let sheet = parse_spreadsheet("uploaded.csv", &bytes).unwrap();
        assert_eq!(sheet.rows.len(), 2);
    }

    #[test]
    fn empty_csv_has_no_header() {
        assert!(matches!(
            parse_spreadsheet("empty.csv", b""),
            Err(ParseError::MissingHeader)
        ));
    }

    #[test]
    fn garbage_xlsx_bytes_are_an_error() {
        let result = parse_spreadsheet("manifest.xlsx", b"this is not a zip archive");
        assert!(matches!(result, Err(ParseError::Xlsx(_))));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert!(matches!(
            parse_spreadsheet("manifest.pdf", b"%PDF-1.4"),
            Err(ParseError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            parse_spreadsheet("no_extension", b""),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }
}

/*!
 * # Manifest Schema Validation
 *
 * An uploaded manifest is a spreadsheet of packages tendered by an
 * overseas agent. This module turns parsed rows into typed
 * [`ManifestRecord`]s and collects per-row field errors. Schema
 * validation is all-or-nothing for the batch: one bad row rejects the
 * whole upload. Address validation against the service-area gazetteer
 * happens later, in the manifests service, because it needs the
 * database.
 *
 * Row numbers are spreadsheet row numbers as an operator sees them:
 * the header is row 1, the first data row is row 2.
 */

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::entities::package::{ReceptionMode, ShippingMode, ShippingParty, ShippingType};

pub mod parser;

pub use parser::{parse_spreadsheet, ParseError, Spreadsheet};

/// The column headers a manifest file must carry, in the order agents
/// are asked to supply them. Matching is case-insensitive and extra
/// columns are ignored.
pub const MANIFEST_COLUMNS: [&str; 25] = [
    "Tracking Number",
    "Sender Name",
    "Sender Phone",
    "Sender Address",
    "Receiver Name",
    "Receiver Phone",
    "Receiver Province",
    "Receiver City",
    "Receiver Barangay",
    "Receiver Street",
    "Weight Kg",
    "Volume M3",
    "Shipping Party",
    "Shipping Mode",
    "Shipping Type",
    "Reception Mode",
    "Fragile",
    "Declared Value",
    "Contents",
    "Pieces",
    "Container No",
    "Agent Ref",
    "Expected Delivery Date",
    "Delivery Instructions",
    "Remarks",
];

lazy_static! {
    static ref TRACKING_NUMBER_RE: Regex = Regex::new(r"^[A-Z0-9-]{6,32}$").unwrap();
}

/// One field-level problem on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    /// Column header the problem belongs to.
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All problems found on a single spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RowErrors {
    /// Spreadsheet row number (header is row 1).
    pub row: usize,
    pub errors: Vec<FieldError>,
}

/// A spreadsheet row as parsed, before any validation. Cells are keyed
/// by the canonical column header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub row_number: usize,
    pub cells: HashMap<String, String>,
}

impl RawRow {
    fn cell(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// A fully validated manifest row. Serialized to JSON and stored on the
/// manifest row record so import does not have to re-parse the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ManifestRecord {
    pub tracking_number: String,
    pub sender_name: String,
    pub sender_phone: String,
    pub sender_address: String,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_province: String,
    pub receiver_city: String,
    pub receiver_barangay: String,
    pub receiver_street: String,
    pub weight_kg: Decimal,
    pub volume_m3: Decimal,
    pub shipping_party: ShippingParty,
    pub shipping_mode: ShippingMode,
    pub shipping_type: ShippingType,
    pub reception_mode: ReceptionMode,
    pub is_fragile: bool,
    pub declared_value: Option<Decimal>,
    pub contents: String,
    pub pieces: i32,
    pub container_no: Option<String>,
    /// Agent's own reference; kept on the manifest row only.
    pub agent_ref: Option<String>,
    pub expected_delivery_date: Option<NaiveDate>,
    /// Lands on the package as its notes.
    pub delivery_instructions: Option<String>,
    /// Row-level remark; kept on the manifest row only.
    pub remarks: Option<String>,
}

/// A validated row together with its spreadsheet position.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub row_number: usize,
    pub record: ManifestRecord,
}

/// Expected columns the header row does not carry.
pub fn missing_columns(headers: &[String]) -> Vec<&'static str> {
    MANIFEST_COLUMNS
        .iter()
        .filter(|expected| !headers.iter().any(|h| h == *expected))
        .copied()
        .collect()
}

/// Validate every row of a parsed manifest. Returns either every row
/// fully typed, or the complete list of per-row errors. Never a mix:
/// one failing row rejects the batch.
pub fn validate_rows(rows: &[RawRow]) -> Result<Vec<ParsedRow>, Vec<RowErrors>> {
    let mut parsed = Vec::with_capacity(rows.len());
    let mut failures: Vec<RowErrors> = Vec::new();

    for row in rows {
        match validate_row(row) {
            Ok(record) => parsed.push(ParsedRow {
                row_number: row.row_number,
                record,
            }),
            Err(errors) => failures.push(RowErrors {
                row: row.row_number,
                errors,
            }),
        }
    }

    if failures.is_empty() {
        Ok(parsed)
    } else {
        failures.sort_by_key(|f| f.row);
        Err(failures)
    }
}

fn validate_row(row: &RawRow) -> Result<ManifestRecord, Vec<FieldError>> {
    let mut errors: Vec<FieldError> = Vec::new();

    let tracking_number = tracking_number(row.cell("Tracking Number"), &mut errors);
    let sender_name = required_text(row, "Sender Name", &mut errors);
    let sender_phone = required_text(row, "Sender Phone", &mut errors);
    let sender_address = required_text(row, "Sender Address", &mut errors);
    let receiver_name = required_text(row, "Receiver Name", &mut errors);
    let receiver_phone = required_text(row, "Receiver Phone", &mut errors);
    let receiver_province = required_text(row, "Receiver Province", &mut errors);
    let receiver_city = required_text(row, "Receiver City", &mut errors);
    let receiver_barangay = required_text(row, "Receiver Barangay", &mut errors);
    let receiver_street = required_text(row, "Receiver Street", &mut errors);
    let weight_kg = required_decimal(row, "Weight Kg", &mut errors);
    let volume_m3 = required_decimal(row, "Volume M3", &mut errors);
    let shipping_party = required_enum::<ShippingParty>(row, "Shipping Party", &mut errors);
    let shipping_mode = required_enum::<ShippingMode>(row, "Shipping Mode", &mut errors);
    let shipping_type = required_enum::<ShippingType>(row, "Shipping Type", &mut errors);
    let reception_mode = required_enum::<ReceptionMode>(row, "Reception Mode", &mut errors);
    let is_fragile = optional_bool(row, "Fragile", &mut errors);
    let declared_value = optional_decimal(row, "Declared Value", &mut errors);
    let contents = required_text(row, "Contents", &mut errors);
    let pieces = pieces(row.cell("Pieces"), &mut errors);
    let expected_delivery_date = optional_date(row, "Expected Delivery Date", &mut errors);

    // The enum fields are None exactly when an error was recorded for them.
    match (shipping_party, shipping_mode, shipping_type, reception_mode) {
        (Some(shipping_party), Some(shipping_mode), Some(shipping_type), Some(reception_mode))
            if errors.is_empty() =>
        {
            Ok(ManifestRecord {
                tracking_number,
                sender_name,
                sender_phone,
                sender_address,
                receiver_name,
                receiver_phone,
                receiver_province,
                receiver_city,
                receiver_barangay,
                receiver_street,
                weight_kg,
                volume_m3,
                shipping_party,
                shipping_mode,
                shipping_type,
                reception_mode,
                is_fragile,
                declared_value,
                contents,
                pieces,
                container_no: optional_text(row, "Container No"),
                agent_ref: optional_text(row, "Agent Ref"),
                expected_delivery_date,
                delivery_instructions: optional_text(row, "Delivery Instructions"),
                remarks: optional_text(row, "Remarks"),
            })
        }
        _ => Err(errors),
    }
}

fn tracking_number(raw: &str, errors: &mut Vec<FieldError>) -> String {
    let value = raw.trim().to_uppercase();
    if value.is_empty() {
        errors.push(FieldError::new("Tracking Number", "is required"));
    } else if !TRACKING_NUMBER_RE.is_match(&value) {
        errors.push(FieldError::new(
            "Tracking Number",
            "must be 6-32 characters of A-Z, 0-9 or '-'",
        ));
    }
    value
}

fn required_text(row: &RawRow, column: &str, errors: &mut Vec<FieldError>) -> String {
    let value = row.cell(column).trim();
    if value.is_empty() {
        errors.push(FieldError::new(column, "is required"));
    }
    value.to_string()
}

fn optional_text(row: &RawRow, column: &str) -> Option<String> {
    let value = row.cell(column).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn required_decimal(row: &RawRow, column: &str, errors: &mut Vec<FieldError>) -> Decimal {
    let raw = row.cell(column).trim();
    if raw.is_empty() {
        errors.push(FieldError::new(column, "is required"));
        return Decimal::ZERO;
    }
    parse_decimal(raw, column, errors).unwrap_or(Decimal::ZERO)
}

fn optional_decimal(row: &RawRow, column: &str, errors: &mut Vec<FieldError>) -> Option<Decimal> {
    let raw = row.cell(column).trim();
    if raw.is_empty() {
        return None;
    }
    parse_decimal(raw, column, errors)
}

fn parse_decimal(raw: &str, column: &str, errors: &mut Vec<FieldError>) -> Option<Decimal> {
    match Decimal::from_str(raw) {
        Ok(value) if value < Decimal::ZERO => {
            errors.push(FieldError::new(column, "must not be negative"));
            None
        }
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(FieldError::new(
                column,
                format!("not a number: '{}'", raw),
            ));
            None
        }
    }
}

/// Blank means one piece.
fn pieces(raw: &str, errors: &mut Vec<FieldError>) -> i32 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 1;
    }
    match raw.parse::<i32>() {
        Ok(value) if value >= 1 => value,
        Ok(_) | Err(_) => {
            errors.push(FieldError::new(
                "Pieces",
                format!("must be a whole number of at least 1, got '{}'", raw),
            ));
            1
        }
    }
}

/// Accepts YES/NO, TRUE/FALSE and 1/0 in any case. Blank means no.
fn optional_bool(row: &RawRow, column: &str, errors: &mut Vec<FieldError>) -> bool {
    let raw = row.cell(column).trim();
    match raw.to_uppercase().as_str() {
        "" | "NO" | "FALSE" | "0" => false,
        "YES" | "TRUE" | "1" => true,
        _ => {
            errors.push(FieldError::new(
                column,
                format!("not a yes/no value: '{}'", raw),
            ));
            false
        }
    }
}

fn optional_date(row: &RawRow, column: &str, errors: &mut Vec<FieldError>) -> Option<NaiveDate> {
    let raw = row.cell(column).trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(FieldError::new(
                column,
                format!("not a valid date (expected YYYY-MM-DD): '{}'", raw),
            ));
            None
        }
    }
}

fn required_enum<T: FromStr>(row: &RawRow, column: &str, errors: &mut Vec<FieldError>) -> Option<T> {
    let raw = row.cell(column).trim();
    if raw.is_empty() {
        errors.push(FieldError::new(column, "is required"));
        return None;
    }
    match normalize_enum_token(raw).parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(FieldError::new(
                column,
                format!("not a recognized value: '{}'", raw),
            ));
            None
        }
    }
}

/// Agents write enum cells in many shapes ("Door to Door", "door-to-door").
/// Normalize to the stored SCREAMING_SNAKE token before parsing.
pub fn normalize_enum_token(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .replace([' ', '-'], "_")
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn complete_row(row_number: usize) -> RawRow {
        let pairs = [
            ("Tracking Number", "FD-2024-00017"),
            ("Sender Name", "Wei Chen"),
            ("Sender Phone", "+86 139 0000 1111"),
            ("Sender Address", "18 Huanshi Road, Guangzhou"),
            ("Receiver Name", "Maria Santos"),
            ("Receiver Phone", "+63 917 555 0101"),
            ("Receiver Province", "Cebu"),
            ("Receiver City", "Cebu City"),
            ("Receiver Barangay", "Lahug"),
            ("Receiver Street", "23 Salinas Drive"),
            ("Weight Kg", "12.5"),
            ("Volume M3", "0.04"),
            ("Shipping Party", "Agent"),
            ("Shipping Mode", "Sea"),
            ("Shipping Type", "Standard"),
            ("Reception Mode", "Door to Door"),
            ("Fragile", "YES"),
            ("Declared Value", "150"),
            ("Contents", "Kitchenware"),
            ("Pieces", "2"),
            ("Container No", "CNU1234567"),
            ("Agent Ref", "GZ-88"),
            ("Expected Delivery Date", "2024-02-20"),
            ("Delivery Instructions", "Call on arrival"),
            ("Remarks", ""),
        ];
        RawRow {
            row_number,
            cells: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn complete_row_parses() {
        let rows = vec![complete_row(2)];
        let parsed = validate_rows(&rows).expect("row should validate");

        assert_eq!(parsed.len(), 1);
        let record = &parsed[0].record;
        assert_eq!(record.tracking_number, "FD-2024-00017");
        assert_eq!(record.weight_kg, dec!(12.5));
        assert_eq!(record.reception_mode, ReceptionMode::DoorToDoor);
        assert!(record.is_fragile);
        assert_eq!(record.pieces, 2);
        assert_eq!(record.declared_value, Some(dec!(150)));
        assert_eq!(
            record.expected_delivery_date,
            NaiveDate::from_ymd_opt(2024, 2, 20)
        );
        assert_eq!(record.delivery_instructions.as_deref(), Some("Call on arrival"));
        assert_eq!(record.remarks, None);
    }

    #[test]
    fn one_bad_row_rejects_the_batch() {
        let mut bad = complete_row(3);
        bad.cells
            .insert("Weight Kg".to_string(), "heavy".to_string());

        let rows = vec![complete_row(2), bad, complete_row(4)];
        let failures = validate_rows(&rows).expect_err("batch should be rejected");

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].row, 3);
        assert_eq!(failures[0].errors[0].field, "Weight Kg");
        assert!(failures[0].errors[0].message.contains("heavy"));
    }

    #[test]
    fn missing_required_fields_are_each_reported() {
        let mut row = complete_row(2);
        row.cells.insert("Receiver Province".to_string(), "".to_string());
        row.cells.remove("Contents");

        let failures = validate_rows(&[row]).expect_err("batch should be rejected");
        let fields: Vec<&str> = failures[0]
            .errors
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert!(fields.contains(&"Receiver Province"));
        assert!(fields.contains(&"Contents"));
    }

    #[test]
    fn enum_cells_are_normalized_before_parsing() {
        assert_eq!(normalize_enum_token("Door to Door"), "DOOR_TO_DOOR");
        assert_eq!(normalize_enum_token("door-to-door"), "DOOR_TO_DOOR");
        assert_eq!(normalize_enum_token("  sea "), "SEA");
        assert_eq!(normalize_enum_token("EXPRESS"), "EXPRESS");

        let mut row = complete_row(2);
        row.cells
            .insert("Shipping Mode".to_string(), "sea freight".to_string());
        let failures = validate_rows(&[row]).expect_err("unknown mode");
        assert_eq!(failures[0].errors[0].field, "Shipping Mode");
    }

    #[test]
    fn fragile_accepts_the_usual_spellings() {
        for (cell, expected) in [
            ("YES", true),
            ("yes", true),
            ("TRUE", true),
            ("1", true),
            ("NO", false),
            ("false", false),
            ("0", false),
            ("", false),
        ] {
            let mut row = complete_row(2);
            row.cells.insert("Fragile".to_string(), cell.to_string());
            let parsed = validate_rows(&[row]).expect("row should validate");
            assert_eq!(parsed[0].record.is_fragile, expected, "cell {:?}", cell);
        }

        let mut row = complete_row(2);
        row.cells.insert("Fragile".to_string(), "maybe".to_string());
        assert!(validate_rows(&[row]).is_err());
    }

    #[test]
    fn blank_pieces_defaults_to_one() {
        let mut row = complete_row(2);
        row.cells.insert("Pieces".to_string(), "".to_string());
        let parsed = validate_rows(&[row]).expect("row should validate");
        assert_eq!(parsed[0].record.pieces, 1);

        let mut row = complete_row(2);
        row.cells.insert("Pieces".to_string(), "0".to_string());
        assert!(validate_rows(&[row]).is_err());
    }

    #[test]
    fn tracking_numbers_are_uppercased_and_checked() {
        let mut row = complete_row(2);
        row.cells
            .insert("Tracking Number".to_string(), "fd-2024-00017".to_string());
        let parsed = validate_rows(&[row]).expect("row should validate");
        assert_eq!(parsed[0].record.tracking_number, "FD-2024-00017");

        for bad in ["abc", "has spaces here", "!!!!!!"] {
            let mut row = complete_row(2);
            row.cells
                .insert("Tracking Number".to_string(), bad.to_string());
            let failures = validate_rows(&[row]).expect_err("tracking number should fail");
            assert_eq!(failures[0].errors[0].field, "Tracking Number");
        }
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut row = complete_row(2);
        row.cells.insert("Weight Kg".to_string(), "-3".to_string());
        let failures = validate_rows(&[row]).expect_err("negative weight");
        assert!(failures[0].errors[0].message.contains("negative"));
    }

    #[test]
    fn missing_columns_lists_what_the_header_lacks() {
        let headers: Vec<String> = MANIFEST_COLUMNS
            .iter()
            .filter(|c| **c != "Volume M3" && **c != "Remarks")
            .map(|c| c.to_string())
            .collect();

        let missing = missing_columns(&headers);
        assert_eq!(missing, vec!["Volume M3", "Remarks"]);
    }

    #[test]
    fn record_survives_json_round_trip() {
        let parsed = validate_rows(&[complete_row(2)]).expect("row should validate");
        let json = serde_json::to_string(&parsed[0].record).unwrap();
        let back: ManifestRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, parsed[0].record);
    }
}

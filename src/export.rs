//! CSV and XLSX rendering of attendance and leave listings.

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::error::AppError;
use crate::model::attendance::AttendanceRow;
use crate::model::leave_request::LeaveRow;

pub const ATTENDANCE_HEADERS: [&str; 4] = ["Staff", "Email", "Date", "Status"];
pub const LEAVE_HEADERS: [&str; 7] = [
    "Staff",
    "Email",
    "Leave Type",
    "Start Date",
    "End Date",
    "Status",
    "Reason",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("xlsx: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        tracing::error!(error = %e, "Export failed");
        AppError::Internal(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        raw.parse()
            .map_err(|_| AppError::BadRequest(format!("Unsupported export format: {}", raw)))
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn file_name(self, stem: &str) -> String {
        format!("{}.{}", stem, self)
    }
}

/// Header row plus string cells, ready for either writer.
pub struct Table {
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<String>>,
}

pub fn attendance_table(rows: &[AttendanceRow]) -> Table {
    Table {
        headers: &ATTENDANCE_HEADERS,
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    r.username.clone(),
                    r.email.clone(),
                    r.date.to_string(),
                    r.status.to_string(),
                ]
            })
            .collect(),
    }
}

pub fn leave_table(rows: &[LeaveRow]) -> Table {
    Table {
        headers: &LEAVE_HEADERS,
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    r.username.clone(),
                    r.email.clone(),
                    r.leave_type.to_string(),
                    r.start_date.to_string(),
                    r.end_date.to_string(),
                    r.status.to_string(),
                    r.reason.clone(),
                ]
            })
            .collect(),
    }
}

fn to_csv(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

fn to_xlsx(table: &Table, sheet: &str) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet)?;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    for (i, row) in table.rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            worksheet.write_string(i as u32 + 1, col as u16, cell)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn render(table: &Table, format: ExportFormat, sheet: &str) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(table),
        ExportFormat::Xlsx => to_xlsx(table, sheet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use crate::model::leave_request::{LeaveStatus, LeaveType};
    use chrono::{NaiveDate, Utc};

    fn attendance(n: u64) -> Vec<AttendanceRow> {
        (1..=n)
            .map(|i| AttendanceRow {
                id: i,
                staff_id: i,
                username: format!("user{}", i),
                email: format!("user{}@staffhub.test", i),
                date: NaiveDate::from_ymd_opt(2026, 1, i as u32).unwrap(),
                status: AttendanceStatus::Late,
                timestamp: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn format_parsing() {
        assert_eq!(ExportFormat::parse("csv").unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::parse("XLSX").unwrap(), ExportFormat::Xlsx);
        assert!(matches!(ExportFormat::parse("pdf"), Err(AppError::BadRequest(_))));
        assert_eq!(ExportFormat::Xlsx.file_name("attendance_report"), "attendance_report.xlsx");
    }

    #[test]
    fn csv_has_header_plus_one_line_per_row() {
        let bytes = render(&attendance_table(&attendance(3)), ExportFormat::Csv, "Attendance").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Staff,Email,Date,Status");
        assert_eq!(lines[1], "user1,user1@staffhub.test,2026-01-01,late");
    }

    #[test]
    fn csv_quotes_reasons_with_commas() {
        let rows = vec![LeaveRow {
            id: 1,
            staff_id: 1,
            username: "alice".into(),
            email: "alice@staffhub.test".into(),
            leave_type: LeaveType::Sick,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 3).unwrap(),
            reason: "Flu, fever".into(),
            evidence: None,
            status: LeaveStatus::Approved,
            applied_at: Utc::now(),
        }];
        let bytes = render(&leave_table(&rows), ExportFormat::Csv, "Leave").unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        assert_eq!(reader.headers().unwrap().len(), LEAVE_HEADERS.len());
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][2], "sick");
        assert_eq!(&records[0][6], "Flu, fever");
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = render(&attendance_table(&attendance(2)), ExportFormat::Xlsx, "Attendance").unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn empty_listing_still_has_headers() {
        let bytes = render(&attendance_table(&[]), ExportFormat::Csv, "Attendance").unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap().trim_end(), "Staff,Email,Date,Status");
    }
}

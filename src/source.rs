use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::PgPool;
use tracing::debug;

use crate::db;
use crate::error::ReportError;
use crate::models::{AttendanceRecord, RawAttendanceRow};
use crate::window::YearMonth;

/// Supplies every attendance row dated inside the requested month.
pub trait RecordSource {
    async fn fetch_month(&self, month: YearMonth) -> Result<Vec<RawAttendanceRow>, ReportError>;
}

/// Postgres-backed source over `attendance.attendance_logs`.
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecordSource for PgSource {
    async fn fetch_month(&self, month: YearMonth) -> Result<Vec<RawAttendanceRow>, ReportError> {
        db::fetch_month(&self.pool, month).await
    }
}

/// CSV file with an `employee_id,name,date,status` header.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for CsvSource {
    async fn fetch_month(&self, month: YearMonth) -> Result<Vec<RawAttendanceRow>, ReportError> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|err| {
            ReportError::source_unavailable(format!("cannot open {}", self.path.display()), err)
        })?;

        let mut rows = Vec::new();
        for (idx, result) in reader.deserialize::<RawAttendanceRow>().enumerate() {
            let mut row = result.map_err(|err| ReportError::MalformedRecord {
                row: idx + 1,
                employee_id: None,
                reason: err.to_string(),
            })?;
            // Numbered before filtering so errors point at the file's data row.
            row.row = idx + 1;

            // Unparseable dates are kept so validation can name them.
            let in_window = match row.date.as_deref().map(parse_date) {
                Some(Some(date)) => month.contains(date),
                _ => true,
            };
            if in_window {
                rows.push(row);
            }
        }

        debug!(path = %self.path.display(), rows = rows.len(), "read csv attendance rows");
        Ok(rows)
    }
}

/// Turns raw rows into records, failing on the first malformed one.
///
/// Surrounding whitespace is trimmed from every field before identities are
/// compared, so `"Bob "` and `"Bob"` are the same name. Errors carry the row
/// number the source assigned.
pub fn validate_rows(
    rows: Vec<RawAttendanceRow>,
    month: YearMonth,
) -> Result<Vec<AttendanceRecord>, ReportError> {
    rows.into_iter().map(|row| validate_row(row, month)).collect()
}

fn validate_row(row: RawAttendanceRow, month: YearMonth) -> Result<AttendanceRecord, ReportError> {
    let row_number = row.row;
    let employee_id = non_blank(row_number, "employee_id", row.employee_id);
    let malformed = |reason: String| ReportError::MalformedRecord {
        row: row_number,
        employee_id: employee_id.clone(),
        reason,
    };

    let Some(id) = employee_id.clone() else {
        return Err(malformed("missing employee_id".to_string()));
    };
    let name = non_blank(row_number, "name", row.name).ok_or_else(|| malformed("missing name".to_string()))?;
    let status = non_blank(row_number, "status", row.status).ok_or_else(|| malformed("missing status".to_string()))?;
    let raw_date = non_blank(row_number, "date", row.date).ok_or_else(|| malformed("missing date".to_string()))?;
    let date = parse_date(&raw_date)
        .ok_or_else(|| malformed(format!("unparseable date {raw_date:?}")))?;
    if !month.contains(date) {
        return Err(malformed(format!("date {date} outside {month}")));
    }

    Ok(AttendanceRecord {
        employee_id: id,
        name,
        date,
        status,
    })
}

/// Accepts a plain date or a timestamp; the time part is dropped.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|timestamp| timestamp.date())
        })
}

fn non_blank(row: usize, field: &str, value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.len() != value.len() && !trimmed.is_empty() {
        debug!(row, field, raw = ?value, "trimmed whitespace around field");
    }
    Some(trimmed.to_string()).filter(|v| !v.is_empty())
}

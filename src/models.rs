use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Status whose share of days is reported as the attendance percentage.
pub const PRESENT: &str = "Present";

pub const TOTAL_DAYS_COLUMN: &str = "Total Days";
pub const ATTENDANCE_PCT_COLUMN: &str = "Attendance %";
pub const RAW_DATE_COLUMN: &str = "date";
pub const RAW_COLUMNS: [&str; 4] = ["employee_id", "name", RAW_DATE_COLUMN, "status"];

/// Row as handed over by a record source, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAttendanceRow {
    /// 1-based position in the source, set by the source itself.
    #[serde(skip)]
    pub row: usize,
    pub employee_id: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub employee_id: String,
    pub name: String,
    pub date: NaiveDate,
    pub status: String,
}

/// One wide-format row. `counts` holds every status of the table,
/// zero-filled where the employee never had it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeSummary {
    pub employee_id: String,
    pub name: String,
    pub counts: BTreeMap<String, u32>,
    pub total_days: u32,
    pub attendance_pct: f64,
}

impl EmployeeSummary {
    pub fn count(&self, status: &str) -> u32 {
        self.counts.get(status).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTable {
    /// Status columns in first-seen order across the input.
    pub statuses: Vec<String>,
    pub rows: Vec<EmployeeSummary>,
}

impl SummaryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// employee_id, name, each status, Total Days, Attendance %.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec!["employee_id".to_string(), "name".to_string()];
        columns.extend(self.statuses.iter().cloned());
        columns.push(TOTAL_DAYS_COLUMN.to_string());
        columns.push(ATTENDANCE_PCT_COLUMN.to_string());
        columns
    }
}

/// Top-N rows of a summary table, best attendance first.
pub type RankedSubset = Vec<EmployeeSummary>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SheetKind {
    Raw,
    Summary,
}

impl SheetKind {
    pub fn sheet_name(&self) -> &'static str {
        match self {
            SheetKind::Raw => "Raw Attendance",
            SheetKind::Summary => "Monthly Summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FormatRule {
    /// Display as a whole percentage.
    Percentage,
    /// Display as a calendar date without time.
    CalendarDate,
    /// Flag values strictly below the threshold.
    HighlightBelow(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRule {
    pub sheet: SheetKind,
    pub column: String,
    pub rule: FormatRule,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub series_name: String,
    pub x_axis: String,
    pub y_axis: String,
    pub category_labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSpec {
    pub fn is_empty(&self) -> bool {
        self.category_labels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSpec {
    pub raw_sheet: Vec<AttendanceRecord>,
    pub summary_sheet: SummaryTable,
    pub formatting_rules: Vec<ColumnRule>,
    pub chart: ChartSpec,
}

impl ReportSpec {
    pub fn rules_for(&self, sheet: SheetKind) -> impl Iterator<Item = &ColumnRule> {
        self.formatting_rules
            .iter()
            .filter(move |rule| rule.sheet == sheet)
    }
}

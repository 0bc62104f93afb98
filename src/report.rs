use std::fmt::Write;

use crate::config::ReportConfig;
use crate::models::{
    AttendanceRecord, ChartSpec, ColumnRule, FormatRule, RankedSubset, ReportSpec, SheetKind,
    SummaryTable, ATTENDANCE_PCT_COLUMN, RAW_DATE_COLUMN,
};
use crate::window::YearMonth;

/// Shapes records, the summary table and its ranked subset into a value the
/// renderer can draw without further decisions.
pub fn compose(
    records: &[AttendanceRecord],
    table: &SummaryTable,
    ranked: &RankedSubset,
    config: &ReportConfig,
) -> ReportSpec {
    ReportSpec {
        raw_sheet: records.to_vec(),
        summary_sheet: table.clone(),
        formatting_rules: formatting_rules(config.highlight_below),
        chart: chart_series(ranked, config.top_n),
    }
}

/// Rules are keyed by column name so they survive any change in status columns.
pub fn formatting_rules(highlight_below: f64) -> Vec<ColumnRule> {
    vec![
        ColumnRule {
            sheet: SheetKind::Raw,
            column: RAW_DATE_COLUMN.to_string(),
            rule: FormatRule::CalendarDate,
        },
        ColumnRule {
            sheet: SheetKind::Summary,
            column: ATTENDANCE_PCT_COLUMN.to_string(),
            rule: FormatRule::Percentage,
        },
        ColumnRule {
            sheet: SheetKind::Summary,
            column: ATTENDANCE_PCT_COLUMN.to_string(),
            rule: FormatRule::HighlightBelow(highlight_below),
        },
    ]
}

/// Categories and values come from the same ranked rows, index for index.
pub fn chart_series(ranked: &RankedSubset, top_n: usize) -> ChartSpec {
    let (category_labels, values) = ranked
        .iter()
        .map(|row| (row.name.clone(), row.attendance_pct))
        .unzip();

    ChartSpec {
        title: format!("Top {top_n} Employee Attendance (%)"),
        series_name: "Top Attendance %".to_string(),
        x_axis: "Employee Name".to_string(),
        y_axis: "Attendance %".to_string(),
        category_labels,
        values,
    }
}

/// Plain-text listing of the ranked subset for terminal output.
pub fn summary_text(month: YearMonth, table: &SummaryTable, ranked: &RankedSubset) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Attendance summary for {month}");
    let _ = writeln!(output, "{} employees", table.len());

    if ranked.is_empty() {
        let _ = writeln!(output, "No attendance records for this month.");
        return output;
    }

    let _ = writeln!(output, "Top attendance:");
    for row in ranked {
        let _ = writeln!(
            output,
            "- {} ({}) {:.0}% across {} days",
            row.name,
            row.employee_id,
            row.attendance_pct * 100.0,
            row.total_days
        );
    }

    output
}

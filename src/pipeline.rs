use std::path::PathBuf;

use tracing::{info, warn};

use crate::aggregate::{aggregate, rank};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::models::{AttendanceRecord, RankedSubset, SummaryTable};
use crate::render::XlsxRenderer;
use crate::report::compose;
use crate::source::{validate_rows, RecordSource};
use crate::window::YearMonth;

/// Validated month of records with its summary and ranked subset.
#[derive(Debug, Clone)]
pub struct MonthSummary {
    pub records: Vec<AttendanceRecord>,
    pub table: SummaryTable,
    pub ranked: RankedSubset,
}

pub async fn summarize_month<S: RecordSource>(
    source: &S,
    month: YearMonth,
    top_n: usize,
) -> Result<MonthSummary, ReportError> {
    let rows = source.fetch_month(month).await?;
    let records = validate_rows(rows, month)?;
    if records.is_empty() {
        warn!(%month, "no attendance records in window");
    }

    let table = aggregate(&records)?;
    let ranked = rank(&table, top_n);
    info!(
        %month,
        records = records.len(),
        employees = table.len(),
        ranked = ranked.len(),
        "summarized attendance"
    );

    Ok(MonthSummary {
        records,
        table,
        ranked,
    })
}

/// Fetches, aggregates and renders one month, returning the absolute path
/// of the written workbook. Nothing is written when any step fails.
pub async fn generate_report<S: RecordSource>(
    source: &S,
    month: YearMonth,
    config: &ReportConfig,
) -> Result<PathBuf, ReportError> {
    let summary = summarize_month(source, month, config.top_n).await?;
    let spec = compose(&summary.records, &summary.table, &summary.ranked, config);
    XlsxRenderer::new().write_to(&spec, &config.output_path)
}

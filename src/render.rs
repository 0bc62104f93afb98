use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use rust_xlsxwriter::{
    Chart, ChartType, Color, ConditionalFormatCell, ConditionalFormatCellRule, ExcelDateTime,
    Format, FormatBorder, Workbook, Worksheet,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::ReportError;
use crate::models::{
    AttendanceRecord, ChartSpec, FormatRule, ReportSpec, SheetKind, SummaryTable, RAW_COLUMNS,
};

const DATE_COLUMN_WIDTH: f64 = 20.0;
const PERCENT_COLUMN_WIDTH: f64 = 12.0;
const DEFAULT_COLUMN_WIDTH: f64 = 14.0;

/// Turns a composed report into an output artifact.
pub trait Renderer {
    type Output;

    fn render(&self, spec: &ReportSpec) -> Result<Self::Output, ReportError>;
}

/// Two-sheet xlsx workbook renderer.
#[derive(Clone, Debug, Default)]
pub struct XlsxRenderer;

struct SheetFormats {
    header: Format,
    date: Format,
    percent: Format,
    highlight: Format,
}

impl SheetFormats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(0x4472C4))
                .set_font_color(Color::White)
                .set_border(FormatBorder::Thin),
            date: Format::new().set_num_format("yyyy-mm-dd"),
            percent: Format::new().set_num_format("0%"),
            highlight: Format::new().set_font_color(Color::Red).set_bold(),
        }
    }
}

impl Renderer for XlsxRenderer {
    type Output = Vec<u8>;

    fn render(&self, spec: &ReportSpec) -> Result<Vec<u8>, ReportError> {
        let mut workbook = self.build(spec)?;
        let buffer = workbook.save_to_buffer()?;
        debug!(bytes = buffer.len(), "rendered workbook");
        Ok(buffer)
    }
}

impl XlsxRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Lays out the raw sheet followed by the summary sheet.
    pub fn build(&self, spec: &ReportSpec) -> Result<Workbook, ReportError> {
        let formats = SheetFormats::new();
        let mut workbook = Workbook::new();

        self.add_raw_sheet(&mut workbook, spec, &formats)?;
        self.add_summary_sheet(&mut workbook, spec, &formats)?;
        Ok(workbook)
    }

    /// Renders the workbook and atomically replaces `path` with it.
    pub fn write_to(&self, spec: &ReportSpec, path: &Path) -> Result<PathBuf, ReportError> {
        let bytes = self.render(spec)?;
        let written = write_atomic(&bytes, path)?;
        info!(path = %written.display(), "wrote attendance workbook");
        Ok(written)
    }

    fn add_raw_sheet(
        &self,
        workbook: &mut Workbook,
        spec: &ReportSpec,
        formats: &SheetFormats,
    ) -> Result<(), ReportError> {
        let columns: Vec<String> = RAW_COLUMNS.iter().map(|c| c.to_string()).collect();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SheetKind::Raw.sheet_name())?;
        write_headers(sheet, &columns, &formats.header)?;

        let date_col = rule_column(spec, SheetKind::Raw, &columns, |rule| {
            matches!(rule, FormatRule::CalendarDate)
        });

        for (idx, record) in spec.raw_sheet.iter().enumerate() {
            let row = (idx + 1) as u32;
            write_raw_record(sheet, row, record, date_col, formats)?;
        }

        apply_widths(sheet, spec, SheetKind::Raw, &columns)?;
        sheet.set_freeze_panes(1, 0)?;
        Ok(())
    }

    fn add_summary_sheet(
        &self,
        workbook: &mut Workbook,
        spec: &ReportSpec,
        formats: &SheetFormats,
    ) -> Result<(), ReportError> {
        let table = &spec.summary_sheet;
        let columns = table.columns();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SheetKind::Summary.sheet_name())?;
        write_headers(sheet, &columns, &formats.header)?;

        let layout = summary_layout(spec);
        write_summary_rows(sheet, table, layout.percent_col, formats)?;
        apply_widths(sheet, spec, SheetKind::Summary, &columns)?;

        if !table.is_empty() {
            sheet.autofilter(0, 0, layout.last_row, layout.last_col)?;

            for &(col, threshold) in &layout.highlights {
                let highlight = ConditionalFormatCell::new()
                    .set_rule(ConditionalFormatCellRule::LessThan(threshold))
                    .set_format(&formats.highlight);
                sheet.add_conditional_format(1, col, layout.last_row, col, &highlight)?;
            }
        }
        sheet.set_freeze_panes(1, 0)?;

        self.add_top_chart(sheet, &spec.chart, layout.helper_col, formats)?;
        Ok(())
    }

    fn add_top_chart(
        &self,
        sheet: &mut Worksheet,
        chart_spec: &ChartSpec,
        helper_col: u16,
        formats: &SheetFormats,
    ) -> Result<(), ReportError> {
        if chart_spec.is_empty() {
            debug!("no ranked rows, skipping chart");
            return Ok(());
        }

        sheet.write_with_format(0, helper_col, chart_spec.x_axis.as_str(), &formats.header)?;
        sheet.write_with_format(0, helper_col + 1, chart_spec.y_axis.as_str(), &formats.header)?;
        for (idx, (label, value)) in chart_spec
            .category_labels
            .iter()
            .zip(&chart_spec.values)
            .enumerate()
        {
            let row = (idx + 1) as u32;
            sheet.write_string(row, helper_col, label)?;
            sheet.write_number_with_format(row, helper_col + 1, *value, &formats.percent)?;
        }
        sheet.set_column_width(helper_col, DEFAULT_COLUMN_WIDTH)?;
        sheet.set_column_width(helper_col + 1, PERCENT_COLUMN_WIDTH)?;

        let name = SheetKind::Summary.sheet_name();
        let last = chart_spec.category_labels.len() as u32;
        let mut chart = Chart::new(ChartType::Column);
        chart
            .add_series()
            .set_name(chart_spec.series_name.as_str())
            .set_categories((name, 1, helper_col, last, helper_col))
            .set_values((name, 1, helper_col + 1, last, helper_col + 1));
        chart.title().set_name(chart_spec.title.as_str());
        chart.x_axis().set_name(chart_spec.x_axis.as_str());
        chart.y_axis().set_name(chart_spec.y_axis.as_str());
        chart.y_axis().set_num_format("0%");
        chart.legend().set_hidden();

        sheet.insert_chart(last + 2, helper_col, &chart)?;
        Ok(())
    }
}

/// Cell positions on the summary sheet, resolved from column names.
#[derive(Debug, Clone, PartialEq)]
struct SummaryLayout {
    last_row: u32,
    last_col: u16,
    percent_col: Option<u16>,
    /// (column, threshold) pairs for the conditional highlight.
    highlights: Vec<(u16, f64)>,
    /// First column of the Top-N helper table, directly right of the summary.
    helper_col: u16,
}

fn summary_layout(spec: &ReportSpec) -> SummaryLayout {
    let columns = spec.summary_sheet.columns();
    let last_col = (columns.len() - 1) as u16;

    let percent_col = rule_column(spec, SheetKind::Summary, &columns, |rule| {
        matches!(rule, FormatRule::Percentage)
    });
    let highlights = spec
        .rules_for(SheetKind::Summary)
        .filter_map(|rule| match rule.rule {
            FormatRule::HighlightBelow(threshold) => {
                column_index(&columns, &rule.column).map(|col| (col, threshold))
            }
            _ => None,
        })
        .collect();

    SummaryLayout {
        last_row: spec.summary_sheet.len() as u32,
        last_col,
        percent_col,
        highlights,
        helper_col: last_col + 1,
    }
}

fn write_headers(sheet: &mut Worksheet, columns: &[String], header: &Format) -> Result<(), ReportError> {
    for (col, name) in columns.iter().enumerate() {
        sheet.write_with_format(0, col as u16, name.as_str(), header)?;
    }
    Ok(())
}

fn write_raw_record(
    sheet: &mut Worksheet,
    row: u32,
    record: &AttendanceRecord,
    date_col: Option<u16>,
    formats: &SheetFormats,
) -> Result<(), ReportError> {
    let date = ExcelDateTime::from_ymd(
        record.date.year() as u16,
        record.date.month() as u8,
        record.date.day() as u8,
    )?;

    sheet.write_string(row, 0, &record.employee_id)?;
    sheet.write_string(row, 1, &record.name)?;
    if date_col == Some(2) {
        sheet.write_with_format(row, 2, &date, &formats.date)?;
    } else {
        sheet.write_string(row, 2, record.date.format("%Y-%m-%d").to_string())?;
    }
    sheet.write_string(row, 3, &record.status)?;
    Ok(())
}

fn write_summary_rows(
    sheet: &mut Worksheet,
    table: &SummaryTable,
    percent_col: Option<u16>,
    formats: &SheetFormats,
) -> Result<(), ReportError> {
    let total_col = (table.statuses.len() + 2) as u16;
    let pct_col = total_col + 1;

    for (idx, summary) in table.rows.iter().enumerate() {
        let row = (idx + 1) as u32;
        sheet.write_string(row, 0, &summary.employee_id)?;
        sheet.write_string(row, 1, &summary.name)?;
        for (offset, status) in table.statuses.iter().enumerate() {
            sheet.write_number(row, (offset + 2) as u16, summary.count(status))?;
        }
        sheet.write_number(row, total_col, summary.total_days)?;
        if percent_col == Some(pct_col) {
            sheet.write_number_with_format(row, pct_col, summary.attendance_pct, &formats.percent)?;
        } else {
            sheet.write_number(row, pct_col, summary.attendance_pct)?;
        }
    }
    Ok(())
}

fn apply_widths(
    sheet: &mut Worksheet,
    spec: &ReportSpec,
    kind: SheetKind,
    columns: &[String],
) -> Result<(), ReportError> {
    for (col, name) in columns.iter().enumerate() {
        let width = spec
            .rules_for(kind)
            .filter(|rule| &rule.column == name)
            .find_map(|rule| match rule.rule {
                FormatRule::CalendarDate => Some(DATE_COLUMN_WIDTH),
                FormatRule::Percentage => Some(PERCENT_COLUMN_WIDTH),
                FormatRule::HighlightBelow(_) => None,
            })
            .unwrap_or(DEFAULT_COLUMN_WIDTH);
        sheet.set_column_width(col as u16, width)?;
    }
    Ok(())
}

fn rule_column(
    spec: &ReportSpec,
    kind: SheetKind,
    columns: &[String],
    matches: impl Fn(&FormatRule) -> bool,
) -> Option<u16> {
    spec.rules_for(kind)
        .find(|rule| matches(&rule.rule))
        .and_then(|rule| column_index(columns, &rule.column))
}

pub fn column_index(columns: &[String], name: &str) -> Option<u16> {
    columns
        .iter()
        .position(|column| column == name)
        .map(|idx| idx as u16)
}

/// Writes `bytes` to a temp file beside `path` and renames it into place.
/// The temp file is removed on every failure path; returns the absolute path.
pub fn write_atomic(bytes: &[u8], path: &Path) -> Result<PathBuf, ReportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;

    Ok(std::fs::canonicalize(path)?)
}

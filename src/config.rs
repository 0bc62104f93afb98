use std::path::PathBuf;

pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_HIGHLIGHT_BELOW: f64 = 0.80;
pub const DEFAULT_OUTPUT_FILE: &str = "employee_attendance_report.xlsx";

/// Tunables for a single report run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Size of the ranked subset shown in the chart.
    pub top_n: usize,
    /// Attendance percentages strictly below this are highlighted.
    pub highlight_below: f64,
    pub output_path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            highlight_below: DEFAULT_HIGHLIGHT_BELOW,
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }
}

impl ReportConfig {
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_highlight_below(mut self, threshold: f64) -> Self {
        self.highlight_below = threshold;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }
}

/// clap value parser for a ranked subset size of at least one.
pub fn parse_top_n(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("top-n must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("{value:?} is not a positive integer")),
    }
}

/// clap value parser for a threshold in [0, 1].
pub fn parse_fraction(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("{value:?} is not a number"))?;
    if (0.0..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("{parsed} must be between 0 and 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_report_conventions() {
        let config = ReportConfig::default();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.highlight_below, 0.80);
        assert_eq!(config.output_path, PathBuf::from("employee_attendance_report.xlsx"));
    }

    #[test]
    fn builders_override_defaults() {
        let config = ReportConfig::default()
            .with_top_n(3)
            .with_highlight_below(0.9)
            .with_output_path("out/july.xlsx");
        assert_eq!(config.top_n, 3);
        assert_eq!(config.highlight_below, 0.9);
        assert_eq!(config.output_path, PathBuf::from("out/july.xlsx"));
    }

    #[test]
    fn top_n_parser_rejects_zero() {
        assert_eq!(parse_top_n("5"), Ok(5));
        assert!(parse_top_n("0").is_err());
        assert!(parse_top_n("-2").is_err());
    }

    #[test]
    fn fraction_parser_bounds() {
        assert_eq!(parse_fraction("0.75"), Ok(0.75));
        assert_eq!(parse_fraction("1"), Ok(1.0));
        assert!(parse_fraction("1.2").is_err());
        assert!(parse_fraction("-0.1").is_err());
        assert!(parse_fraction("high").is_err());
    }
}

use thiserror::Error;

/// Failures surfaced by a report run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("record source unavailable: {context}")]
    SourceUnavailable {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("malformed record at row {row} (employee {}): {reason}", .employee_id.as_deref().unwrap_or("<missing>"))]
    MalformedRecord {
        row: usize,
        employee_id: Option<String>,
        reason: String,
    },

    #[error("employee {employee_id} appears as both {first_name:?} and {conflicting_name:?}")]
    IdentityConflict {
        employee_id: String,
        first_name: String,
        conflicting_name: String,
    },

    #[error("invalid month {0:?}, expected YYYY-MM")]
    InvalidMonth(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn source_unavailable<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ReportError::SourceUnavailable {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ReportError::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_record_names_row_and_employee() {
        let err = ReportError::MalformedRecord {
            row: 4,
            employee_id: Some("E7".to_string()),
            reason: "unparseable date \"2025-07-32\"".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("row 4"));
        assert!(message.contains("E7"));

        let missing = ReportError::MalformedRecord {
            row: 1,
            employee_id: None,
            reason: "missing employee_id".to_string(),
        };
        assert!(missing.to_string().contains("<missing>"));
    }

    #[test]
    fn identity_conflict_names_both_spellings() {
        let err = ReportError::IdentityConflict {
            employee_id: "E9".to_string(),
            first_name: "Bob".to_string(),
            conflicting_name: "Robert".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("E9"));
        assert!(message.contains("Bob"));
        assert!(message.contains("Robert"));
    }
}

//! Domain error types.
//!
//! Overlap conflicts are findings, not errors, and never appear here; see
//! [`crate::domain::overlap`].

/// Top-level error type for the methodology tools.
#[derive(Debug, thiserror::Error)]
pub enum MethodologyError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no donor cohort configured for segment {segment}")]
    UnmappedSegment { segment: String },

    #[error("table not found: {table}")]
    TableNotFound { table: String },

    #[error("no rows found: {what}")]
    EmptyResult { what: String },

    #[error("malformed {field} in {table} line {line}: {reason}")]
    MalformedField {
        table: String,
        line: usize,
        field: String,
        reason: String,
    },

    #[error("missing {metric} observation for {segment} {cohort} in {month}")]
    MissingObservation {
        segment: String,
        cohort: String,
        metric: String,
        month: String,
    },

    #[error("zero {metric} forecast for {segment} {cohort} in {month}")]
    ZeroDenominator {
        segment: String,
        cohort: String,
        metric: String,
        month: String,
    },

    #[error("invalid cohort code {cohort:?} (expected YYYYMM)")]
    InvalidCohort { cohort: String },

    #[error("cohort {cohort} has no months on book in {month}")]
    CohortAgeOutOfRange { cohort: String, month: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MethodologyError {
    /// Process exit status for this error's category.
    pub fn exit_status(&self) -> u8 {
        match self {
            MethodologyError::Io(_) => 1,
            MethodologyError::ConfigParse { .. }
            | MethodologyError::ConfigInvalid { .. }
            | MethodologyError::UnmappedSegment { .. }
            | MethodologyError::TableNotFound { .. }
            | MethodologyError::EmptyResult { .. } => 2,
            MethodologyError::MalformedField { .. } | MethodologyError::Csv(_) => 3,
            MethodologyError::MissingObservation { .. }
            | MethodologyError::ZeroDenominator { .. }
            | MethodologyError::InvalidCohort { .. }
            | MethodologyError::CohortAgeOutOfRange { .. } => 5,
        }
    }
}

impl From<&MethodologyError> for std::process::ExitCode {
    fn from(err: &MethodologyError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_offending_key() {
        let err = MethodologyError::MissingObservation {
            segment: "PRIME".into(),
            cohort: "202507".into(),
            metric: "OpeningGBV".into(),
            month: "2025-10".into(),
        };
        assert_eq!(
            err.to_string(),
            "missing OpeningGBV observation for PRIME 202507 in 2025-10"
        );
    }

    #[test]
    fn exit_codes_by_category() {
        let config = MethodologyError::UnmappedSegment {
            segment: "NRP-X".into(),
        };
        assert_eq!(config.exit_status(), 2);

        let data = MethodologyError::ZeroDenominator {
            segment: "PRIME".into(),
            cohort: "202507".into(),
            metric: "OpeningGBV".into(),
            month: "2025-10".into(),
        };
        assert_eq!(data.exit_status(), 5);

        let io = MethodologyError::Io(std::io::Error::other("disk"));
        assert_eq!(io.exit_status(), 1);
    }
}

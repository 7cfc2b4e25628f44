//! Reporting-month and cohort-age arithmetic.
//!
//! All months are represented as the first day of the calendar month.
//! Cohorts are 6-digit `YYYYMM` origination codes.

use crate::domain::error::MethodologyError;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashSet;

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Parse a `YYYY-MM` month label.
pub fn parse_month(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", input.trim()), "%Y-%m-%d").ok()
}

pub fn format_month(month: NaiveDate) -> String {
    month.format("%Y-%m").to_string()
}

/// Convert a spreadsheet day serial (epoch 1899-12-30) to its reporting month.
pub fn month_from_serial(days: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .checked_add_signed(Duration::try_days(days)?)
        .map(first_of_month)
}

/// Parse a `YYYYMM` cohort code into its origination month.
pub fn parse_cohort(code: &str) -> Result<NaiveDate, MethodologyError> {
    let invalid = || MethodologyError::InvalidCohort {
        cohort: code.to_string(),
    };
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let year: i32 = code[..4].parse().map_err(|_| invalid())?;
    let month: u32 = code[4..].parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)
}

/// Numeric value of a cohort code, used for recency comparisons.
pub fn cohort_value(code: &str) -> Result<u32, MethodologyError> {
    let date = parse_cohort(code)?;
    Ok(date.year() as u32 * 100 + date.month())
}

/// 1-indexed age of `cohort` at reporting `month`.
pub fn months_on_book(cohort: &str, month: NaiveDate) -> Result<u32, MethodologyError> {
    let origin = parse_cohort(cohort)?;
    let mob = (month.year() - origin.year()) * 12 + (month.month() as i32 - origin.month() as i32)
        + 1;
    if mob < 1 {
        return Err(MethodologyError::CohortAgeOutOfRange {
            cohort: cohort.to_string(),
            month: format_month(month),
        });
    }
    Ok(mob as u32)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MonthListError {
    #[error("empty token in month list")]
    EmptyToken,

    #[error("invalid month {0:?} (expected YYYY-MM)")]
    InvalidMonth(String),

    #[error("duplicate month: {0}")]
    DuplicateMonth(String),
}

/// Parse a comma-separated list of `YYYY-MM` months, preserving order.
pub fn parse_months(input: &str) -> Result<Vec<NaiveDate>, MonthListError> {
    let mut months = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(MonthListError::EmptyToken);
        }
        let month =
            parse_month(trimmed).ok_or_else(|| MonthListError::InvalidMonth(trimmed.to_string()))?;
        if !seen.insert(month) {
            return Err(MonthListError::DuplicateMonth(trimmed.to_string()));
        }
        months.push(month);
    }

    Ok(months)
}

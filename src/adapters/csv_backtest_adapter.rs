//! CSV backtest source adapter.
//!
//! Reads a directory of exported workbook sheets, one `<table>.csv` per
//! logical table, with header-addressed columns
//! `Segment, Cohort, Metric, Month, Forecast, Actual, Variance`.

use crate::domain::calendar::{first_of_month, month_from_serial};
use crate::domain::error::MethodologyError;
use crate::domain::record::BacktestRecord;
use crate::ports::backtest_port::BacktestSource;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;

pub struct CsvBacktestAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    #[serde(rename = "Segment", default)]
    segment: String,
    #[serde(rename = "Cohort", default)]
    cohort: String,
    #[serde(rename = "Metric", default)]
    metric: String,
    #[serde(rename = "Month", default)]
    month: String,
    #[serde(rename = "Forecast", default)]
    forecast: String,
    #[serde(rename = "Actual", default)]
    actual: String,
    #[serde(rename = "Variance", default)]
    variance: String,
}

impl CsvBacktestAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", table))
    }
}

impl BacktestSource for CsvBacktestAdapter {
    fn read_table(
        &self,
        table: &str,
        month: Option<NaiveDate>,
    ) -> Result<Vec<BacktestRecord>, MethodologyError> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(MethodologyError::TableNotFound {
                table: format!("{} ({})", table, path.display()),
            });
        }

        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(&path)?;
        let headers = rdr.headers()?.clone();
        let mut row = csv::StringRecord::new();
        let mut records = Vec::new();

        while rdr.read_record(&mut row)? {
            let line = record_line(&row);
            let raw: RawObservation = row.deserialize(Some(&headers))?;
            if raw.segment.trim().is_empty() {
                continue;
            }

            let field = |name: &str, reason: String| MethodologyError::MalformedField {
                table: table.to_string(),
                line,
                field: name.to_string(),
                reason,
            };

            let record_month = parse_month_cell(&raw.month)
                .ok_or_else(|| field("Month", format!("invalid month {:?}", raw.month)))?;
            if month.is_some_and(|m| m != record_month) {
                continue;
            }

            let number = |name: &str, text: &str| -> Result<f64, MethodologyError> {
                text.trim()
                    .parse::<f64>()
                    .map_err(|e| field(name, format!("{:?}: {}", text, e)))
            };

            records.push(BacktestRecord {
                segment: raw.segment.trim().to_string(),
                cohort: normalize_code(&raw.cohort),
                metric: raw.metric.trim().to_string(),
                month: record_month,
                forecast: number("Forecast", &raw.forecast)?,
                actual: number("Actual", &raw.actual)?,
                variance: number("Variance", &raw.variance)?,
            });
        }

        Ok(records)
    }
}

/// Physical line the record starts on; quoted newlines and blank lines count.
pub(crate) fn record_line(row: &csv::StringRecord) -> usize {
    row.position().map_or(0, |p| p.line() as usize)
}

/// A day serial (fraction truncated) or an ISO date, as a reporting month.
fn parse_month_cell(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(serial) if serial.is_finite() => month_from_serial(serial.trunc() as i64),
        Ok(_) => None,
        Err(_) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(first_of_month),
    }
}

/// Numeric cells come back from spreadsheets as `202507.0`.
fn normalize_code(text: &str) -> String {
    let text = text.trim();
    text.strip_suffix(".0").unwrap_or(text).to_string()
}

//! CSV rule and overlay table adapter.
//!
//! Output is rendered fully in memory before the file is created, so a
//! failure never leaves a partial table behind.

use crate::adapters::csv_backtest_adapter::record_line;
use crate::domain::error::MethodologyError;
use crate::domain::overlay::OverlayRecord;
use crate::domain::rule::{MethodologyRule, RuleRow};
use crate::ports::table_port::TablePort;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const RULE_COLUMNS: [&str; 9] = [
    "Segment",
    "Cohort",
    "Metric",
    "MOB_Start",
    "MOB_End",
    "Approach",
    "Param1",
    "Param2",
    "Explanation",
];

pub const OVERLAY_COLUMNS: [&str; 7] = [
    "Segment",
    "ForecastMonth_Start",
    "ForecastMonth_End",
    "Metric",
    "Type",
    "Value",
    "Explanation",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(rename = "Segment", default)]
    segment: String,
    #[serde(rename = "Cohort", default)]
    cohort: String,
    #[serde(rename = "Metric", default)]
    metric: String,
    #[serde(rename = "MOB_Start", default)]
    mob_start: String,
    #[serde(rename = "MOB_End", default)]
    mob_end: String,
    #[serde(rename = "Approach", default)]
    approach: String,
    #[serde(rename = "Param1", default)]
    param1: String,
    #[serde(rename = "Param2", default)]
    param2: String,
    #[serde(rename = "Explanation", default)]
    explanation: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvTableAdapter;

impl CsvTableAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Render a rule table, header included.
    pub fn render_rules(&self, rules: &[MethodologyRule]) -> Result<Vec<u8>, MethodologyError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(RULE_COLUMNS)?;
        for rule in rules {
            wtr.write_record([
                rule.segment.clone(),
                rule.cohort.clone(),
                rule.metric.clone(),
                rule.mob_start.to_string(),
                rule.mob_end.to_string(),
                rule.approach.name().to_string(),
                rule.approach.param1(),
                rule.param2.clone(),
                rule.explanation.clone(),
            ])?;
        }
        wtr.into_inner().map_err(|e| MethodologyError::Io(e.into_error()))
    }

    /// Render an overlay table, header included.
    pub fn render_overlays(
        &self,
        overlays: &[OverlayRecord],
    ) -> Result<Vec<u8>, MethodologyError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(OVERLAY_COLUMNS)?;
        for overlay in overlays {
            wtr.write_record([
                overlay.segment.clone(),
                overlay.forecast_month_start.format(DATE_FORMAT).to_string(),
                overlay
                    .forecast_month_end
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default(),
                overlay.metric.clone(),
                overlay.overlay_type.name().to_string(),
                format!("{:.6}", overlay.value),
                overlay.explanation.clone(),
            ])?;
        }
        wtr.into_inner().map_err(|e| MethodologyError::Io(e.into_error()))
    }

    /// Parse rule rows from CSV text; `source` labels the rows and errors.
    pub fn parse_rules(&self, content: &[u8], source: &str) -> Result<Vec<RuleRow>, MethodologyError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(content);
        let headers = rdr.headers()?.clone();
        let mut record = csv::StringRecord::new();
        let mut rows = Vec::new();

        while rdr.read_record(&mut record)? {
            let line = record_line(&record);
            let raw: RawRule = record.deserialize(Some(&headers))?;
            rows.push(RuleRow {
                mob_start: parse_mob(&raw.mob_start, "MOB_Start", source, line)?,
                mob_end: parse_mob(&raw.mob_end, "MOB_End", source, line)?,
                segment: raw.segment,
                cohort: raw.cohort,
                metric: raw.metric,
                approach: raw.approach,
                param1: raw.param1,
                param2: raw.param2,
                explanation: raw.explanation,
                source: source.to_string(),
                line,
            });
        }

        Ok(rows)
    }
}

/// Integer MOB bound; decimal text is truncated toward zero.
fn parse_mob(text: &str, field: &str, source: &str, line: usize) -> Result<i64, MethodologyError> {
    let malformed = |reason: String| MethodologyError::MalformedField {
        table: source.to_string(),
        line,
        field: field.to_string(),
        reason,
    };
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| malformed(format!("{:?} is not a number", text)))?;
    if !value.is_finite() {
        return Err(malformed(format!("{:?} is not finite", text)));
    }
    Ok(value.trunc() as i64)
}

impl TablePort for CsvTableAdapter {
    fn write_rules(&self, rules: &[MethodologyRule], path: &Path) -> Result<(), MethodologyError> {
        let bytes = self.render_rules(rules)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn write_overlays(
        &self,
        overlays: &[OverlayRecord],
        path: &Path,
    ) -> Result<(), MethodologyError> {
        let bytes = self.render_overlays(overlays)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn read_rules(&self, path: &Path) -> Result<Vec<RuleRow>, MethodologyError> {
        let content = fs::read(path)?;
        self.parse_rules(&content, &path.display().to_string())
    }
}

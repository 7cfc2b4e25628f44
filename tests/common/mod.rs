#![allow(dead_code)]

use chrono::NaiveDate;
use methodology::domain::error::MethodologyError;
use methodology::domain::record::BacktestRecord;
pub use methodology::domain::record::{COLL_PRINCIPAL, OPENING_GBV};
use methodology::domain::rule::{Approach, MethodologyRule};
use methodology::ports::backtest_port::BacktestSource;
use std::collections::HashMap;
use std::path::Path;

pub const TABLE: &str = "14_Backtest_Comparison";

pub struct MockBacktestSource {
    pub tables: HashMap<String, Vec<BacktestRecord>>,
}

impl MockBacktestSource {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn with_table(mut self, table: &str, records: Vec<BacktestRecord>) -> Self {
        self.tables.insert(table.to_string(), records);
        self
    }
}

impl BacktestSource for MockBacktestSource {
    fn read_table(
        &self,
        table: &str,
        month: Option<NaiveDate>,
    ) -> Result<Vec<BacktestRecord>, MethodologyError> {
        let records = self
            .tables
            .get(table)
            .ok_or_else(|| MethodologyError::TableNotFound {
                table: table.to_string(),
            })?;
        Ok(records
            .iter()
            .filter(|r| month.is_none_or(|m| r.month == m))
            .cloned()
            .collect())
    }
}

pub fn month(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

pub fn obs(
    segment: &str,
    cohort: &str,
    metric: &str,
    month: NaiveDate,
    forecast: f64,
    actual: f64,
) -> BacktestRecord {
    BacktestRecord {
        segment: segment.to_string(),
        cohort: cohort.to_string(),
        metric: metric.to_string(),
        month,
        forecast,
        actual,
        variance: actual - forecast,
    }
}

pub fn ranged_rule(segment: &str, cohort: &str, metric: &str, start: u32, end: u32) -> MethodologyRule {
    MethodologyRule {
        segment: segment.to_string(),
        cohort: cohort.to_string(),
        metric: metric.to_string(),
        mob_start: start,
        mob_end: end,
        approach: Approach::StaticCohortAvg { window: 3 },
        param2: String::new(),
        explanation: String::new(),
    }
}

/// A small portfolio observed in Oct and Nov 2025.
///
/// PRIME 202507 under-collects by 900 over both months, NRP-S 202501 by 500,
/// NON PRIME 202508 over-collects by 300.
pub fn sample_backtest() -> Vec<BacktestRecord> {
    let oct = month(2025, 10);
    let nov = month(2025, 11);
    vec![
        obs("PRIME", "202507", OPENING_GBV, oct, 100_000.0, 99_000.0),
        obs("PRIME", "202507", COLL_PRINCIPAL, oct, 5_000.0, 4_500.0),
        obs("PRIME", "202507", OPENING_GBV, nov, 95_000.0, 94_000.0),
        obs("PRIME", "202507", COLL_PRINCIPAL, nov, 4_800.0, 4_400.0),
        obs("NRP-S", "202501", OPENING_GBV, oct, 50_000.0, 50_500.0),
        obs("NRP-S", "202501", COLL_PRINCIPAL, oct, 2_500.0, 2_200.0),
        obs("NRP-S", "202501", OPENING_GBV, nov, 48_000.0, 48_100.0),
        obs("NRP-S", "202501", COLL_PRINCIPAL, nov, 2_400.0, 2_200.0),
        obs("NON PRIME", "202508", OPENING_GBV, oct, 20_000.0, 20_000.0),
        obs("NON PRIME", "202508", COLL_PRINCIPAL, oct, 1_000.0, 1_200.0),
        obs("NON PRIME", "202508", OPENING_GBV, nov, 19_000.0, 19_100.0),
        obs("NON PRIME", "202508", COLL_PRINCIPAL, nov, 900.0, 1_000.0),
    ]
}

/// Write records as a `<TABLE>.csv` export with day-serial months.
pub fn write_backtest_csv(dir: &Path, records: &[BacktestRecord]) {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    let mut content = String::from("Segment,Cohort,Metric,Month,Forecast,Actual,Variance\n");
    for r in records {
        let serial = (r.month - epoch).num_days();
        content.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            r.segment, r.cohort, r.metric, serial, r.forecast, r.actual, r.variance
        ));
    }
    std::fs::write(dir.join(format!("{TABLE}.csv")), content).unwrap();
}

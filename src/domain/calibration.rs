//! Segment-level overlay calibration.
//!
//! Aggregates forecast and actual per segment over an inclusive month window
//! and emits one Multiply overlay per segment. A zero forecast sum yields a
//! neutral 1.0 multiplier rather than an error.

use crate::domain::calendar::format_month;
use crate::domain::overlay::{OverlayRecord, OverlayType};
use crate::domain::record::BacktestRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// How far forward the emitted overlays apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayScope {
    /// `[month_start, month_end]`.
    Window,
    /// From `month_start` with no end.
    OpenEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentTotals {
    pub forecast: f64,
    pub actual: f64,
}

impl SegmentTotals {
    pub fn ratio(&self) -> f64 {
        if self.forecast != 0.0 {
            self.actual / self.forecast
        } else {
            1.0
        }
    }
}

/// Per-segment sums for `metric` within `[month_start, month_end]`, by segment.
pub fn segment_totals(
    records: &[BacktestRecord],
    metric: &str,
    month_start: NaiveDate,
    month_end: NaiveDate,
) -> BTreeMap<String, SegmentTotals> {
    let mut totals: BTreeMap<String, SegmentTotals> = BTreeMap::new();
    for r in records
        .iter()
        .filter(|r| r.metric == metric && r.month >= month_start && r.month <= month_end)
    {
        let entry = totals.entry(r.segment.clone()).or_default();
        entry.forecast += r.forecast;
        entry.actual += r.actual;
    }
    totals
}

/// One overlay per segment observed in the window, in segment order.
pub fn generate_overlays(
    records: &[BacktestRecord],
    metric: &str,
    month_start: NaiveDate,
    month_end: NaiveDate,
    scope: OverlayScope,
) -> Vec<OverlayRecord> {
    let totals = segment_totals(records, metric, month_start, month_end);
    overlays_from_totals(&totals, metric, month_start, month_end, scope)
}

/// Overlays for already aggregated window totals.
pub fn overlays_from_totals(
    totals: &BTreeMap<String, SegmentTotals>,
    metric: &str,
    month_start: NaiveDate,
    month_end: NaiveDate,
    scope: OverlayScope,
) -> Vec<OverlayRecord> {
    let explanation = format!(
        "Calibrated from {}..{} backtest Actual/Forecast ratio",
        format_month(month_start),
        format_month(month_end)
    );
    let forecast_month_end = match scope {
        OverlayScope::Window => Some(month_end),
        OverlayScope::OpenEnded => None,
    };

    totals
        .iter()
        .map(|(segment, totals)| OverlayRecord {
            segment: segment.clone(),
            metric: metric.to_string(),
            forecast_month_start: month_start,
            forecast_month_end,
            overlay_type: OverlayType::Multiply,
            value: totals.ratio(),
            explanation: explanation.clone(),
        })
        .collect()
}

//! Segment-level calibration overlays.
//!
//! Overlays are MOB-independent and carry no overlap invariant; the
//! forecasting model applies them on top of rule-driven projections.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayType {
    Multiply,
}

impl OverlayType {
    pub fn name(&self) -> &'static str {
        match self {
            OverlayType::Multiply => "Multiply",
        }
    }
}

impl fmt::Display for OverlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRecord {
    pub segment: String,
    pub metric: String,
    pub forecast_month_start: NaiveDate,
    /// `None` means open-ended.
    pub forecast_month_end: Option<NaiveDate>,
    pub overlay_type: OverlayType,
    pub value: f64,
    pub explanation: String,
}

impl OverlayRecord {
    /// Whether the overlay applies to forecasts made for `month`.
    pub fn applies_to(&self, month: NaiveDate) -> bool {
        month >= self.forecast_month_start && self.forecast_month_end.is_none_or(|end| month <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn overlay(end: Option<NaiveDate>) -> OverlayRecord {
        OverlayRecord {
            segment: "PRIME".into(),
            metric: "Coll_Principal".into(),
            forecast_month_start: month(2025, 10),
            forecast_month_end: end,
            overlay_type: OverlayType::Multiply,
            value: 0.95,
            explanation: String::new(),
        }
    }

    #[test]
    fn bounded_overlay_window() {
        let o = overlay(Some(month(2026, 1)));
        assert!(!o.applies_to(month(2025, 9)));
        assert!(o.applies_to(month(2025, 10)));
        assert!(o.applies_to(month(2026, 1)));
        assert!(!o.applies_to(month(2026, 2)));
    }

    #[test]
    fn open_ended_overlay() {
        let o = overlay(None);
        assert!(o.applies_to(month(2030, 1)));
        assert!(!o.applies_to(month(2025, 9)));
    }

    #[test]
    fn type_name() {
        assert_eq!(OverlayType::Multiply.to_string(), "Multiply");
    }
}

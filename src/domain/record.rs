//! Backtest observation record.

use chrono::NaiveDate;

/// Metric whose presence marks a live segment/cohort and whose forecast is
/// the denominator for target rates.
pub const OPENING_GBV: &str = "OpeningGBV";
pub const COLL_PRINCIPAL: &str = "Coll_Principal";
pub const COLL_INTEREST: &str = "Coll_Interest";
pub const INTEREST_REVENUE: &str = "InterestRevenue";

/// One forecast-vs-actual observation for a segment/cohort/metric/month.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRecord {
    pub segment: String,
    pub cohort: String,
    pub metric: String,
    /// Reporting month, first of month.
    pub month: NaiveDate,
    pub forecast: f64,
    pub actual: f64,
    pub variance: f64,
}

impl BacktestRecord {
    pub fn is_for(&self, segment: &str, cohort: &str, metric: &str, month: NaiveDate) -> bool {
        self.month == month && self.metric == metric && self.segment == segment && self.cohort == cohort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_for_matches_all_four_fields() {
        let month = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let rec = BacktestRecord {
            segment: "PRIME".into(),
            cohort: "202507".into(),
            metric: OPENING_GBV.into(),
            month,
            forecast: 1000.0,
            actual: 990.0,
            variance: -10.0,
        };
        assert!(rec.is_for("PRIME", "202507", OPENING_GBV, month));
        assert!(!rec.is_for("PRIME", "202508", OPENING_GBV, month));
        assert!(!rec.is_for("PRIME", "202507", COLL_PRINCIPAL, month));
        assert!(!rec.is_for(
            "PRIME",
            "202507",
            OPENING_GBV,
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
        ));
    }
}

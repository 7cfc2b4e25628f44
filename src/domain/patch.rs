//! Backtest patch generation.
//!
//! Ranks (segment, cohort) pairs by net forecast variance over the selected
//! months and pins an exact single-month Manual rate for the worst
//! under-performers, so the next run reproduces their actuals.
//!
//! Pins never overlap each other (distinct months give distinct MOBs per
//! cohort) but may overlap ranged rules from another table; reconcile with
//! [`crate::domain::overlap::validate`] before accepting them.

use crate::domain::calendar::{format_month, months_on_book};
use crate::domain::config::PatchConfig;
use crate::domain::error::MethodologyError;
use crate::domain::record::BacktestRecord;
use crate::domain::rule::{Approach, MethodologyRule, RuleSet};
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct VarianceDriver {
    pub segment: String,
    pub cohort: String,
    /// Signed sum of variance across the selected months.
    pub total_variance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub drivers: Vec<VarianceDriver>,
    pub rules: RuleSet,
}

/// Net-negative drivers ranked by absolute accumulated variance, top `top_n`.
///
/// Equal magnitudes keep first-seen order.
pub fn rank_variance_drivers(
    records: &[BacktestRecord],
    months: &[NaiveDate],
    metric: &str,
    top_n: usize,
) -> Vec<VarianceDriver> {
    let mut drivers: Vec<VarianceDriver> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for r in records
        .iter()
        .filter(|r| r.metric == metric && months.contains(&r.month))
    {
        let key = (r.segment.as_str(), r.cohort.as_str());
        match index.get(&key) {
            Some(&i) => drivers[i].total_variance += r.variance,
            None => {
                index.insert(key, drivers.len());
                drivers.push(VarianceDriver {
                    segment: r.segment.clone(),
                    cohort: r.cohort.clone(),
                    total_variance: r.variance,
                });
            }
        }
    }

    drivers.sort_by(|a, b| b.total_variance.abs().total_cmp(&a.total_variance.abs()));
    drivers
        .into_iter()
        .filter(|d| d.total_variance < 0.0)
        .take(top_n)
        .collect()
}

/// Rank drivers, then emit one Manual pin per (driver, month).
///
/// A selected pair missing either observation, or with a zero denominator
/// forecast, is fatal: a pin without a denominator is meaningless.
pub fn generate_patch(
    records: &[BacktestRecord],
    months: &[NaiveDate],
    config: &PatchConfig,
) -> Result<Patch, MethodologyError> {
    let drivers = rank_variance_drivers(records, months, &config.metric, config.top_n);
    let mut rules = Vec::with_capacity(drivers.len() * months.len());

    for driver in &drivers {
        for &month in months {
            let denominator = find_observation(records, driver, &config.denominator_metric, month)?;
            let target = find_observation(records, driver, &config.metric, month)?;

            if denominator.forecast == 0.0 {
                return Err(MethodologyError::ZeroDenominator {
                    segment: driver.segment.clone(),
                    cohort: driver.cohort.clone(),
                    metric: config.denominator_metric.clone(),
                    month: format_month(month),
                });
            }
            let rate = target.actual / denominator.forecast;
            let mob = months_on_book(&driver.cohort, month)?;

            rules.push(MethodologyRule {
                segment: driver.segment.clone(),
                cohort: driver.cohort.clone(),
                metric: config.metric.clone(),
                mob_start: mob,
                mob_end: mob,
                approach: Approach::Manual { rate },
                param2: String::new(),
                explanation: format!(
                    "Backtest lock for {}: target rate from Actual {} / Forecast {}",
                    format_month(month),
                    config.metric,
                    config.denominator_metric
                ),
            });
        }
    }

    Ok(Patch { drivers, rules })
}

fn find_observation<'a>(
    records: &'a [BacktestRecord],
    driver: &VarianceDriver,
    metric: &str,
    month: NaiveDate,
) -> Result<&'a BacktestRecord, MethodologyError> {
    records
        .iter()
        .find(|r| r.is_for(&driver.segment, &driver.cohort, metric, month))
        .ok_or_else(|| MethodologyError::MissingObservation {
            segment: driver.segment.clone(),
            cohort: driver.cohort.clone(),
            metric: metric.to_string(),
            month: format_month(month),
        })
}

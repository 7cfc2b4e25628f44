//! From-scratch regime-based rule generation.
//!
//! Every (segment, cohort, metric) combination receives three abutting MOB
//! tiers ending at the configured open end, so each key satisfies the
//! non-overlap invariant and covers every age from MOB 1 by construction.
//!
//! Recent cohorts bridge their first months through a same-segment donor
//! cohort; mature cohorts use static cohort averages throughout.

use crate::domain::calendar::format_month;
use crate::domain::config::GeneratorConfig;
use crate::domain::error::MethodologyError;
use crate::domain::record::BacktestRecord;
use crate::domain::rule::{Approach, MethodologyRule, RuleSet};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Segment/cohort combinations, iterated by segment then cohort.
pub type Universe = BTreeSet<(String, String)>;

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeTier {
    pub mob_start: u32,
    pub mob_end: u32,
    pub approach: Approach,
    pub explanation: String,
}

/// Combinations with a presence-metric observation in the reference month.
pub fn discover_universe(
    records: &[BacktestRecord],
    month: NaiveDate,
    presence_metric: &str,
) -> Result<Universe, MethodologyError> {
    let universe: Universe = records
        .iter()
        .filter(|r| r.month == month && r.metric == presence_metric)
        .map(|r| (r.segment.clone(), r.cohort.clone()))
        .collect();

    if universe.is_empty() {
        return Err(MethodologyError::EmptyResult {
            what: format!(
                "no {} observations in {} to derive segment/cohort universe",
                presence_metric,
                format_month(month)
            ),
        });
    }
    Ok(universe)
}

/// The tier schedule for one segment/cohort.
pub fn regime_schedule(
    segment: &str,
    cohort: &str,
    config: &GeneratorConfig,
) -> Result<Vec<RegimeTier>, MethodologyError> {
    let open_end = config.open_end_mob;
    let static_avg = |window| Approach::StaticCohortAvg { window };

    if config.is_recent(cohort)? {
        let donor = config.donor_for(segment)?;
        return Ok(vec![
            RegimeTier {
                mob_start: 1,
                mob_end: 6,
                approach: Approach::DonorCohort {
                    donor: donor.to_string(),
                },
                explanation: format!("Recent cohort bridge via same-segment donor {}", donor),
            },
            RegimeTier {
                mob_start: 7,
                mob_end: 24,
                approach: static_avg(3),
                explanation: "Post-bridge stabilisation using actual-only history".to_string(),
            },
            RegimeTier {
                mob_start: 25,
                mob_end: open_end,
                approach: static_avg(6),
                explanation: "Mature stabilisation using actual-only history".to_string(),
            },
        ]);
    }

    Ok(vec![
        RegimeTier {
            mob_start: 1,
            mob_end: 12,
            approach: static_avg(3),
            explanation: "Early regime using recent actual-only cohort points".to_string(),
        },
        RegimeTier {
            mob_start: 13,
            mob_end: 36,
            approach: static_avg(6),
            explanation: "Mid regime using actual-only cohort points".to_string(),
        },
        RegimeTier {
            mob_start: 37,
            mob_end: open_end,
            approach: static_avg(12),
            explanation: "Late regime tail cap using actual-only cohort points".to_string(),
        },
    ])
}

/// Build the full rule set: universe order (segment, cohort), then metric order.
pub fn generate(universe: &Universe, config: &GeneratorConfig) -> Result<RuleSet, MethodologyError> {
    let mut rules = Vec::with_capacity(universe.len() * config.flow_metrics.len() * 3);

    for (segment, cohort) in universe {
        let schedule = regime_schedule(segment, cohort, config)?;
        for metric in &config.flow_metrics {
            for tier in &schedule {
                rules.push(MethodologyRule {
                    segment: segment.clone(),
                    cohort: cohort.clone(),
                    metric: metric.clone(),
                    mob_start: tier.mob_start,
                    mob_end: tier.mob_end,
                    approach: tier.approach.clone(),
                    param2: String::new(),
                    explanation: tier.explanation.clone(),
                });
            }
        }
    }
    Ok(rules)
}

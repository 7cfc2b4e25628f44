//! Generator configuration.
//!
//! Every generator takes its configuration explicitly; nothing here is
//! process-global.

use crate::domain::calendar::cohort_value;
use crate::domain::error::MethodologyError;
use crate::domain::record::{COLL_INTEREST, COLL_PRINCIPAL, INTEREST_REVENUE, OPENING_GBV};
use crate::domain::rule::OPEN_END_MOB;
use std::collections::BTreeMap;

pub const DEFAULT_RECENT_THRESHOLD: u32 = 202508;
pub const DEFAULT_DONOR_COHORT: &str = "202507";
pub const DEFAULT_SEGMENTS: [&str; 5] = ["NON PRIME", "NRP-S", "NRP-M", "NRP-L", "PRIME"];
pub const DEFAULT_SOURCE_TABLE: &str = "14_Backtest_Comparison";
pub const DEFAULT_TOP_N: usize = 5;

/// Start of the last default tier; the open end must lie beyond it.
pub const MIN_OPEN_END_MOB: u32 = 37;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Cohorts with a code at or above this value are "recent".
    pub recent_threshold: u32,
    /// Segment to donor cohort, consulted for recent cohorts only.
    pub donor_map: BTreeMap<String, String>,
    pub flow_metrics: Vec<String>,
    /// Metric whose observation in the reference month marks a live combination.
    pub presence_metric: String,
    pub open_end_mob: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            recent_threshold: DEFAULT_RECENT_THRESHOLD,
            donor_map: DEFAULT_SEGMENTS
                .iter()
                .map(|s| (s.to_string(), DEFAULT_DONOR_COHORT.to_string()))
                .collect(),
            flow_metrics: default_flow_metrics(),
            presence_metric: OPENING_GBV.to_string(),
            open_end_mob: OPEN_END_MOB,
        }
    }
}

impl GeneratorConfig {
    pub fn donor_for(&self, segment: &str) -> Result<&str, MethodologyError> {
        self.donor_map
            .get(segment)
            .map(String::as_str)
            .ok_or_else(|| MethodologyError::UnmappedSegment {
                segment: segment.to_string(),
            })
    }

    pub fn is_recent(&self, cohort: &str) -> Result<bool, MethodologyError> {
        Ok(cohort_value(cohort)? >= self.recent_threshold)
    }
}

pub fn default_flow_metrics() -> Vec<String> {
    [COLL_PRINCIPAL, COLL_INTEREST, INTEREST_REVENUE]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchConfig {
    pub metric: String,
    /// Its forecast is the target-rate denominator.
    pub denominator_metric: String,
    pub top_n: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            metric: COLL_PRINCIPAL.to_string(),
            denominator_metric: OPENING_GBV.to_string(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

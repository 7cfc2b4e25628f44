//! Methodology rule data structures.
//!
//! - `Approach`: how a metric is projected over a MOB interval, with its
//!   approach-specific parameter
//! - `MethodologyRule`: a typed rule produced by the generators
//! - `RuleRow`: a rule as read back from a persisted table, keeping its raw
//!   text fields and file position
//! - `MobInterval`: the keyed closed interval view the overlap validator needs

use std::fmt;

/// Sentinel end bound meaning "open-ended".
pub const OPEN_END_MOB: u32 = 999;

#[derive(Debug, Clone, PartialEq)]
pub enum Approach {
    /// Average of the cohort's own last `window` actual points.
    StaticCohortAvg { window: u32 },
    /// Borrow the curve of an already-mature cohort.
    DonorCohort { donor: String },
    /// A literal rate pinned by hand or by backtest.
    Manual { rate: f64 },
}

impl Approach {
    pub fn name(&self) -> &'static str {
        match self {
            Approach::StaticCohortAvg { .. } => "StaticCohortAvg",
            Approach::DonorCohort { .. } => "DonorCohort",
            Approach::Manual { .. } => "Manual",
        }
    }

    /// The persisted `Param1` text.
    pub fn param1(&self) -> String {
        match self {
            Approach::StaticCohortAvg { window } => window.to_string(),
            Approach::DonorCohort { donor } => donor.clone(),
            Approach::Manual { rate } => format!("{rate:.6}"),
        }
    }
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.param1())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodologyRule {
    pub segment: String,
    pub cohort: String,
    pub metric: String,
    pub mob_start: u32,
    pub mob_end: u32,
    pub approach: Approach,
    pub param2: String,
    pub explanation: String,
}

/// Ordered rule collection; order only matters for deterministic reporting.
pub type RuleSet = Vec<MethodologyRule>;

/// The (segment, cohort, metric) partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub segment: String,
    pub cohort: String,
    pub metric: String,
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.segment, self.cohort, self.metric)
    }
}

/// A keyed, closed integer MOB interval.
pub trait MobInterval {
    fn key(&self) -> (&str, &str, &str);
    fn mob_start(&self) -> i64;
    fn mob_end(&self) -> i64;
}

impl MobInterval for MethodologyRule {
    fn key(&self) -> (&str, &str, &str) {
        (&self.segment, &self.cohort, &self.metric)
    }

    fn mob_start(&self) -> i64 {
        i64::from(self.mob_start)
    }

    fn mob_end(&self) -> i64 {
        i64::from(self.mob_end)
    }
}

/// A rule-table row as persisted. Only the MOB bounds are parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    pub segment: String,
    pub cohort: String,
    pub metric: String,
    pub mob_start: i64,
    pub mob_end: i64,
    pub approach: String,
    pub param1: String,
    pub param2: String,
    pub explanation: String,
    /// Label of the table the row came from (usually its path).
    pub source: String,
    /// 1-based file line; the header is line 1.
    pub line: usize,
}

impl MobInterval for RuleRow {
    fn key(&self) -> (&str, &str, &str) {
        (&self.segment, &self.cohort, &self.metric)
    }

    fn mob_start(&self) -> i64 {
        self.mob_start
    }

    fn mob_end(&self) -> i64 {
        self.mob_end
    }
}

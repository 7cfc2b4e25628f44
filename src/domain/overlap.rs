//! Rule overlap validation.
//!
//! Rules sharing a (segment, cohort, metric) key must cover disjoint closed
//! MOB intervals, so every cohort age has exactly one governing rule per
//! metric. [`validate`] enumerates every colliding pair in one pass; an empty
//! result is the pass condition.

use crate::domain::rule::{MobInterval, RuleKey};
use std::collections::HashMap;

/// One side of a conflicting pair: the rule's input position and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictSide {
    pub position: usize,
    pub mob_start: i64,
    pub mob_end: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub key: RuleKey,
    /// The side that sorts first by (mob_start, mob_end, position).
    pub first: ConflictSide,
    pub second: ConflictSide,
}

impl Conflict {
    /// Input positions of both rules, lower first.
    pub fn positions(&self) -> (usize, usize) {
        let (a, b) = (self.first.position, self.second.position);
        (a.min(b), a.max(b))
    }
}

/// Closed-interval intersection test; symmetric in its arguments.
pub fn overlaps<A: MobInterval + ?Sized, B: MobInterval + ?Sized>(a: &A, b: &B) -> bool {
    !(a.mob_end() < b.mob_start() || b.mob_end() < a.mob_start())
}

/// Find every pair of same-key rules whose MOB intervals intersect.
///
/// Partitions are reported in first-seen key order. Within a partition rules
/// are stably sorted by (mob_start, mob_end, input position), which makes the
/// report reproducible when several rules share identical bounds.
pub fn validate<T: MobInterval>(rules: &[T]) -> Vec<Conflict> {
    let mut key_order: Vec<(&str, &str, &str)> = Vec::new();
    let mut partitions: HashMap<(&str, &str, &str), Vec<usize>> = HashMap::new();

    for (position, rule) in rules.iter().enumerate() {
        let key = rule.key();
        partitions
            .entry(key)
            .or_insert_with(|| {
                key_order.push(key);
                Vec::new()
            })
            .push(position);
    }

    let mut conflicts = Vec::new();
    for key in key_order {
        let Some(members) = partitions.get_mut(&key) else {
            continue;
        };
        if members.len() < 2 {
            continue;
        }
        members.sort_by_key(|&p| (rules[p].mob_start(), rules[p].mob_end(), p));

        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                if overlaps(&rules[a], &rules[b]) {
                    conflicts.push(Conflict {
                        key: RuleKey {
                            segment: key.0.to_string(),
                            cohort: key.1.to_string(),
                            metric: key.2.to_string(),
                        },
                        first: side(rules, a),
                        second: side(rules, b),
                    });
                }
            }
        }
    }
    conflicts
}

fn side<T: MobInterval>(rules: &[T], position: usize) -> ConflictSide {
    ConflictSide {
        position,
        mob_start: rules[position].mob_start(),
        mob_end: rules[position].mob_end(),
    }
}

//! Range-based lookup tables built from a column's mapping rules.
//!
//! A table maps an input number to a score by scanning the rules in list
//! order and applying the first interval that contains the input. Rules are
//! either fixed (one score for the whole interval) or linear (stepped growth
//! on top of whatever the previous rule scored at the boundary).

use crate::model::{MappingRule, RuleMax};

/// A compiled rule list, applied first-match in authored order.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    rules: Vec<MappingRule>,
}

impl LookupTable {
    pub fn new(rules: &[MappingRule]) -> Self {
        Self {
            rules: rules.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Map an input to its score. Unmatched inputs score 0.
    pub fn apply(&self, val: f64) -> f64 {
        for (idx, rule) in self.rules.iter().enumerate() {
            let lower_ok = rule.min.map_or(true, |m| val >= m);
            if lower_ok && val <= self.effective_max(idx, rule) {
                return if rule.is_linear {
                    self.linear_score(idx, rule, val)
                } else {
                    rule.score
                };
            }
        }
        0.0
    }

    /// `max: "next"` borrows the following rule's `min - 1`; a missing max
    /// leaves the rule unbounded above.
    fn effective_max(&self, idx: usize, rule: &MappingRule) -> f64 {
        match rule.max {
            Some(RuleMax::Value(v)) => v,
            Some(RuleMax::Next) => self
                .rules
                .get(idx + 1)
                .and_then(|next| next.min)
                .map_or(f64::INFINITY, |m| m - 1.0),
            None => f64::INFINITY,
        }
    }

    /// Stepped growth: the baseline is the cumulative score at `min - 1`,
    /// which may itself come from an earlier linear rule.
    fn linear_score(&self, idx: usize, rule: &MappingRule, val: f64) -> f64 {
        let start = rule.min.unwrap_or(0.0);
        let prev_end = start - 1.0;
        // prev_end < val keeps the self-referential lookup terminating even
        // on rule lists that never set a lower bound.
        let base = if idx > 0 && prev_end < val {
            self.apply(prev_end)
        } else {
            0.0
        };
        let unit = rule.unit.unwrap_or(1.0).max(1.0);
        let increments = ((val - prev_end) / unit).floor();
        let step = rule.unit_score.unwrap_or(rule.score);
        base + increments * step
    }
}

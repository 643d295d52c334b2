//! Per-execution budget ledger.
//!
//! A pure accumulator over phase costs. The ledger never blocks or warns:
//! [`BudgetLedger::would_exceed`] is consulted by the state machine before a
//! phase group is launched, and crossing the limit there is a hard stop.
//! Advisory warn/danger thresholds are a dashboard concern, not ours.

use serde::{Deserialize, Serialize};

/// Running cost accumulator with an optional hard limit.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetLedger {
    limit_usd: Option<f64>,
    total_usd: f64,
}

impl BudgetLedger {
    /// Fresh ledger with nothing spent.
    pub fn new(limit_usd: Option<f64>) -> Self {
        Self::with_total(limit_usd, 0.0)
    }

    /// Ledger reconstructed from an already-known total (sum of phase costs).
    pub fn with_total(limit_usd: Option<f64>, total_usd: f64) -> Self {
        Self { limit_usd, total_usd }
    }

    /// Add a completed phase's cost to the running total.
    pub fn charge(&mut self, amount_usd: f64) {
        self.total_usd += amount_usd;
    }

    pub fn total(&self) -> f64 {
        self.total_usd
    }

    pub fn limit(&self) -> Option<f64> {
        self.limit_usd
    }

    /// `limit - total`, or `None` when no limit is configured (unbounded).
    pub fn remaining(&self) -> Option<f64> {
        self.limit_usd.map(|limit| limit - self.total_usd)
    }

    /// Would spending `estimated_usd` push the total strictly above the limit?
    ///
    /// Always `false` when no limit is configured.
    pub fn would_exceed(&self, estimated_usd: f64) -> bool {
        match self.limit_usd {
            Some(limit) => self.total_usd + estimated_usd > limit,
            None => false,
        }
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            total_cost_usd: self.total_usd,
            limit_usd: self.limit_usd,
            percent_used: self.limit_usd.map(|limit| {
                if limit <= 0.0 {
                    100.0
                } else {
                    (self.total_usd / limit) * 100.0
                }
            }),
        }
    }
}

/// Derived view of a ledger; recomputed on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub total_cost_usd: f64,
    pub limit_usd: Option<f64>,
    pub percent_used: Option<f64>,
}

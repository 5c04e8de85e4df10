//! Pricing configuration and per-batch cost accounting.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, SkaldError};

/// Per-item generation prices.
///
/// These are external pricing data, injected rather than hard-coded. A
/// backend-reported cost takes precedence over the configured item price.
///
/// ```rust
/// # use skald::Pricing;
/// let pricing = Pricing::new()
///     .narrative_cost(0.03)
///     .container_cost(0.004)
///     .baseline_per_item_cost(0.034);
/// assert!(pricing.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Price of one narrative generation. Default: 0.02.
    #[serde(default = "default_narrative_cost")]
    pub narrative_cost: f64,
    /// Price of one container generation. Default: 0.005.
    #[serde(default = "default_container_cost")]
    pub container_cost: f64,
    /// Flat price of generating one cell independently, with its own
    /// narrative and no cache. Default: 0.025.
    #[serde(default = "default_baseline_cost")]
    pub baseline_per_item_cost: f64,
}

fn default_narrative_cost() -> f64 {
    0.02
}

fn default_container_cost() -> f64 {
    0.005
}

fn default_baseline_cost() -> f64 {
    0.025
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            narrative_cost: default_narrative_cost(),
            container_cost: default_container_cost(),
            baseline_per_item_cost: default_baseline_cost(),
        }
    }
}

impl Pricing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn narrative_cost(mut self, cost: f64) -> Self {
        self.narrative_cost = cost;
        self
    }

    pub fn container_cost(mut self, cost: f64) -> Self {
        self.container_cost = cost;
        self
    }

    pub fn baseline_per_item_cost(mut self, cost: f64) -> Self {
        self.baseline_per_item_cost = cost;
        self
    }

    /// Reject negative or non-finite prices.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("narrative_cost", self.narrative_cost),
            ("container_cost", self.container_cost),
            ("baseline_per_item_cost", self.baseline_per_item_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SkaldError::Configuration(format!(
                    "pricing.{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Spend and savings for one journey batch.
///
/// Lives only as long as the batch result; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    /// Sum of generation costs actually incurred.
    pub total_cost: f64,
    /// Wall-clock duration of the batch.
    pub generation_time_ms: u64,
    /// `baseline_cost - total_cost`, never negative.
    pub cost_savings: f64,
    pub timestamp: DateTime<Utc>,
    /// Cost of generating every delivered cell independently, uncached.
    pub baseline_cost: f64,
    /// Portion of `total_cost` spent on the shared narrative.
    pub narrative_cost: f64,
    /// Items produced by a generation call (narrative included).
    pub generated: usize,
    /// Items served from cache (narrative included).
    pub cached: usize,
    /// Cells that failed.
    pub failed: usize,
    /// Items served as non-authoritative placeholders.
    pub fallback: usize,
}

/// Whether an item was served from cache or generated for this batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemOrigin {
    Cached,
    Generated,
}

/// Running totals while a batch executes.
#[derive(Debug, Default)]
pub(crate) struct LedgerAccumulator {
    total_cost: f64,
    narrative_cost: f64,
    generated: usize,
    cached: usize,
    failed: usize,
    fallback: usize,
    delivered_cells: usize,
}

impl LedgerAccumulator {
    pub(crate) fn record_narrative(&mut self, origin: ItemOrigin, cost: f64, authoritative: bool) {
        let incurred = self.record(origin, cost, authoritative);
        self.narrative_cost += incurred;
    }

    pub(crate) fn record_cell(&mut self, origin: ItemOrigin, cost: f64, authoritative: bool) {
        self.delivered_cells += 1;
        self.record(origin, cost, authoritative);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    fn record(&mut self, origin: ItemOrigin, cost: f64, authoritative: bool) -> f64 {
        if !authoritative {
            self.fallback += 1;
        }
        match origin {
            ItemOrigin::Cached => {
                self.cached += 1;
                0.0
            }
            ItemOrigin::Generated => {
                self.generated += 1;
                self.total_cost += cost;
                cost
            }
        }
    }

    pub(crate) fn finish(
        self,
        pricing: &Pricing,
        elapsed: Duration,
        timestamp: DateTime<Utc>,
    ) -> CostLedger {
        let baseline_cost = self.delivered_cells as f64 * pricing.baseline_per_item_cost;
        CostLedger {
            total_cost: self.total_cost,
            generation_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            cost_savings: (baseline_cost - self.total_cost).max(0.0),
            timestamp,
            baseline_cost,
            narrative_cost: self.narrative_cost,
            generated: self.generated,
            cached: self.cached,
            failed: self.failed,
            fallback: self.fallback,
        }
    }
}

//! Provider spend accounting.

use rust_decimal::Decimal;

/// Accumulates billable provider calls at a fixed unit cost.
///
/// Arithmetic is exact decimal, so the ceiling comparison flips on the
/// precise call that crosses it.
#[derive(Debug, Clone)]
pub struct CostTracker {
    unit_cost: Decimal,
    total_calls: u64,
}

impl CostTracker {
    #[must_use]
    pub fn new(unit_cost: Decimal) -> Self {
        Self {
            unit_cost,
            total_calls: 0,
        }
    }

    /// Records `n` more calls and returns the running cost.
    pub fn add_calls(&mut self, n: u64) -> Decimal {
        self.total_calls = self.total_calls.saturating_add(n);
        self.cost()
    }

    #[must_use]
    pub fn cost(&self) -> Decimal {
        Decimal::from(self.total_calls) * self.unit_cost
    }

    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    /// `true` once accumulated cost is strictly greater than `ceiling`.
    #[must_use]
    pub fn exceeds(&self, ceiling: Decimal) -> bool {
        self.cost() > ceiling
    }
}

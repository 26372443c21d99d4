//! Synthetic observation sequences for adversarial testing.
//!
//! Generators for pathological usage patterns: sustained overshoot,
//! overshoot/paydown oscillation, ramps, exact-boundary probing. All
//! integer arithmetic; factors are expressed in percent of budget.

/// `windows` observations of the same usage.
#[must_use]
pub fn constant(usage_us: u64, windows: usize) -> Vec<u64> {
    vec![usage_us; windows]
}

/// Usage as an integer percentage of the budget.
#[must_use]
pub fn percent_of(budget_us: u64, percent: u64) -> u64 {
    budget_us / 100 * percent + budget_us % 100 * percent / 100
}

/// Every window consumes `percent`% of budget (`percent > 100` for a true
/// overshoot). Exercises unbounded debt growth.
#[must_use]
pub fn continuous_overshoot(budget_us: u64, percent: u64, windows: usize) -> Vec<u64> {
    constant(percent_of(budget_us, percent), windows)
}

/// Alternates an overshoot window and an undershoot window for
/// `cycles` cycles. Exercises debt accumulation against paydown.
#[must_use]
pub fn alternating_overshoot_undershoot(
    budget_us: u64,
    over_percent: u64,
    under_percent: u64,
    cycles: usize,
) -> Vec<u64> {
    let over = percent_of(budget_us, over_percent);
    let under = percent_of(budget_us, under_percent);
    let mut out = Vec::with_capacity(cycles * 2);
    for _ in 0..cycles {
        out.push(over);
        out.push(under);
    }
    out
}

/// Linear ramp from `start_us` in increments of `step_us`. Saturates
/// instead of wrapping.
#[must_use]
pub fn ramp(start_us: u64, step_us: u64, windows: usize) -> Vec<u64> {
    (0..windows as u64)
        .map(|i| start_us.saturating_add(step_us.saturating_mul(i)))
        .collect()
}

/// Every window consumes exactly the budget.
#[must_use]
pub fn exact_budget(budget_us: u64, windows: usize) -> Vec<u64> {
    constant(budget_us, windows)
}

//! Windowed CPU policy state machine.
//!
//! This module is the decision core of the governor: a pure function from
//! `(prior state, observed usage, declared budget, window size)` to
//! `(next state, enforced quota, fired rule)`. Everything else in the engine
//! exists to feed this function observations and carry its decisions to the
//! kernel; no other component contains decision logic.
//!
//! # Rule set
//!
//! Exactly three rules, evaluated in order; the first match fires:
//!
//! ```text
//! R-UNDER  usage < budget   pay down debt by the headroom, quota = budget - debt
//! R-EXACT  usage == budget  debt unchanged, quota = budget - debt
//! R-OVER   usage > budget   debt grows by the excess, quota = budget - debt (floor 0)
//! ```
//!
//! The rule set is total over non-negative integers: every `(debt, usage,
//! budget)` triple maps to exactly one rule. Debt never decreases except by
//! under-budget payment, a workload is throttled exactly while it carries
//! debt, and the quota emitted for the next window never exceeds the
//! declared budget.
//!
//! # Purity
//!
//! `step` performs no I/O, reads no clocks, and uses no randomness or
//! floating point. All arithmetic is checked `u64` in microseconds; an
//! unrepresentable debt is a hard error, never a silent wrap. Identical
//! inputs produce identical outputs on every platform, which is what makes
//! the recorded decision stream replayable offline.

mod error;

use serde::{Deserialize, Serialize};

pub use self::error::PolicyError;


/// Coarse policy mode, derived from debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// No outstanding debt; the full budget is available.
    Normal,
    /// Outstanding debt; the quota is reduced until the debt is paid.
    Throttled,
}

/// Names the policy rule that produced a decision.
///
/// Serialized into every decision record so a reader can trace a quota back
/// to the exact transition that emitted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleId {
    /// Usage strictly below budget.
    #[serde(rename = "R-UNDER")]
    Under,
    /// Usage exactly at budget.
    #[serde(rename = "R-EXACT")]
    Exact,
    /// Usage strictly above budget.
    #[serde(rename = "R-OVER")]
    Over,
}

impl RuleId {
    /// Returns the stable wire name of the rule.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Under => "R-UNDER",
            Self::Exact => "R-EXACT",
            Self::Over => "R-OVER",
        }
    }
}

/// Per-workload policy state.
///
/// Owned by the orchestrator's registry, mutated only by committing the
/// output of [`step`]. The mode is always consistent with the debt: `Normal`
/// holds exactly when the debt is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyState {
    /// Current mode.
    pub mode: Mode,

    /// Unpaid overshoot in microseconds.
    pub debt_us: u64,

    /// Last enforced quota in microseconds. Informational only; no rule
    /// reads it.
    pub last_quota_us: u64,
}

impl PolicyState {
    /// Initial state for a freshly registered workload: `Normal`, zero debt,
    /// with the declared budget as the standing quota.
    #[must_use]
    pub const fn initial(budget_us: u64) -> Self {
        Self {
            mode: Mode::Normal,
            debt_us: 0,
            last_quota_us: budget_us,
        }
    }
}

/// Output of one policy step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutput {
    /// State to commit for the next window.
    pub next: PolicyState,

    /// Quota in microseconds to enforce during the next window.
    pub quota_us: u64,

    /// The rule that fired.
    pub rule: RuleId,
}

/// Evaluates the policy for one enforcement window.
///
/// `usage_us` is the observed CPU consumption for the window just ended,
/// `budget_us` the workload's declared budget, and `window_us` the global
/// window size. The window size is carried for the decision record but no
/// rule uses it numerically; budgets are already per-window quantities.
///
/// The returned quota applies to the *next* window: the decision made at the
/// boundary of window `w` bounds consumption in `w + 1`, which caps the
/// enforcement lag at one window.
///
/// # Errors
///
/// Returns [`PolicyError::DebtOverflow`] when accumulating the overshoot
/// would exceed `u64::MAX` microseconds of debt. The caller must treat this
/// as fatal; the engine never wraps.
pub fn step(
    state: PolicyState,
    usage_us: u64,
    budget_us: u64,
    window_us: u64,
) -> Result<StepOutput, PolicyError> {
    debug_assert!(window_us > 0, "window size must be positive");

    if usage_us < budget_us {
        // R-UNDER: pay debt out of the unused headroom. Quota opens back up
        // exactly as far as the remaining debt allows.
        let headroom = budget_us - usage_us;
        let pay = state.debt_us.min(headroom);
        let debt = state.debt_us - pay;
        Ok(decide(debt, budget_us, RuleId::Under))
    } else if usage_us == budget_us {
        // R-EXACT: no new excess, no payment. Existing debt keeps the
        // workload throttled.
        Ok(decide(state.debt_us, budget_us, RuleId::Exact))
    } else {
        // R-OVER: the excess becomes debt, applied as a reduced quota from
        // the next window on.
        let excess = usage_us - budget_us;
        let debt = state
            .debt_us
            .checked_add(excess)
            .ok_or(PolicyError::DebtOverflow {
                debt_us: state.debt_us,
                excess_us: excess,
            })?;
        Ok(decide(debt, budget_us, RuleId::Over))
    }
}

/// Derives mode and quota from the settled debt.
///
/// Quota is `budget - debt`, floored at zero. Mode is `Throttled` exactly
/// while debt remains.
fn decide(debt_us: u64, budget_us: u64, rule: RuleId) -> StepOutput {
    let quota_us = budget_us.saturating_sub(debt_us);
    let mode = if debt_us == 0 {
        Mode::Normal
    } else {
        Mode::Throttled
    };
    StepOutput {
        next: PolicyState {
            mode,
            debt_us,
            last_quota_us: quota_us,
        },
        quota_us,
        rule,
    }
}

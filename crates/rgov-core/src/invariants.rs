//! Runtime verification of the policy guarantees.
//!
//! The policy is correct by construction, but the orchestrator still checks
//! every committed decision against the guarantees the governor advertises.
//! A violation means the engine itself is broken, and the only honest
//! response is to halt with a full diagnostic; a governor that keeps running
//! past a broken guarantee is applying hidden policy.
//!
//! Non-negativity of debt and quota is carried by the type system (`u64`
//! throughout); the checks here cover the relational guarantees a type
//! cannot express.

use thiserror::Error;

use crate::policy::Mode;
use crate::record::DecisionRecord;

/// A decision violated one of the engine's guarantees.
///
/// Fatal. Carries the violated check by name and the complete decision so
/// the failure is diagnosable from the error alone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invariant violation: {check}: {record}")]
pub struct InvariantViolation {
    /// Name of the violated check.
    pub check: &'static str,
    /// The offending decision, inputs and outputs included.
    pub record: DecisionRecord,
}

/// Verifies one committed decision.
///
/// Checked guarantees:
///
/// - the enforced quota never exceeds the declared budget;
/// - `Normal` mode holds exactly when debt is zero, `Throttled` exactly when
///   debt remains (so a workload is never throttled without recorded
///   excess);
/// - debt only decreases in a window whose usage was under budget.
///
/// # Errors
///
/// Returns [`InvariantViolation`] naming the first failed check.
pub fn verify_step(record: &DecisionRecord) -> Result<(), InvariantViolation> {
    let fail = |check: &'static str| InvariantViolation {
        check,
        record: record.clone(),
    };

    if record.quota_us > record.budget_us {
        return Err(fail("quota_within_budget"));
    }
    match record.mode_out {
        Mode::Normal if record.debt_out_us != 0 => {
            return Err(fail("normal_mode_clears_debt"));
        },
        Mode::Throttled if record.debt_out_us == 0 => {
            return Err(fail("throttled_mode_carries_debt"));
        },
        _ => {},
    }
    if record.debt_out_us < record.debt_in_us && record.usage_us >= record.budget_us {
        return Err(fail("no_forgiveness_without_payment"));
    }
    Ok(())
}

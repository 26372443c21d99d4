//! Policy evaluation errors.

use thiserror::Error;

/// Errors from evaluating a policy step.
///
/// The policy cannot fail on valid inputs; the only failure is arithmetic
/// that the engine refuses to represent. Callers treat every variant as
/// fatal: there is no recovery path, and correctness takes precedence over
/// liveness.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolicyError {
    /// Accumulated debt can no longer be represented in 64 bits.
    #[error("debt overflow: {debt_us} us + {excess_us} us exceeds u64 range")]
    DebtOverflow {
        /// Debt carried into the step, in microseconds.
        debt_us: u64,
        /// Excess observed in the step, in microseconds.
        excess_us: u64,
    },
}

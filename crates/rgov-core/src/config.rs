//! Governor configuration and startup admission.
//!
//! Configuration is fixed at startup: the window size, the host capacity,
//! and the declared workloads. There is no dynamic reconfiguration: a
//! governor whose budgets drift at runtime cannot make replayable promises.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workload::{WorkloadId, WorkloadSpec};

/// Default enforcement window: 100ms.
pub const DEFAULT_WINDOW_US: u64 = 100_000;

/// Configuration errors. All fatal at startup; the governor refuses to run
/// on a configuration it cannot honor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The window size was zero.
    #[error("window size must be a positive number of microseconds")]
    ZeroWindow,

    /// The capacity was zero.
    #[error("capacity must be a positive number of microseconds per window")]
    ZeroCapacity,

    /// Two workloads share an id.
    #[error("duplicate workload id: {id}")]
    DuplicateWorkload {
        /// The repeated id.
        id: WorkloadId,
    },

    /// No workloads were declared.
    #[error("at least one workload must be declared")]
    NoWorkloads,

    /// The declared budgets exceed the host capacity.
    #[error("declared budgets total {total_us} us/window, exceeding capacity {capacity_us} us/window")]
    CapacityExceeded {
        /// Sum of declared budgets, microseconds per window.
        total_us: u64,
        /// Host capacity, microseconds per window.
        capacity_us: u64,
    },

    /// The budget sum is not representable.
    #[error("declared budgets overflow u64 when summed")]
    BudgetSumOverflow,
}

/// Complete governor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Enforcement window size, microseconds. Process-wide constant.
    pub window_us: u64,

    /// Host CPU capacity, microseconds per window. Used once, for startup
    /// admission; never consulted by policy.
    pub capacity_us: u64,

    /// Declared workloads, in registration order.
    pub workloads: Vec<WorkloadSpec>,
}

impl GovernorConfig {
    /// Validates the configuration: positive window and capacity, unique
    /// workload ids, and total declared budget within capacity.
    ///
    /// # Errors
    ///
    /// Returns the first applicable [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_us == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.capacity_us == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.workloads.is_empty() {
            return Err(ConfigError::NoWorkloads);
        }

        let mut seen: HashSet<&WorkloadId> = HashSet::new();
        for spec in &self.workloads {
            if !seen.insert(&spec.id) {
                return Err(ConfigError::DuplicateWorkload {
                    id: spec.id.clone(),
                });
            }
        }

        let total_us = self.total_budget_us()?;
        if total_us > self.capacity_us {
            return Err(ConfigError::CapacityExceeded {
                total_us,
                capacity_us: self.capacity_us,
            });
        }
        Ok(())
    }

    /// Sum of all declared budgets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BudgetSumOverflow`] when the sum does not fit
    /// in 64 bits.
    pub fn total_budget_us(&self) -> Result<u64, ConfigError> {
        self.workloads
            .iter()
            .try_fold(0u64, |acc, spec| acc.checked_add(spec.budget_us))
            .ok_or(ConfigError::BudgetSumOverflow)
    }
}

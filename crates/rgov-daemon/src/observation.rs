//! Cgroup-backed observation adapter.
//!
//! Reads the cumulative `usage_usec` counter once per window boundary and
//! presents the delta as that window's observation. The first sample after a
//! workload is tracked seeds the baseline and reports zero; there is no
//! window before registration to observe.
//!
//! No smoothing, no filtering, no mid-window reads. A counter that goes
//! backwards is reported as an error, never clamped: fabricating a usage
//! number would silently corrupt the decision stream.

use std::collections::HashMap;
use std::path::PathBuf;

use rgov_core::{ObservationError, Observer, WorkloadId};

use crate::cgroup;

#[derive(Debug)]
struct Tracked {
    cgroup: PathBuf,
    last_counter_us: Option<u64>,
}

/// Observer over live cgroup counters.
#[derive(Debug, Default)]
pub struct CgroupObserver {
    tracked: HashMap<WorkloadId, Tracked>,
}

impl CgroupObserver {
    /// Creates an observer with no tracked workloads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a workload's cgroup. The baseline is seeded lazily by the
    /// first sample.
    pub fn track(&mut self, id: WorkloadId, cgroup: PathBuf) {
        self.tracked.insert(
            id,
            Tracked {
                cgroup,
                last_counter_us: None,
            },
        );
    }

    /// Stops tracking a workload.
    pub fn untrack(&mut self, id: &WorkloadId) {
        self.tracked.remove(id);
    }
}

impl Observer for CgroupObserver {
    fn sample(&mut self, id: &WorkloadId, window: u64) -> Result<u64, ObservationError> {
        let tracked = self
            .tracked
            .get_mut(id)
            .ok_or_else(|| ObservationError::Unreadable {
                id: id.clone(),
                reason: "workload is not tracked by the observer".to_string(),
            })?;

        let current_us =
            cgroup::read_usage_usec(&tracked.cgroup).map_err(|err| ObservationError::Unreadable {
                id: id.clone(),
                reason: err.to_string(),
            })?;

        match tracked.last_counter_us {
            None => {
                tracked.last_counter_us = Some(current_us);
                tracing::debug!(workload = %id, window, baseline_us = current_us, "observation baseline seeded");
                Ok(0)
            },
            Some(previous_us) => {
                if current_us < previous_us {
                    return Err(ObservationError::NonMonotonic {
                        id: id.clone(),
                        previous_us,
                        current_us,
                    });
                }
                tracked.last_counter_us = Some(current_us);
                Ok(current_us - previous_us)
            },
        }
    }
}

//! Cgroup-backed enforcement adapter.
//!
//! Projects quota decisions verbatim into `cpu.max`. A write-through cache
//! keeps the adapter idempotent on the cheap path: when the kernel already
//! holds the pair being applied, no write is issued. The cache entry is
//! dropped on a failed write so the next window retries unconditionally.
//!
//! The adapter never reads kernel feedback and never touches weight, uclamp,
//! or realtime knobs.

use std::collections::HashMap;
use std::path::PathBuf;

use rgov_core::{Enforcer, EnforcementError, WorkloadId};

use crate::cgroup;

/// Enforcer over live `cpu.max` files.
#[derive(Debug, Default)]
pub struct CgroupEnforcer {
    paths: HashMap<WorkloadId, PathBuf>,
    kernel_holds: HashMap<WorkloadId, (u64, u64)>,
}

impl CgroupEnforcer {
    /// Creates an enforcer with no governed workloads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a workload's cgroup as an enforcement target.
    pub fn govern(&mut self, id: WorkloadId, cgroup: PathBuf) {
        self.paths.insert(id, cgroup);
    }

    /// Removes a workload from enforcement.
    pub fn release(&mut self, id: &WorkloadId) {
        self.paths.remove(id);
        self.kernel_holds.remove(id);
    }

    /// Best-effort shutdown restore: lifts the cap on every governed cgroup
    /// by writing `max <period>`. Failures are logged and swallowed; the
    /// process is exiting and restore never influences policy.
    pub fn restore_unlimited(&mut self, period_us: u64) {
        for (id, path) in &self.paths {
            match cgroup::write_cpu_max_unlimited(path, period_us) {
                Ok(()) => {
                    tracing::info!(workload = %id, "cpu.max restored to unlimited");
                },
                Err(err) => {
                    tracing::warn!(workload = %id, error = %err, "cpu.max restore failed");
                },
            }
        }
        self.kernel_holds.clear();
    }
}

impl Enforcer for CgroupEnforcer {
    fn apply(
        &mut self,
        id: &WorkloadId,
        quota_us: u64,
        window_us: u64,
    ) -> Result<(), EnforcementError> {
        let path = self.paths.get(id).ok_or_else(|| EnforcementError::WriteFailed {
            id: id.clone(),
            reason: "workload is not governed by the enforcer".to_string(),
        })?;

        if self.kernel_holds.get(id) == Some(&(quota_us, window_us)) {
            tracing::trace!(workload = %id, quota_us, window_us, "kernel already holds pair; write skipped");
            return Ok(());
        }

        match cgroup::write_cpu_max(path, quota_us, window_us) {
            Ok(()) => {
                self.kernel_holds.insert(id.clone(), (quota_us, window_us));
                Ok(())
            },
            Err(err) => {
                // Forget what we believed the kernel holds; the next apply
                // must issue a real write.
                self.kernel_holds.remove(id);
                Err(EnforcementError::WriteFailed {
                    id: id.clone(),
                    reason: err.to_string(),
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fixture() -> (tempfile::TempDir, CgroupEnforcer, WorkloadId) {
        let dir = tempfile::tempdir().unwrap();
        let id = WorkloadId::new("wl").unwrap();
        let mut enforcer = CgroupEnforcer::new();
        enforcer.govern(id.clone(), dir.path().to_path_buf());
        (dir, enforcer, id)
    }

    fn cpu_max(dir: &tempfile::TempDir) -> String {
        fs::read_to_string(dir.path().join("cpu.max")).unwrap()
    }

    #[test]
    fn test_apply_writes_the_pair() {
        let (dir, mut enforcer, id) = fixture();
        enforcer.apply(&id, 50_000, 100_000).unwrap();
        assert_eq!(cpu_max(&dir), "50000 100000");
    }

    #[test]
    fn test_repeated_apply_skips_the_write() {
        let (dir, mut enforcer, id) = fixture();
        enforcer.apply(&id, 50_000, 100_000).unwrap();

        // Clobber the file behind the adapter's back. A cached re-apply of
        // the same pair must not issue a write, so the marker survives.
        fs::write(dir.path().join("cpu.max"), "marker").unwrap();
        enforcer.apply(&id, 50_000, 100_000).unwrap();
        assert_eq!(cpu_max(&dir), "marker");

        // A different pair goes through.
        enforcer.apply(&id, 60_000, 100_000).unwrap();
        assert_eq!(cpu_max(&dir), "60000 100000");
    }

    #[test]
    fn test_failed_write_clears_the_cache() {
        let (dir, mut enforcer, id) = fixture();
        enforcer.apply(&id, 50_000, 100_000).unwrap();

        // Make the next write fail by replacing the file with a directory.
        fs::remove_file(dir.path().join("cpu.max")).unwrap();
        fs::create_dir(dir.path().join("cpu.max")).unwrap();
        assert!(enforcer.apply(&id, 60_000, 100_000).is_err());

        // Heal the filesystem; the same pair must now be written for real
        // even though it was attempted before.
        fs::remove_dir(dir.path().join("cpu.max")).unwrap();
        enforcer.apply(&id, 60_000, 100_000).unwrap();
        assert_eq!(cpu_max(&dir), "60000 100000");
    }

    #[test]
    fn test_ungoverned_workload_is_an_error() {
        let mut enforcer = CgroupEnforcer::new();
        let ghost = WorkloadId::new("ghost").unwrap();
        assert!(enforcer.apply(&ghost, 1, 2).is_err());
    }

    #[test]
    fn test_restore_unlimited_lifts_the_cap() {
        let (dir, mut enforcer, id) = fixture();
        enforcer.apply(&id, 50_000, 100_000).unwrap();
        enforcer.restore_unlimited(100_000);
        assert_eq!(cpu_max(&dir), "max 100000");
    }
}

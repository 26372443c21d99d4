//! End-to-end governor tests over a fake cgroup tree.
//!
//! A tempdir stands in for `/sys/fs/cgroup`: each workload directory gets a
//! scripted `cpu.stat` that the test advances between ticks, and the test
//! reads back `cpu.max` to see what the governor enforced. No real kernel,
//! no sleeping (the driver smoke test excepted).

use std::fs;
use std::path::PathBuf;

use rgov_core::{verify_replay, GovernorConfig, Orchestrator, WorkloadId, WorkloadSpec};
use rgov_daemon::{
    CgroupEnforcer, CgroupObserver, DaemonConfig, DriverOptions, JsonlSink,
};

const W: u64 = 100_000;

struct FakeCgroup {
    root: tempfile::TempDir,
}

impl FakeCgroup {
    fn new(ids: &[&str]) -> Self {
        let root = tempfile::tempdir().unwrap();
        for id in ids {
            let dir = root.path().join(id);
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("cpu.stat"), "usage_usec 0\n").unwrap();
        }
        Self { root }
    }

    fn path(&self, id: &str) -> PathBuf {
        self.root.path().join(id)
    }

    fn set_counter(&self, id: &str, counter_us: u64) {
        fs::write(
            self.path(id).join("cpu.stat"),
            format!("usage_usec {counter_us}\n"),
        )
        .unwrap();
    }

    fn cpu_max(&self, id: &str) -> String {
        fs::read_to_string(self.path(id).join("cpu.max")).unwrap()
    }
}

fn governor_config(fake: &FakeCgroup, ids_and_budgets: &[(&str, u64)]) -> GovernorConfig {
    GovernorConfig {
        window_us: W,
        capacity_us: 10_000_000,
        workloads: ids_and_budgets
            .iter()
            .map(|(id, budget_us)| WorkloadSpec {
                id: WorkloadId::new(*id).unwrap(),
                budget_us: *budget_us,
                cgroup: fake.path(id),
            })
            .collect(),
    }
}

fn adapters(config: &GovernorConfig) -> (CgroupObserver, CgroupEnforcer) {
    let mut observer = CgroupObserver::new();
    let mut enforcer = CgroupEnforcer::new();
    for spec in &config.workloads {
        observer.track(spec.id.clone(), spec.cgroup.clone());
        enforcer.govern(spec.id.clone(), spec.cgroup.clone());
    }
    (observer, enforcer)
}

#[test]
fn governed_overshoot_is_throttled_then_released() {
    let fake = FakeCgroup::new(&["web"]);
    let config = governor_config(&fake, &[("web", 100_000)]);
    let (observer, enforcer) = adapters(&config);

    let log_path = fake.root.path().join("decisions.jsonl");
    let sink = JsonlSink::create(&log_path).unwrap();
    let mut orch = Orchestrator::new(&config, observer, enforcer, sink).unwrap();

    // Startup enforcement wrote the full budget.
    assert_eq!(fake.cpu_max("web"), "100000 100000");

    // Window 0: baseline seeding, observation is zero.
    orch.tick().unwrap();
    assert_eq!(fake.cpu_max("web"), "100000 100000");

    // Window 1: the workload burned 150ms of CPU.
    fake.set_counter("web", 150_000);
    orch.tick().unwrap();
    assert_eq!(fake.cpu_max("web"), "50000 100000");

    // Window 2: idle; debt is paid, full budget restored.
    orch.tick().unwrap();
    assert_eq!(fake.cpu_max("web"), "100000 100000");

    // The produced log replays byte-equal.
    orch.flush().unwrap();
    let log = fs::read_to_string(&log_path).unwrap();
    verify_replay(&config, log.trim_end()).expect("live log failed replay verification");
}

#[test]
fn two_workloads_enforce_independently() {
    let fake = FakeCgroup::new(&["web", "batch"]);
    let config = governor_config(&fake, &[("web", 80_000), ("batch", 50_000)]);
    let (observer, enforcer) = adapters(&config);
    let sink = JsonlSink::create(&fake.root.path().join("decisions.jsonl")).unwrap();
    let mut orch = Orchestrator::new(&config, observer, enforcer, sink).unwrap();

    orch.tick().unwrap(); // seeds baselines

    fake.set_counter("web", 100_000); // 20k over
    fake.set_counter("batch", 25_000); // well under
    orch.tick().unwrap();

    assert_eq!(fake.cpu_max("web"), "60000 100000");
    assert_eq!(fake.cpu_max("batch"), "50000 100000");
}

#[test]
fn backwards_counter_halts_the_run() {
    let fake = FakeCgroup::new(&["web"]);
    let config = governor_config(&fake, &[("web", 100_000)]);
    let (observer, enforcer) = adapters(&config);
    let sink = JsonlSink::create(&fake.root.path().join("decisions.jsonl")).unwrap();
    let mut orch = Orchestrator::new(&config, observer, enforcer, sink).unwrap();

    fake.set_counter("web", 500_000);
    orch.tick().unwrap();

    fake.set_counter("web", 100_000); // cgroup recreated or counter reset
    assert!(orch.tick().is_err());
}

#[tokio::test(flavor = "current_thread")]
async fn driver_runs_to_window_limit_and_restores() {
    let fake = FakeCgroup::new(&["web"]);
    let log_path = fake.root.path().join("decisions.jsonl");

    // 2ms windows keep the smoke test fast; the cadence itself is not
    // under test here.
    let config = DaemonConfig {
        governor: GovernorConfig {
            window_us: 2_000,
            capacity_us: 1_000_000,
            workloads: vec![WorkloadSpec {
                id: WorkloadId::new("web").unwrap(),
                budget_us: 2_000,
                cgroup: fake.path("web"),
            }],
        },
        decision_log: log_path.clone(),
    };

    let summary = rgov_daemon::run(
        &config,
        DriverOptions {
            max_windows: Some(3),
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.windows, 3);
    assert_eq!(summary.enforcement_failures, 0);

    // Shutdown restore lifted the cap.
    assert_eq!(fake.cpu_max("web"), "max 2000");

    // Three windows of records, flushed, and replayable.
    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.lines().count(), 3);
    verify_replay(&config.governor, log.trim_end()).unwrap();
}

#[test]
fn decision_log_lines_carry_the_wire_vocabulary() {
    let fake = FakeCgroup::new(&["web"]);
    let config = governor_config(&fake, &[("web", 100_000)]);
    let (observer, enforcer) = adapters(&config);
    let log_path = fake.root.path().join("decisions.jsonl");
    let sink = JsonlSink::create(&log_path).unwrap();
    let mut orch = Orchestrator::new(&config, observer, enforcer, sink).unwrap();

    orch.tick().unwrap();
    fake.set_counter("web", 175_000);
    orch.tick().unwrap();
    orch.flush().unwrap();

    let log = fs::read_to_string(&log_path).unwrap();
    let second: serde_json::Value = serde_json::from_str(log.lines().nth(1).unwrap()).unwrap();
    assert_eq!(second["w"], 1);
    assert_eq!(second["workload_id"], "web");
    assert_eq!(second["U_w"], 175_000);
    assert_eq!(second["B"], 100_000);
    assert_eq!(second["W"], 100_000);
    assert_eq!(second["T_w"], 25_000);
    assert_eq!(second["rule_id"], "R-OVER");
    assert_eq!(second["mode_out"], "Throttled");
}

//! Orchestrator sequencing, admission, and failure-posture tests.

use std::path::PathBuf;

use rgov_core::{
    Enforcer, EnforcementError, GovernorConfig, MemoryEnforcer, MemorySink, Mode,
    ObservationError, Observer, Orchestrator, ReplaySource, StartupError, TickError,
    WorkloadId, WorkloadSpec,
};

const B: u64 = 100_000;
const W: u64 = 100_000;

fn config_for(ids_and_budgets: &[(&str, u64)]) -> GovernorConfig {
    GovernorConfig {
        window_us: W,
        capacity_us: 400_000,
        workloads: ids_and_budgets
            .iter()
            .map(|(id, budget_us)| WorkloadSpec {
                id: WorkloadId::new(*id).unwrap(),
                budget_us: *budget_us,
                cgroup: PathBuf::from(format!("/sys/fs/cgroup/{id}")),
            })
            .collect(),
    }
}

fn source_for(sequences: &[(&str, Vec<u64>)]) -> ReplaySource {
    let mut source = ReplaySource::new();
    for (id, seq) in sequences {
        source.insert(WorkloadId::new(*id).unwrap(), seq.clone());
    }
    source
}

/// Enforcer that accepts a fixed number of writes (the startup ones), then
/// fails every write after that.
struct FailAfter {
    ok_writes_remaining: usize,
    failed_writes: usize,
}

impl FailAfter {
    fn startup_writes(count: usize) -> Self {
        Self {
            ok_writes_remaining: count,
            failed_writes: 0,
        }
    }
}

impl Enforcer for FailAfter {
    fn apply(
        &mut self,
        id: &WorkloadId,
        _quota_us: u64,
        _window_us: u64,
    ) -> Result<(), EnforcementError> {
        if self.ok_writes_remaining > 0 {
            self.ok_writes_remaining -= 1;
            return Ok(());
        }
        self.failed_writes += 1;
        Err(EnforcementError::WriteFailed {
            id: id.clone(),
            reason: "injected failure".to_string(),
        })
    }
}

/// Observer that always fails.
struct BrokenObserver;

impl Observer for BrokenObserver {
    fn sample(&mut self, id: &WorkloadId, _window: u64) -> Result<u64, ObservationError> {
        Err(ObservationError::Unreadable {
            id: id.clone(),
            reason: "injected failure".to_string(),
        })
    }
}

#[test]
fn records_follow_registration_order_within_a_window() {
    let config = config_for(&[("zeta", 10_000), ("alpha", 10_000), ("mid", 10_000)]);
    let source = source_for(&[
        ("zeta", vec![0, 0]),
        ("alpha", vec![0, 0]),
        ("mid", vec![0, 0]),
    ]);
    let mut orch =
        Orchestrator::new(&config, source, MemoryEnforcer::default(), MemorySink::default())
            .unwrap();
    orch.tick().unwrap();
    orch.tick().unwrap();

    let (_, _, sink) = orch.into_parts();
    let order: Vec<String> = sink
        .records
        .iter()
        .map(|r| format!("{}:{}", r.window, r.workload_id))
        .collect();
    // Registration order, not lexicographic order.
    assert_eq!(
        order,
        vec!["0:zeta", "0:alpha", "0:mid", "1:zeta", "1:alpha", "1:mid"]
    );
}

#[test]
fn capacity_overrun_refuses_to_start() {
    let config = config_for(&[("a", 300_000), ("b", 200_000)]);
    let source = ReplaySource::new();
    let result =
        Orchestrator::new(&config, source, MemoryEnforcer::default(), MemorySink::default());
    assert!(matches!(result, Err(StartupError::Config(_))));
}

#[test]
fn enforcement_failure_is_counted_not_fatal() {
    let config = config_for(&[("a", B)]);
    let source = source_for(&[("a", vec![150_000, 0])]);
    let mut orch = Orchestrator::new(
        &config,
        source,
        FailAfter::startup_writes(1),
        MemorySink::default(),
    )
    .unwrap();

    let report = orch.tick().unwrap();
    assert_eq!(report.decisions, 1);
    assert_eq!(report.enforcement_failures, 1);

    // The decision was committed regardless of the failed kernel write.
    let id = WorkloadId::new("a").unwrap();
    let after_first = orch.status(&id).unwrap().state;
    assert_eq!(after_first.mode, Mode::Throttled);
    assert_eq!(after_first.debt_us, 50_000);
}

#[test]
fn enforcement_failure_leaves_decisions_intact() {
    struct AlwaysFailing;
    impl Enforcer for AlwaysFailing {
        fn apply(
            &mut self,
            id: &WorkloadId,
            _quota_us: u64,
            _window_us: u64,
        ) -> Result<(), EnforcementError> {
            Err(EnforcementError::WriteFailed {
                id: id.clone(),
                reason: "kernel said no".to_string(),
            })
        }
    }

    let config = config_for(&[("a", B)]);
    let source = source_for(&[("a", vec![150_000, 0])]);
    // Startup enforcement failure is fatal by contract.
    let startup =
        Orchestrator::new(&config, source, AlwaysFailing, MemorySink::default());
    assert!(matches!(startup, Err(StartupError::Register(_))));
}

#[test]
fn mid_run_enforcement_failures_do_not_alter_the_stream() {
    let config = config_for(&[("a", B)]);

    // Reference run with a healthy enforcer.
    let healthy = rgov_core::run_replay(
        &config,
        source_for(&[("a", vec![150_000, 0, 200_000])]),
    )
    .unwrap();

    // Same observations with every post-startup write failing.
    let source = source_for(&[("a", vec![150_000, 0, 200_000])]);
    let mut orch = Orchestrator::new(
        &config,
        source,
        FailAfter::startup_writes(1),
        MemorySink::default(),
    )
    .unwrap();
    let mut reports = Vec::new();
    for _ in 0..3 {
        reports.push(orch.tick().unwrap());
    }
    let (_, enforcer, sink) = orch.into_parts();
    assert_eq!(sink.records, healthy.records);
    assert_eq!(enforcer.failed_writes, 3);
    assert!(reports.iter().all(|r| r.enforcement_failures == 1));
}

#[test]
fn observation_failure_aborts_the_tick() {
    let config = config_for(&[("a", B)]);
    let mut orch = Orchestrator::new(
        &config,
        BrokenObserver,
        MemoryEnforcer::default(),
        MemorySink::default(),
    )
    .unwrap();
    let err = orch.tick().unwrap_err();
    assert!(matches!(err, TickError::Observation(_)));
    // The window did not advance.
    assert_eq!(orch.window(), 0);
}

#[test]
fn missing_recording_aborts_the_tick() {
    let config = config_for(&[("a", B)]);
    let source = source_for(&[("a", vec![10_000])]);
    let mut orch =
        Orchestrator::new(&config, source, MemoryEnforcer::default(), MemorySink::default())
            .unwrap();
    orch.tick().unwrap();
    let err = orch.tick().unwrap_err();
    assert!(matches!(
        err,
        TickError::Observation(ObservationError::MissingRecording { window: 1, .. })
    ));
}

#[test]
fn deregistered_workload_stops_appearing() {
    let config = config_for(&[("a", 10_000), ("b", 10_000)]);
    let source = source_for(&[("a", vec![0, 0]), ("b", vec![0, 0])]);
    let mut orch =
        Orchestrator::new(&config, source, MemoryEnforcer::default(), MemorySink::default())
            .unwrap();
    orch.tick().unwrap();

    let b = WorkloadId::new("b").unwrap();
    assert!(orch.deregister(&b));
    assert!(!orch.deregister(&b));
    let report = orch.tick().unwrap();
    assert_eq!(report.decisions, 1);

    let (_, _, sink) = orch.into_parts();
    let window1: Vec<_> = sink.records.iter().filter(|r| r.window == 1).collect();
    assert_eq!(window1.len(), 1);
    assert_eq!(window1[0].workload_id.as_str(), "a");
}

#[test]
fn deregistering_releases_admitted_budget() {
    let config = config_for(&[("a", 300_000)]);
    let source = source_for(&[("a", vec![0])]);
    let mut orch =
        Orchestrator::new(&config, source, MemoryEnforcer::default(), MemorySink::default())
            .unwrap();

    let big = WorkloadSpec {
        id: WorkloadId::new("big").unwrap(),
        budget_us: 200_000,
        cgroup: PathBuf::from("/sys/fs/cgroup/big"),
    };
    // 300k admitted of 400k capacity: a further 200k must be rejected.
    assert!(orch.register(&big).is_err());

    let a = WorkloadId::new("a").unwrap();
    assert!(orch.deregister(&a));
    assert!(orch.register(&big).is_ok());
}

#[test]
fn status_reports_last_committed_decision() {
    let config = config_for(&[("a", B)]);
    let source = source_for(&[("a", vec![150_000, 0])]);
    let mut orch =
        Orchestrator::new(&config, source, MemoryEnforcer::default(), MemorySink::default())
            .unwrap();

    let a = WorkloadId::new("a").unwrap();
    let fresh = orch.status(&a).unwrap();
    assert_eq!(fresh.state.mode, Mode::Normal);
    assert!(fresh.last_record.is_none());

    orch.tick().unwrap();
    let after = orch.status(&a).unwrap();
    assert_eq!(after.state.debt_us, 50_000);
    let record = after.last_record.unwrap();
    assert_eq!(record.window, 0);
    assert_eq!(record.quota_us, 50_000);

    assert!(orch.status(&WorkloadId::new("ghost").unwrap()).is_none());
}

#[test]
fn startup_emits_one_full_budget_write_per_workload() {
    let config = config_for(&[("a", 80_000), ("b", 50_000)]);
    let source = source_for(&[("a", vec![]), ("b", vec![])]);
    let orch =
        Orchestrator::new(&config, source, MemoryEnforcer::default(), MemorySink::default())
            .unwrap();
    let (_, enforcer, _) = orch.into_parts();
    let startup: Vec<(String, u64)> = enforcer
        .applied
        .iter()
        .map(|c| (c.id.to_string(), c.quota_us))
        .collect();
    assert_eq!(
        startup,
        vec![("a".to_string(), 80_000), ("b".to_string(), 50_000)]
    );
}

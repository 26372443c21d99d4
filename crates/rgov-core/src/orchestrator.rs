//! Window orchestration: observe -> decide -> verify -> enforce -> commit -> log.
//!
//! The orchestrator owns the window index, the workload registry, and the
//! decision stream. Once per window boundary it runs the fixed sequence for
//! every registered workload, in registration order, synchronously. It makes
//! no decisions of its own (policy is the only component with decision
//! logic) and it never consults a clock; an external driver decides when a
//! boundary has arrived.
//!
//! # Adapter seams
//!
//! The kernel touchpoints are behind two narrow traits, [`Observer`] and
//! [`Enforcer`], and the decision stream behind [`RecordSink`]. The live
//! daemon plugs in cgroup-backed implementations; the replay harness plugs
//! in recorded and in-memory ones. Policy never sees which variant is
//! installed.
//!
//! # Failure posture
//!
//! Observation failures abort the tick: the engine refuses to fabricate a
//! usage number. Enforcement failures are logged and counted but never touch
//! policy state: the decision is already final, and the next window
//! re-applies the standing quota unconditionally. Invariant violations halt
//! everything.

use thiserror::Error;

use crate::config::{ConfigError, GovernorConfig};
use crate::invariants::{verify_step, InvariantViolation};
use crate::policy::{step, PolicyError, PolicyState};
use crate::record::DecisionRecord;
use crate::workload::{WorkloadId, WorkloadSpec};

/// Presents aggregated per-window observations.
///
/// Called exactly once per workload per window, at the boundary. The first
/// sample after registration reports zero and seeds the implementation's
/// baseline. Implementations must never smooth, filter, or guess.
pub trait Observer {
    /// Returns the CPU usage of `id` during window `window`, in
    /// microseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ObservationError`] when a trustworthy number cannot be
    /// produced.
    fn sample(&mut self, id: &WorkloadId, window: u64) -> Result<u64, ObservationError>;
}

/// Applies quota decisions to the kernel control knob.
///
/// Implementations must be idempotent: re-applying the pair the kernel
/// already holds is a no-op observable.
pub trait Enforcer {
    /// Enforces `quota_us` per `window_us` for workload `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcementError`] when the kernel write fails.
    fn apply(&mut self, id: &WorkloadId, quota_us: u64, window_us: u64)
        -> Result<(), EnforcementError>;
}

/// Append-only sink for the decision stream.
pub trait RecordSink {
    /// Appends one committed decision.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the record cannot be durably appended.
    fn append(&mut self, record: &DecisionRecord) -> Result<(), SinkError>;

    /// Flushes buffered records.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when buffered records cannot be written out.
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// Observation failures. Always fatal for the window: the governor would
/// rather halt than govern on fabricated data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObservationError {
    /// The cumulative counter went backwards.
    #[error("usage counter for workload {id} went backwards: {previous_us} -> {current_us}")]
    NonMonotonic {
        /// Affected workload.
        id: WorkloadId,
        /// Counter value at the previous boundary, microseconds.
        previous_us: u64,
        /// Counter value at this boundary, microseconds.
        current_us: u64,
    },

    /// The counter could not be read or parsed.
    #[error("cannot read usage counter for workload {id}: {reason}")]
    Unreadable {
        /// Affected workload.
        id: WorkloadId,
        /// Human-readable cause.
        reason: String,
    },

    /// A replay source has no observation for this workload and window.
    #[error("no recorded observation for workload {id} at window {window}")]
    MissingRecording {
        /// Affected workload.
        id: WorkloadId,
        /// Window index with no recording.
        window: u64,
    },
}

/// Kernel write failures. Logged, counted, and retried implicitly next
/// window; never fatal and never visible to policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnforcementError {
    /// Writing the quota/period pair failed.
    #[error("cannot write quota for workload {id}: {reason}")]
    WriteFailed {
        /// Affected workload.
        id: WorkloadId,
        /// Human-readable cause.
        reason: String,
    },
}

/// Decision stream failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SinkError {
    /// Appending a record failed.
    #[error("decision log append failed: {reason}")]
    Append {
        /// Human-readable cause.
        reason: String,
    },

    /// Flushing buffered records failed.
    #[error("decision log flush failed: {reason}")]
    Flush {
        /// Human-readable cause.
        reason: String,
    },
}

/// Workload registration failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegisterError {
    /// A workload with this id is already registered.
    #[error("workload {id} is already registered")]
    Duplicate {
        /// The repeated id.
        id: WorkloadId,
    },

    /// Admitting the workload would exceed host capacity.
    #[error("admitting {budget_us} us/window would raise the total to {total_us}, over capacity {capacity_us}")]
    CapacityExceeded {
        /// Budget of the rejected workload.
        budget_us: u64,
        /// Total budget including the rejected workload.
        total_us: u64,
        /// Host capacity.
        capacity_us: u64,
    },

    /// The admitted total is not representable.
    #[error("admitted budgets overflow u64 when summed")]
    BudgetSumOverflow,

    /// The initial enforcement write failed.
    ///
    /// Fatal at registration: a workload whose control knob cannot be
    /// written even once was never under governance.
    #[error("initial enforcement failed: {0}")]
    InitialEnforcement(#[from] EnforcementError),
}

/// Startup failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StartupError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A workload could not be registered.
    #[error("registering workload failed: {0}")]
    Register(#[from] RegisterError),
}

/// Tick failures. Every variant is fatal; the driver halts the process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TickError {
    /// Observation failed for some workload.
    #[error(transparent)]
    Observation(#[from] ObservationError),

    /// Policy arithmetic failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// A committed decision violated an engine guarantee.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    /// The decision stream could not be appended.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Per-tick execution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Window index this tick covered.
    pub window: u64,
    /// Decisions committed.
    pub decisions: usize,
    /// Kernel writes that failed (non-fatal).
    pub enforcement_failures: usize,
}

/// Read-only view of one workload's current standing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadStatus {
    /// Declared budget, microseconds per window.
    pub budget_us: u64,
    /// Committed policy state.
    pub state: PolicyState,
    /// Most recent committed decision, if any window has elapsed.
    pub last_record: Option<DecisionRecord>,
}

#[derive(Debug)]
struct WorkloadEntry {
    id: WorkloadId,
    budget_us: u64,
    state: PolicyState,
    last_record: Option<DecisionRecord>,
}

/// The per-window orchestrator.
///
/// Generic over its adapter seams so the same engine runs live against the
/// kernel and offline against recordings. Single-threaded by contract:
/// `tick()` takes `&mut self` and runs to completion, and the registry only
/// changes between ticks.
#[derive(Debug)]
pub struct Orchestrator<O, E, S> {
    window_us: u64,
    capacity_us: u64,
    admitted_us: u64,
    window: u64,
    registry: Vec<WorkloadEntry>,
    observer: O,
    enforcer: E,
    sink: S,
}

impl<O, E, S> Orchestrator<O, E, S>
where
    O: Observer,
    E: Enforcer,
    S: RecordSink,
{
    /// Builds an orchestrator from a validated configuration, registering
    /// every declared workload and emitting its initial enforcement
    /// (`quota = budget`).
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] when the configuration is invalid or a
    /// workload cannot be registered.
    pub fn new(
        config: &GovernorConfig,
        observer: O,
        enforcer: E,
        sink: S,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let mut orchestrator = Self {
            window_us: config.window_us,
            capacity_us: config.capacity_us,
            admitted_us: 0,
            window: 0,
            registry: Vec::with_capacity(config.workloads.len()),
            observer,
            enforcer,
            sink,
        };
        for spec in &config.workloads {
            orchestrator.register(spec)?;
        }
        Ok(orchestrator)
    }

    /// Registers a workload: admission check, initial state, initial
    /// enforcement. Only legal between ticks.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] on duplicate ids, capacity exhaustion, or a
    /// failed initial kernel write.
    pub fn register(&mut self, spec: &WorkloadSpec) -> Result<(), RegisterError> {
        if self.registry.iter().any(|e| e.id == spec.id) {
            return Err(RegisterError::Duplicate {
                id: spec.id.clone(),
            });
        }
        let total_us = self
            .admitted_us
            .checked_add(spec.budget_us)
            .ok_or(RegisterError::BudgetSumOverflow)?;
        if total_us > self.capacity_us {
            return Err(RegisterError::CapacityExceeded {
                budget_us: spec.budget_us,
                total_us,
                capacity_us: self.capacity_us,
            });
        }

        self.enforcer
            .apply(&spec.id, spec.budget_us, self.window_us)?;

        self.admitted_us = total_us;
        self.registry.push(WorkloadEntry {
            id: spec.id.clone(),
            budget_us: spec.budget_us,
            state: PolicyState::initial(spec.budget_us),
            last_record: None,
        });
        tracing::info!(
            workload = %spec.id,
            budget_us = spec.budget_us,
            admitted_us = self.admitted_us,
            capacity_us = self.capacity_us,
            "workload registered"
        );
        Ok(())
    }

    /// Removes a workload and releases its admitted budget. Only legal
    /// between ticks. Returns `false` when no such workload exists.
    pub fn deregister(&mut self, id: &WorkloadId) -> bool {
        match self.registry.iter().position(|e| &e.id == id) {
            Some(index) => {
                let entry = self.registry.remove(index);
                self.admitted_us -= entry.budget_us;
                tracing::info!(workload = %entry.id, "workload deregistered");
                true
            },
            None => false,
        }
    }

    /// Executes one window boundary.
    ///
    /// For every workload in registration order: sample the observation,
    /// evaluate policy, verify the decision, apply enforcement, commit the
    /// state, append the record. The window index advances once, after all
    /// workloads are processed.
    ///
    /// # Errors
    ///
    /// Returns [`TickError`] on observation failure, policy overflow,
    /// invariant violation, or a sink failure. Enforcement failures are not
    /// errors; they are logged and counted in the report.
    pub fn tick(&mut self) -> Result<TickReport, TickError> {
        let window = self.window;
        let mut report = TickReport {
            window,
            ..TickReport::default()
        };

        for index in 0..self.registry.len() {
            let id = self.registry[index].id.clone();
            let usage_us = self.observer.sample(&id, window)?;

            let entry = &self.registry[index];
            let out = step(entry.state, usage_us, entry.budget_us, self.window_us)?;

            let record = DecisionRecord {
                window,
                workload_id: id.clone(),
                mode_in: entry.state.mode,
                debt_in_us: entry.state.debt_us,
                usage_us,
                budget_us: entry.budget_us,
                window_us: self.window_us,
                mode_out: out.next.mode,
                debt_out_us: out.next.debt_us,
                quota_us: out.quota_us,
                rule_id: out.rule,
            };
            verify_step(&record)?;

            if let Err(err) = self.enforcer.apply(&id, out.quota_us, self.window_us) {
                tracing::warn!(
                    workload = %id,
                    window,
                    quota_us = out.quota_us,
                    error = %err,
                    "enforcement write failed; decision stands, re-applied next window"
                );
                report.enforcement_failures += 1;
            }

            let entry = &mut self.registry[index];
            entry.state = out.next;
            self.sink.append(&record)?;
            entry.last_record = Some(record);
            report.decisions += 1;
        }

        self.window += 1;
        Ok(report)
    }

    /// Flushes the decision stream.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when buffered records cannot be written out.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.sink.flush()
    }

    /// Current window index (the next tick covers this window).
    #[must_use]
    pub fn window(&self) -> u64 {
        self.window
    }

    /// The process-wide window size, microseconds.
    #[must_use]
    pub fn window_us(&self) -> u64 {
        self.window_us
    }

    /// Registered workload ids, in registration order.
    #[must_use]
    pub fn workload_ids(&self) -> Vec<WorkloadId> {
        self.registry.iter().map(|e| e.id.clone()).collect()
    }

    /// Current standing of a workload, if registered.
    #[must_use]
    pub fn status(&self, id: &WorkloadId) -> Option<WorkloadStatus> {
        self.registry.iter().find(|e| &e.id == id).map(|e| WorkloadStatus {
            budget_us: e.budget_us,
            state: e.state,
            last_record: e.last_record.clone(),
        })
    }

    /// Consumes the orchestrator, handing back the adapters. Used at
    /// shutdown so the caller can restore kernel state through the enforcer
    /// it originally supplied.
    #[must_use]
    pub fn into_parts(self) -> (O, E, S) {
        (self.observer, self.enforcer, self.sink)
    }
}

//! Deterministic windowed CPU policy engine.
//!
//! `rgov-core` is the pure heart of the rgov governor: a per-workload policy
//! state machine driven at window boundaries, the orchestration contract
//! around it, and the replay harness that proves the whole thing
//! deterministic from recorded facts alone.
//!
//! The crate performs no I/O, reads no clocks, and spawns no threads. Kernel
//! observation and enforcement live behind the [`orchestrator::Observer`]
//! and [`orchestrator::Enforcer`] seams; the daemon crate supplies
//! cgroup-backed implementations, the replay harness supplies recorded ones,
//! and policy cannot tell the difference.
//!
//! # Decision flow per window
//!
//! ```text
//! Observer::sample ──> policy::step ──> invariants::verify_step
//!                                            │
//!                      Enforcer::apply <─────┤
//!                      commit state          │
//!                      RecordSink::append <──┘
//! ```
//!
//! Everything a decision saw and produced lands in a
//! [`record::DecisionRecord`]; the stream of those records is sufficient to
//! reproduce the run byte for byte.

pub mod config;
pub mod invariants;
pub mod orchestrator;
pub mod policy;
pub mod record;
pub mod replay;
pub mod sequence;
pub mod workload;

pub use config::{ConfigError, GovernorConfig, DEFAULT_WINDOW_US};
pub use invariants::{verify_step, InvariantViolation};
pub use orchestrator::{
    Enforcer, EnforcementError, ObservationError, Observer, Orchestrator, RecordSink,
    RegisterError, SinkError, StartupError, TickError, TickReport, WorkloadStatus,
};
pub use policy::{step, Mode, PolicyError, PolicyState, RuleId, StepOutput};
pub use record::{DecisionRecord, RecordError};
pub use replay::{
    parse_log, run_replay, verify_determinism, verify_replay, EnforcementCall, MemoryEnforcer,
    MemorySink, ReplayError, ReplayOutcome, ReplaySource,
};
pub use workload::{WorkloadId, WorkloadIdError, WorkloadSpec};

//! Offline replay of recorded decision streams.
//!
//! The replay harness is the proof that the engine is deterministic: it
//! drives the real orchestrator from a recorded sequence of observations,
//! with no kernel and no clock anywhere in the loop, and demands that the
//! reconstructed decision stream is byte-identical to the recorded one.
//! Divergence is never tolerated and never explained away; it means the
//! engine, the recording, or the configuration is wrong, and each of those
//! is a failure.
//!
//! The pieces: [`ReplaySource`] plays back recorded usage numbers through
//! the ordinary [`Observer`] seam, [`MemoryEnforcer`] captures quota writes
//! instead of touching a kernel, and [`MemorySink`] collects the produced
//! records. The orchestrator cannot tell replay from live operation.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::GovernorConfig;
use crate::orchestrator::{
    Enforcer, EnforcementError, ObservationError, Observer, Orchestrator, RecordSink, SinkError,
    StartupError, TickError,
};
use crate::record::{DecisionRecord, RecordError};
use crate::workload::WorkloadId;

/// Replay failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplayError {
    /// A recorded line did not decode.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The recording skips a window for some workload.
    #[error("recording for workload {id} jumps from window {expected} to {found}")]
    GapInRecording {
        /// Affected workload.
        id: WorkloadId,
        /// Window the recording should contain next.
        expected: u64,
        /// Window actually found.
        found: u64,
    },

    /// A workload's recording is shorter than the run.
    #[error("recording for workload {id} covers {covered} of {expected} windows")]
    ShortRecording {
        /// Affected workload.
        id: WorkloadId,
        /// Windows covered by the recording.
        covered: u64,
        /// Windows the run requires.
        expected: u64,
    },

    /// The orchestrator could not be constructed.
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// A replayed tick failed.
    #[error(transparent)]
    Tick(#[from] TickError),

    /// The reconstructed stream differs from the recording.
    #[error("replay diverged at record {index}: recorded {recorded}, replayed {replayed}")]
    Divergence {
        /// Zero-based record index of the first difference.
        index: usize,
        /// The recorded line.
        recorded: String,
        /// The reconstructed line.
        replayed: String,
    },

    /// The streams have different lengths.
    #[error("replay produced {replayed} records, recording holds {recorded}")]
    LengthMismatch {
        /// Records in the recording.
        recorded: usize,
        /// Records produced by replay.
        replayed: usize,
    },
}

/// Recorded per-workload observation sequences, indexed by window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySource {
    observations: HashMap<WorkloadId, Vec<u64>>,
    windows: u64,
}

impl ReplaySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a workload's observation sequence, one value per window starting
    /// at window 0. The run length becomes the longest sequence supplied.
    pub fn insert(&mut self, id: WorkloadId, usage_us: Vec<u64>) {
        self.windows = self.windows.max(usage_us.len() as u64);
        self.observations.insert(id, usage_us);
    }

    /// Builds a source from a recorded decision stream, using only the
    /// inputs (`workload_id`, `w`, `U_w`).
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::GapInRecording`] when a workload's windows are
    /// not contiguous from zero, or [`ReplayError::ShortRecording`] when one
    /// workload's recording ends before another's.
    pub fn from_records(records: &[DecisionRecord]) -> Result<Self, ReplayError> {
        let mut source = Self::new();
        for record in records {
            let seq = source
                .observations
                .entry(record.workload_id.clone())
                .or_default();
            let expected = seq.len() as u64;
            if record.window != expected {
                return Err(ReplayError::GapInRecording {
                    id: record.workload_id.clone(),
                    expected,
                    found: record.window,
                });
            }
            seq.push(record.usage_us);
        }
        source.windows = source
            .observations
            .values()
            .map(|seq| seq.len() as u64)
            .max()
            .unwrap_or(0);
        for (id, seq) in &source.observations {
            if (seq.len() as u64) < source.windows {
                return Err(ReplayError::ShortRecording {
                    id: id.clone(),
                    covered: seq.len() as u64,
                    expected: source.windows,
                });
            }
        }
        Ok(source)
    }

    /// Number of windows the source covers.
    #[must_use]
    pub fn windows(&self) -> u64 {
        self.windows
    }
}

impl Observer for ReplaySource {
    fn sample(&mut self, id: &WorkloadId, window: u64) -> Result<u64, ObservationError> {
        self.observations
            .get(id)
            .and_then(|seq| seq.get(window as usize))
            .copied()
            .ok_or_else(|| ObservationError::MissingRecording {
                id: id.clone(),
                window,
            })
    }
}

/// One captured enforcement write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementCall {
    /// Target workload.
    pub id: WorkloadId,
    /// Applied quota, microseconds.
    pub quota_us: u64,
    /// Applied period, microseconds.
    pub window_us: u64,
}

/// Enforcer that records every write in memory. Infallible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEnforcer {
    /// Writes in application order, including the startup writes.
    pub applied: Vec<EnforcementCall>,
}

impl Enforcer for MemoryEnforcer {
    fn apply(
        &mut self,
        id: &WorkloadId,
        quota_us: u64,
        window_us: u64,
    ) -> Result<(), EnforcementError> {
        self.applied.push(EnforcementCall {
            id: id.clone(),
            quota_us,
            window_us,
        });
        Ok(())
    }
}

/// Sink that collects records in memory. Infallible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    /// Records in commit order.
    pub records: Vec<DecisionRecord>,
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &DecisionRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Everything a replay run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Reconstructed decision stream, in commit order.
    pub records: Vec<DecisionRecord>,
    /// Captured enforcement writes, startup writes first.
    pub applied: Vec<EnforcementCall>,
}

impl ReplayOutcome {
    /// The outcome as canonical log lines.
    #[must_use]
    pub fn canonical_lines(&self) -> Vec<String> {
        self.records.iter().map(DecisionRecord::canonical_line).collect()
    }
}

/// Replays a recorded observation source through a freshly constructed
/// orchestrator, one tick per recorded window.
///
/// # Errors
///
/// Returns [`ReplayError`] when the orchestrator cannot start or a tick
/// fails. A missing observation surfaces as a tick-level observation error.
pub fn run_replay(
    config: &GovernorConfig,
    source: ReplaySource,
) -> Result<ReplayOutcome, ReplayError> {
    let windows = source.windows();
    let mut orchestrator =
        Orchestrator::new(config, source, MemoryEnforcer::default(), MemorySink::default())?;
    for _ in 0..windows {
        orchestrator.tick()?;
    }
    let (_, enforcer, sink) = orchestrator.into_parts();
    Ok(ReplayOutcome {
        records: sink.records,
        applied: enforcer.applied,
    })
}

/// Parses a recorded decision stream, one canonical line per record. Blank
/// lines are not tolerated; the stream is machine-written.
///
/// # Errors
///
/// Returns [`ReplayError::Record`] on the first malformed line.
pub fn parse_log(log: &str) -> Result<Vec<DecisionRecord>, ReplayError> {
    log.lines()
        .enumerate()
        .map(|(index, line)| DecisionRecord::from_line(line, index + 1).map_err(ReplayError::from))
        .collect()
}

/// Replays a recorded decision stream and verifies that the reconstruction
/// is byte-identical to the recording.
///
/// # Errors
///
/// Returns [`ReplayError::Divergence`] at the first differing record,
/// [`ReplayError::LengthMismatch`] when the streams disagree in length, or
/// any error of [`run_replay`].
pub fn verify_replay(config: &GovernorConfig, log: &str) -> Result<ReplayOutcome, ReplayError> {
    let records = parse_log(log)?;
    let source = ReplaySource::from_records(&records)?;
    let outcome = run_replay(config, source)?;

    if outcome.records.len() != records.len() {
        return Err(ReplayError::LengthMismatch {
            recorded: records.len(),
            replayed: outcome.records.len(),
        });
    }
    for (index, (recorded, replayed)) in records.iter().zip(&outcome.records).enumerate() {
        let recorded_line = recorded.canonical_line();
        let replayed_line = replayed.canonical_line();
        if recorded_line != replayed_line {
            return Err(ReplayError::Divergence {
                index,
                recorded: recorded_line,
                replayed: replayed_line,
            });
        }
    }
    Ok(outcome)
}

/// Runs the same replay twice and verifies the two outcomes are
/// byte-identical. A self-check on the engine's determinism claim.
///
/// # Errors
///
/// Returns [`ReplayError::Divergence`] or [`ReplayError::LengthMismatch`]
/// when the runs differ, or any error of [`run_replay`].
pub fn verify_determinism(
    config: &GovernorConfig,
    source: &ReplaySource,
) -> Result<ReplayOutcome, ReplayError> {
    let first = run_replay(config, source.clone())?;
    let second = run_replay(config, source.clone())?;

    if first.records.len() != second.records.len() {
        return Err(ReplayError::LengthMismatch {
            recorded: first.records.len(),
            replayed: second.records.len(),
        });
    }
    for (index, (a, b)) in first.records.iter().zip(&second.records).enumerate() {
        let line_a = a.canonical_line();
        let line_b = b.canonical_line();
        if line_a != line_b {
            return Err(ReplayError::Divergence {
                index,
                recorded: line_a,
                replayed: line_b,
            });
        }
    }
    Ok(first)
}

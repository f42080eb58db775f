//! Derived-check engine: pure functions over already-observed data.
//!
//! Three independent algorithms, none of which perform I/O:
//! backoff verification against a declared retry policy, tolerance
//! evaluation for Map/batch states, and branch aggregation for
//! Parallel states.

use crate::error::AssertionFailure;
use serde::{Deserialize, Serialize};
use stateprobe_protocol::{AttemptRecord, ExecutionOutcome, OutcomeStatus, StateError};

/// Tolerance for comparing observed delays, which arrive as floats.
const DELAY_EPSILON: f64 = 1e-6;

// ── Retry / backoff ─────────────────────────────────────────────────

/// A declared retry policy, mirroring the state definition. Supplied
/// by the caller to validate observed behavior, not derived from the
/// oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySpec {
    /// Retries after the initial attempt; total attempts may reach
    /// `max_attempts + 1`.
    pub max_attempts: u32,
    /// Base delay before the first retry. Must be positive.
    pub interval_seconds: f64,
    /// Multiplier applied per retry. Must be at least 1.
    pub backoff_rate: f64,
    /// Upper clamp on any single delay; `None` means unbounded.
    pub max_delay_seconds: Option<f64>,
}

impl RetrySpec {
    /// Expected delay before attempt `n + 1`:
    /// `interval_seconds * backoff_rate^n`, clamped to `max_delay_seconds`.
    pub fn expected_delay(&self, attempt: u32) -> f64 {
        let delay = self.interval_seconds * self.backoff_rate.powi(attempt as i32);
        match self.max_delay_seconds {
            Some(max) if delay > max => max,
            _ => delay,
        }
    }
}

/// Verify an observed attempt sequence against a declared retry policy.
///
/// Checks that the attempt count does not exceed `max_attempts + 1`
/// (the initial try plus retries) and that every observed delay matches
/// the declared schedule. The first disagreement is reported with its
/// attempt index and expected-vs-observed delay.
pub fn verify_backoff(
    state_id: &str,
    spec: &RetrySpec,
    attempts: &[AttemptRecord],
) -> Result<(), AssertionFailure> {
    let allowed = spec.max_attempts.saturating_add(1);
    if attempts.len() > allowed as usize {
        return Err(AssertionFailure::RetryAttemptsExceeded {
            state_id: state_id.to_string(),
            observed: attempts.len(),
            allowed,
        });
    }

    for record in attempts {
        let Some(observed) = record.delay_seconds else {
            continue;
        };
        let expected = spec.expected_delay(record.index);
        if (observed - expected).abs() > DELAY_EPSILON {
            return Err(AssertionFailure::BackoffMismatch {
                state_id: state_id.to_string(),
                attempt: record.index,
                expected,
                observed,
            });
        }
    }

    Ok(())
}

// ── Tolerance ───────────────────────────────────────────────────────

/// How a Map state's failure tolerance is declared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ToleranceThreshold {
    /// At most this many item failures are tolerated.
    AbsoluteCount(u64),
    /// At most this percentage of items (0–100) may fail, rounded up.
    Percentage(f64),
}

/// Declared tolerance plus the observed item accounting for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSpec {
    pub total_items: u64,
    pub failed_items: u64,
    pub threshold: ToleranceThreshold,
}

/// Result of evaluating a [`ToleranceSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceVerdict {
    /// Whether the batch counts as overall-succeeded.
    pub tolerated: bool,
    pub effective_threshold: u64,
}

/// Decide whether a batch execution is tolerated despite partial item
/// failure. An empty batch is always tolerated.
pub fn evaluate_tolerance(spec: &ToleranceSpec) -> ToleranceVerdict {
    let effective_threshold = match spec.threshold {
        ToleranceThreshold::AbsoluteCount(count) => count,
        // Multiply before dividing so whole-number thresholds stay exact.
        ToleranceThreshold::Percentage(pct) => {
            (pct * spec.total_items as f64 / 100.0).ceil() as u64
        }
    };

    let tolerated = spec.total_items == 0 || spec.failed_items <= effective_threshold;

    ToleranceVerdict {
        tolerated,
        effective_threshold,
    }
}

// ── Branch aggregation ──────────────────────────────────────────────

/// Aggregate view over the ordered branch outcomes of a Parallel state.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchAggregate {
    /// FAILED if any branch failed or timed out, else SUCCEEDED.
    pub status: OutcomeStatus,
    /// Error of the first failing branch in declaration order, if any.
    pub error: Option<StateError>,
    /// Indices of all failing branches, in declaration order.
    pub failing_indices: Vec<usize>,
}

fn branch_failed(outcome: &ExecutionOutcome) -> bool {
    matches!(
        outcome.status,
        OutcomeStatus::Failed | OutcomeStatus::TimedOut
    )
}

/// Aggregate branch outcomes in declaration order. Ties between failing
/// branches break toward the leftmost index.
pub fn aggregate_branches(branches: &[ExecutionOutcome]) -> BranchAggregate {
    let failing_indices: Vec<usize> = branches
        .iter()
        .enumerate()
        .filter(|(_, outcome)| branch_failed(outcome))
        .map(|(index, _)| index)
        .collect();

    let error = failing_indices
        .first()
        .and_then(|&index| branches[index].error.clone());

    let status = if failing_indices.is_empty() {
        OutcomeStatus::Succeeded
    } else {
        OutcomeStatus::Failed
    };

    BranchAggregate {
        status,
        error,
        failing_indices,
    }
}

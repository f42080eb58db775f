//! Error taxonomy for the harness.
//!
//! Three tiers, with distinct propagation rules:
//! - [`HarnessError::Configuration`] — malformed test-case setup;
//!   surfaced immediately, never retried.
//! - [`HarnessError::Connectivity`] — the oracle could not be reached
//!   or refused authorization; fatal to the test, because it signals an
//!   environment problem rather than a property of the state under test.
//! - [`AssertionFailure`] — an assertion disagreed with the stored
//!   outcome or a derived check. Always surfaced to the outer test
//!   process, never swallowed.
//!
//! A FAILED or CAUGHT outcome from the oracle is *not* an error — it is
//! inspectable data until an assertion declares a conflicting
//! expectation.

/// All errors that can be returned by harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Malformed test-case setup: unknown state id, post-execution
    /// mutation, malformed workflow document.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The invoker could not reach the oracle, or the oracle rejected
    /// the call before evaluating the state.
    #[error("cannot reach execution oracle: {message}")]
    Connectivity { message: String },

    /// An assertion disagreed with the observed outcome.
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
}

impl HarnessError {
    pub fn configuration(message: impl Into<String>) -> Self {
        HarnessError::Configuration {
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        HarnessError::Connectivity {
            message: message.into(),
        }
    }
}

/// A failed expectation over a stored outcome or derived check.
///
/// Every variant names the state under test, the expected condition,
/// and the observed value, so chained failures are diagnosable without
/// re-running the scenario.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssertionFailure {
    /// Generic expected-vs-actual mismatch.
    #[error("state '{state_id}': expected {expected}, got {actual}")]
    Expectation {
        state_id: String,
        expected: String,
        actual: String,
    },

    /// An observed backoff delay disagrees with the declared retry policy.
    #[error(
        "state '{state_id}': attempt index {attempt} expected delay {expected}s, observed {observed}s"
    )]
    BackoffMismatch {
        state_id: String,
        attempt: u32,
        expected: f64,
        observed: f64,
    },

    /// More attempts were observed than the retry policy allows.
    #[error(
        "state '{state_id}': observed {observed} attempts, retry policy allows at most {allowed}"
    )]
    RetryAttemptsExceeded {
        state_id: String,
        observed: usize,
        allowed: u32,
    },

    /// Item failures exceeded the declared tolerance threshold.
    #[error(
        "state '{state_id}': {failed_items} of {total_items} items failed, tolerance allows {effective_threshold}"
    )]
    ToleranceViolation {
        state_id: String,
        total_items: u64,
        failed_items: u64,
        effective_threshold: u64,
    },

    /// Branch outcomes did not satisfy the declared expectation.
    #[error("state '{state_id}': branch aggregation mismatch: expected {expected}, got {actual}")]
    BranchAggregationMismatch {
        state_id: String,
        expected: String,
        actual: String,
    },
}

impl AssertionFailure {
    pub fn expectation(
        state_id: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        AssertionFailure::Expectation {
            state_id: state_id.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

//! The fluent test runner: accumulates test-case state, triggers one
//! single-state execution, and exposes the chainable assertion surface.
//!
//! Configuration methods consume and return the runner inside a
//! `Result`, so chains compose with `?`. Once `execute` has run, the
//! test case is frozen: any further configuration is a usage error.
//! Assertions borrow the stored outcome, never mutate it, and always
//! report the same verdict on repeated calls.
//!
//! ```rust,ignore
//! let runner = TestRunner::new(ctx)
//!     .with_input(json!({"orderId": "o-1", "amount": 100}))?
//!     .with_mock_result("ValidateOrder", json!({"isValid": true}))?
//!     .execute("ValidateOrder")?;
//! runner.assert_succeeded()?.assert_next_state("CheckValidation")?;
//! ```

use crate::checks::{
    aggregate_branches, evaluate_tolerance, verify_backoff, BranchAggregate, RetrySpec,
    ToleranceSpec,
};
use crate::error::{AssertionFailure, HarnessError};
use crate::invoker::OracleInvoker;
use crate::mock::{MockBinding, MockError, MockRegistry};
use crate::workflow::WorkflowDefinition;
use serde_json::Value;
use stateprobe_protocol::{normalize, ExecutionOutcome, OracleRequest, OutcomeStatus};
use std::collections::BTreeMap;
use std::sync::Arc;

// ── ExecutionContext ────────────────────────────────────────────────

/// Explicit execution context handed to each runner at construction:
/// the invoker plus the workflow definition. No ambient singletons —
/// one context can be cloned across many independent test cases.
#[derive(Clone)]
pub struct ExecutionContext {
    invoker: Arc<dyn OracleInvoker>,
    workflow: WorkflowDefinition,
}

impl ExecutionContext {
    pub fn new(invoker: Arc<dyn OracleInvoker>, workflow: WorkflowDefinition) -> Self {
        ExecutionContext { invoker, workflow }
    }

    pub fn workflow(&self) -> &WorkflowDefinition {
        &self.workflow
    }
}

// ── TestRunner ──────────────────────────────────────────────────────

/// One test case: input, context overrides, mock bindings, and — after
/// `execute` — the stored [`ExecutionOutcome`] for assertion chaining.
pub struct TestRunner {
    ctx: ExecutionContext,
    input: Option<Value>,
    context_overrides: BTreeMap<String, Value>,
    mocks: MockRegistry,
    state_under_test: Option<String>,
    outcome: Option<ExecutionOutcome>,
    frozen: bool,
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("input", &self.input)
            .field("context_overrides", &self.context_overrides)
            .field("mocks", &self.mocks)
            .field("state_under_test", &self.state_under_test)
            .field("outcome", &self.outcome)
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}

impl TestRunner {
    pub fn new(ctx: ExecutionContext) -> Self {
        TestRunner {
            ctx,
            input: None,
            context_overrides: BTreeMap::new(),
            mocks: MockRegistry::new(),
            state_under_test: None,
            outcome: None,
            frozen: false,
        }
    }

    fn ensure_mutable(&self, call: &str) -> Result<(), HarnessError> {
        if self.frozen {
            return Err(HarnessError::configuration(format!(
                "{} called after execute(); configuration is frozen once the test case has run",
                call
            )));
        }
        Ok(())
    }

    // ── Configuration ───────────────────────────────────────────────

    /// Set the input document for the state under test.
    pub fn with_input(mut self, document: Value) -> Result<Self, HarnessError> {
        self.ensure_mutable("with_input")?;
        self.input = Some(document);
        Ok(self)
    }

    /// Merge context overrides into the test case; later keys win.
    pub fn with_context(
        mut self,
        overrides: BTreeMap<String, Value>,
    ) -> Result<Self, HarnessError> {
        self.ensure_mutable("with_context")?;
        self.context_overrides.extend(overrides);
        Ok(self)
    }

    /// Substitute a success result for a step. Rebinding overwrites.
    pub fn with_mock_result(
        mut self,
        step_id: impl Into<String>,
        result: Value,
    ) -> Result<Self, HarnessError> {
        self.ensure_mutable("with_mock_result")?;
        self.mocks.bind(step_id, MockBinding::Result(result));
        Ok(self)
    }

    /// Substitute an error for a step. Rebinding overwrites.
    pub fn with_mock_error(
        mut self,
        step_id: impl Into<String>,
        error: MockError,
    ) -> Result<Self, HarnessError> {
        self.ensure_mutable("with_mock_error")?;
        self.mocks.bind(step_id, MockBinding::Error(error));
        Ok(self)
    }

    /// Drop all mock bindings and context overrides.
    pub fn clear_mocks(mut self) -> Result<Self, HarnessError> {
        self.ensure_mutable("clear_mocks")?;
        self.mocks.clear();
        self.context_overrides.clear();
        Ok(self)
    }

    // ── Execution ───────────────────────────────────────────────────

    /// Execute the state under test against the oracle and store the
    /// normalized outcome. Unknown state ids fail here, before any I/O.
    pub fn execute(mut self, state_id: &str) -> Result<Self, HarnessError> {
        if self.frozen {
            return Err(HarnessError::configuration(
                "execute() was already called for this test case",
            ));
        }

        let definition = self.ctx.workflow.state(state_id).cloned().ok_or_else(|| {
            let known: Vec<&str> = self.ctx.workflow.state_ids().collect();
            HarnessError::configuration(format!(
                "unknown state '{}' in workflow '{}' (known states: {})",
                state_id,
                self.ctx.workflow.reference(),
                known.join(", ")
            ))
        })?;

        let request = OracleRequest {
            workflow_definition_ref: self.ctx.workflow.reference().to_string(),
            state_id: state_id.to_string(),
            state_definition: definition,
            input_document: self
                .input
                .clone()
                .unwrap_or(Value::Object(serde_json::Map::new())),
            context_overrides: self.context_overrides.clone(),
            mock_bindings: self.mocks.to_substitutions(),
        };

        let raw = self.ctx.invoker.invoke(&request)?;

        let mut outcome = normalize(&raw);
        outcome.trace.sent_request = serde_json::to_value(&request).ok();
        outcome.trace.received_at = now_rfc3339();

        self.state_under_test = Some(state_id.to_string());
        self.outcome = Some(outcome);
        self.frozen = true;
        Ok(self)
    }

    // ── Inspection ──────────────────────────────────────────────────

    /// The stored outcome, if `execute` has run.
    pub fn outcome(&self) -> Option<&ExecutionOutcome> {
        self.outcome.as_ref()
    }

    /// The stored output document, if the outcome carries one. Lets a
    /// caller feed one state's output into the next scenario.
    pub fn output(&self) -> Option<&Value> {
        self.outcome.as_ref()?.output_document.as_ref()
    }

    /// Aggregate view over the stored branch outcomes.
    pub fn branch_aggregate(&self) -> Result<BranchAggregate, HarnessError> {
        let (_, outcome) = self.stored()?;
        Ok(aggregate_branches(&outcome.trace.branches))
    }

    fn stored(&self) -> Result<(&str, &ExecutionOutcome), HarnessError> {
        match (&self.state_under_test, &self.outcome) {
            (Some(state_id), Some(outcome)) => Ok((state_id.as_str(), outcome)),
            _ => Err(HarnessError::configuration(
                "assertion called before execute()",
            )),
        }
    }

    // ── Assertions ──────────────────────────────────────────────────

    /// Assert that the stored outcome has the given status.
    pub fn assert_status(&self, expected: OutcomeStatus) -> Result<&Self, HarnessError> {
        let (state_id, outcome) = self.stored()?;
        if outcome.status != expected {
            let actual = match &outcome.error {
                Some(error) => format!("{} with error {}", outcome.status, error),
                None => outcome.status.to_string(),
            };
            return Err(AssertionFailure::expectation(
                state_id,
                format!("status {}", expected),
                actual,
            )
            .into());
        }
        Ok(self)
    }

    pub fn assert_succeeded(&self) -> Result<&Self, HarnessError> {
        self.assert_status(OutcomeStatus::Succeeded)
    }

    pub fn assert_failed(&self) -> Result<&Self, HarnessError> {
        self.assert_status(OutcomeStatus::Failed)
    }

    pub fn assert_caught(&self) -> Result<&Self, HarnessError> {
        self.assert_status(OutcomeStatus::Caught)
    }

    pub fn assert_timed_out(&self) -> Result<&Self, HarnessError> {
        self.assert_status(OutcomeStatus::TimedOut)
    }

    /// Assert the transition target reported by the oracle.
    pub fn assert_next_state(&self, expected: &str) -> Result<&Self, HarnessError> {
        let (state_id, outcome) = self.stored()?;
        if outcome.next_state.as_deref() != Some(expected) {
            return Err(AssertionFailure::expectation(
                state_id,
                format!("next state '{}'", expected),
                describe_next_state(outcome),
            )
            .into());
        }
        Ok(self)
    }

    /// Assert that the state is terminal (no transition reported).
    pub fn assert_no_next_state(&self) -> Result<&Self, HarnessError> {
        let (state_id, outcome) = self.stored()?;
        if outcome.next_state.is_some() {
            return Err(AssertionFailure::expectation(
                state_id,
                "no next state".to_string(),
                describe_next_state(outcome),
            )
            .into());
        }
        Ok(self)
    }

    /// Assert structural equality of the output document.
    pub fn assert_output_equals(&self, expected: &Value) -> Result<&Self, HarnessError> {
        let (state_id, outcome) = self.stored()?;
        match &outcome.output_document {
            Some(output) if output == expected => Ok(self),
            Some(output) => Err(AssertionFailure::expectation(
                state_id,
                format!("output {}", expected),
                output.to_string(),
            )
            .into()),
            None => Err(AssertionFailure::expectation(
                state_id,
                format!("output {}", expected),
                "no output document".to_string(),
            )
            .into()),
        }
    }

    /// Assert that the output document satisfies a predicate.
    pub fn assert_output_matches<F>(&self, predicate: F) -> Result<&Self, HarnessError>
    where
        F: FnOnce(&Value) -> bool,
    {
        let (state_id, outcome) = self.stored()?;
        match &outcome.output_document {
            Some(output) if predicate(output) => Ok(self),
            Some(output) => Err(AssertionFailure::expectation(
                state_id,
                "output matching predicate".to_string(),
                output.to_string(),
            )
            .into()),
            None => Err(AssertionFailure::expectation(
                state_id,
                "output matching predicate".to_string(),
                "no output document".to_string(),
            )
            .into()),
        }
    }

    /// Assert the reported error name.
    pub fn assert_error_name_equals(&self, expected: &str) -> Result<&Self, HarnessError> {
        let (state_id, outcome) = self.stored()?;
        match &outcome.error {
            Some(error) if error.name == expected => Ok(self),
            Some(error) => Err(AssertionFailure::expectation(
                state_id,
                format!("error name '{}'", expected),
                format!("'{}'", error.name),
            )
            .into()),
            None => Err(AssertionFailure::expectation(
                state_id,
                format!("error name '{}'", expected),
                "no error".to_string(),
            )
            .into()),
        }
    }

    /// Assert the reported error cause.
    pub fn assert_error_cause_equals(&self, expected: &str) -> Result<&Self, HarnessError> {
        let (state_id, outcome) = self.stored()?;
        match &outcome.error {
            Some(error) if error.cause == expected => Ok(self),
            Some(error) => Err(AssertionFailure::expectation(
                state_id,
                format!("error cause '{}'", expected),
                format!("'{}'", error.cause),
            )
            .into()),
            None => Err(AssertionFailure::expectation(
                state_id,
                format!("error cause '{}'", expected),
                "no error".to_string(),
            )
            .into()),
        }
    }

    /// Verify the observed attempt sequence against a declared retry
    /// policy (delay schedule and attempt budget).
    pub fn assert_retry_policy(&self, spec: &RetrySpec) -> Result<&Self, HarnessError> {
        if spec.interval_seconds <= 0.0 {
            return Err(HarnessError::configuration(
                "retry spec interval_seconds must be positive",
            ));
        }
        if spec.backoff_rate < 1.0 {
            return Err(HarnessError::configuration(
                "retry spec backoff_rate must be at least 1",
            ));
        }
        let (state_id, outcome) = self.stored()?;
        verify_backoff(state_id, spec, &outcome.trace.attempts)?;
        Ok(self)
    }

    /// Assert that the stored outcome agrees with the tolerance verdict
    /// for the declared item accounting: tolerated batches must have
    /// succeeded, exceeded batches must not have. If the trace reports
    /// item counts, they must match the declared counts.
    pub fn assert_tolerance(&self, spec: &ToleranceSpec) -> Result<&Self, HarnessError> {
        let (state_id, outcome) = self.stored()?;

        if let Some(counts) = outcome.trace.item_counts {
            if counts.total_items != spec.total_items || counts.failed_items != spec.failed_items {
                return Err(AssertionFailure::expectation(
                    state_id,
                    format!(
                        "{} of {} items failed",
                        spec.failed_items, spec.total_items
                    ),
                    format!(
                        "trace reports {} of {} items failed",
                        counts.failed_items, counts.total_items
                    ),
                )
                .into());
            }
        }

        let verdict = evaluate_tolerance(spec);
        let succeeded = outcome.status == OutcomeStatus::Succeeded;

        if verdict.tolerated && !succeeded {
            return Err(AssertionFailure::expectation(
                state_id,
                format!(
                    "status SUCCEEDED ({} of {} failures within tolerance {})",
                    spec.failed_items, spec.total_items, verdict.effective_threshold
                ),
                outcome.status.to_string(),
            )
            .into());
        }
        if !verdict.tolerated && succeeded {
            return Err(AssertionFailure::ToleranceViolation {
                state_id: state_id.to_string(),
                total_items: spec.total_items,
                failed_items: spec.failed_items,
                effective_threshold: verdict.effective_threshold,
            }
            .into());
        }
        Ok(self)
    }

    /// Assert that the stored branch outcomes (declaration order)
    /// satisfy a predicate.
    pub fn assert_branches<F>(&self, predicate: F) -> Result<&Self, HarnessError>
    where
        F: FnOnce(&[ExecutionOutcome]) -> bool,
    {
        let (state_id, outcome) = self.stored()?;
        let branches = &outcome.trace.branches;
        if !predicate(branches) {
            let aggregate = aggregate_branches(branches);
            return Err(AssertionFailure::BranchAggregationMismatch {
                state_id: state_id.to_string(),
                expected: "branch outcomes satisfying predicate".to_string(),
                actual: format!(
                    "{} branches, aggregate {}, failing indices {:?}",
                    branches.len(),
                    aggregate.status,
                    aggregate.failing_indices
                ),
            }
            .into());
        }
        Ok(self)
    }
}

fn describe_next_state(outcome: &ExecutionOutcome) -> String {
    match &outcome.next_state {
        Some(next) => format!("next state '{}'", next),
        None => "no next state".to_string(),
    }
}

fn now_rfc3339() -> Option<String> {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .ok()
}

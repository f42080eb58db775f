//! stateprobe-harness: fluent single-state test harness for workflow
//! state machines.
//!
//! Exercises one state of a declarative workflow in isolation against
//! an external single-state execution service (the "oracle"): configure
//! a [`TestRunner`] with an input document, context overrides, and
//! substituted step results, trigger `execute`, then chain assertions
//! over the normalized [`ExecutionOutcome`](stateprobe_protocol::ExecutionOutcome).
//!
//! Derived checks in [`checks`] validate retry/backoff arithmetic,
//! Map-state failure tolerance, and Parallel-state branch aggregation
//! against already-observed data, without further I/O.
//!
//! Each test case is synchronous and owns its data exclusively;
//! distinct runners are fully independent and may run concurrently
//! under an outer test process.

pub mod checks;
pub mod error;
pub mod invoker;
pub mod mock;
pub mod runner;
pub mod workflow;

pub use checks::{
    aggregate_branches, evaluate_tolerance, verify_backoff, BranchAggregate, RetrySpec,
    ToleranceSpec, ToleranceThreshold, ToleranceVerdict,
};
pub use error::{AssertionFailure, HarnessError};
pub use invoker::{HttpOracleInvoker, OracleInvoker};
pub use mock::{MockBinding, MockError, MockRegistry, MockResolution};
pub use runner::{ExecutionContext, TestRunner};
pub use workflow::WorkflowDefinition;

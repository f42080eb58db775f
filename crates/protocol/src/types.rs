//! Typed structs for the oracle wire protocol.
//!
//! The request side is fully typed — the harness constructs it and owns
//! every field. The response side is decoded tolerantly by
//! [`normalize`](crate::normalize::normalize) instead of strict serde
//! deserialization, because the oracle's response shape is loosely typed
//! JSON and an unrecognized status must degrade to a FAILED outcome
//! rather than a decode error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ── Request ─────────────────────────────────────────────────────────

/// A single-state test request, as posted to the oracle.
///
/// Carries the opaque workflow reference plus the one state definition
/// under test — the oracle never sees the rest of the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    /// Opaque identifier of the workflow the state belongs to.
    pub workflow_definition_ref: String,
    /// Identifier of the state under test.
    pub state_id: String,
    /// The state's declared definition, fed through uninterpreted.
    pub state_definition: Value,
    /// Input document handed to the state.
    pub input_document: Value,
    /// Context fields overriding the oracle's default execution context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context_overrides: BTreeMap<String, Value>,
    /// Substituted results for side-effecting steps. An absent step id
    /// means the oracle decides whether to invoke the live step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mock_bindings: Vec<StepSubstitution>,
}

/// One substituted step result or error inside an [`OracleRequest`].
///
/// Exactly one of `result` / `error_output` is set; the harness-side
/// registry guarantees this by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSubstitution {
    pub step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_output: Option<SubstitutedError>,
}

/// Failure descriptor for a substituted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutedError {
    pub name: String,
    pub cause: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Closed set of outcome statuses recognized at the wire boundary.
///
/// Anything else the oracle reports is mapped to `Failed` with an
/// unrecognized-status error by the normalizer, never surfaced raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    Caught,
    TimedOut,
}

impl OutcomeStatus {
    /// The wire spelling of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Succeeded => "SUCCEEDED",
            OutcomeStatus::Failed => "FAILED",
            OutcomeStatus::Caught => "CAUGHT",
            OutcomeStatus::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A modeled business error reported by the oracle (FAILED or CAUGHT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateError {
    pub name: String,
    pub cause: String,
}

impl StateError {
    pub fn new(name: impl Into<String>, cause: impl Into<String>) -> Self {
        StateError {
            name: name.into(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cause.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.cause)
        }
    }
}

/// One observed attempt from the retry observation surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// Zero-based ordinal of the attempt.
    pub index: u32,
    /// Delay observed before the next attempt. `None` on the terminal
    /// attempt (success or retries exhausted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<f64>,
}

/// Item accounting for a Map/batch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCounts {
    pub total_items: u64,
    pub failed_items: u64,
}

/// Structured record of what was sent to and received from the oracle
/// and any substituted step.
///
/// `sent_request` and `received_at` are filled in by the runner after
/// the call completes; everything else is decoded from the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InspectionTrace {
    /// The full request the harness posted, as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_request: Option<Value>,
    /// RFC 3339 timestamp of when the response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
    /// Request the oracle sent to the substituted step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_request: Option<Value>,
    /// Raw response of the substituted step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_response: Option<Value>,
    /// Per-attempt timing, in attempt order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
    /// Item accounting for Map states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_counts: Option<ItemCounts>,
    /// One normalized outcome per declared branch, in declaration
    /// order, for Parallel states.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<ExecutionOutcome>,
    /// The raw oracle response, kept verbatim for diagnosis.
    #[serde(default)]
    pub raw: Value,
}

/// The structured outcome of one single-state execution.
///
/// Immutable once produced; assertions only read it. For SUCCEEDED the
/// output is present and the error absent; for FAILED and CAUGHT the
/// error is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_document: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StateError>,
    pub trace: InspectionTrace,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_camel_case_and_omits_empty() {
        let request = OracleRequest {
            workflow_definition_ref: "order_processing".to_string(),
            state_id: "ValidateOrder".to_string(),
            state_definition: json!({"Type": "Task"}),
            input_document: json!({"orderId": "o-1"}),
            context_overrides: BTreeMap::new(),
            mock_bindings: vec![],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["workflowDefinitionRef"], json!("order_processing"));
        assert_eq!(value["stateId"], json!("ValidateOrder"));
        assert!(value.get("contextOverrides").is_none());
        assert!(value.get("mockBindings").is_none());
    }

    #[test]
    fn substitution_serializes_error_output() {
        let sub = StepSubstitution {
            step_id: "ProcessPayment".to_string(),
            result: None,
            error_output: Some(SubstitutedError {
                name: "PaymentDeclined".to_string(),
                cause: "card expired".to_string(),
                retryable: Some(false),
            }),
        };
        let value = serde_json::to_value(&sub).unwrap();
        assert_eq!(value["stepId"], json!("ProcessPayment"));
        assert_eq!(value["errorOutput"]["name"], json!("PaymentDeclined"));
        assert_eq!(value["errorOutput"]["retryable"], json!(false));
        assert!(value.get("result").is_none());
    }

    #[test]
    fn status_wire_spelling_round_trips() {
        for status in [
            OutcomeStatus::Succeeded,
            OutcomeStatus::Failed,
            OutcomeStatus::Caught,
            OutcomeStatus::TimedOut,
        ] {
            let encoded = serde_json::to_value(status).unwrap();
            assert_eq!(encoded, json!(status.as_str()));
            let decoded: OutcomeStatus = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, status);
        }
    }

    #[test]
    fn state_error_display_with_and_without_cause() {
        let err = StateError::new("ValidationException", "amount below minimum");
        assert_eq!(err.to_string(), "ValidationException (amount below minimum)");
        let bare = StateError::new("States.Timeout", "");
        assert_eq!(bare.to_string(), "States.Timeout");
    }
}

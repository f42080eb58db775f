//! Total normalization of raw oracle responses into [`ExecutionOutcome`].
//!
//! Structural decoding only — no business logic. The function never
//! fails: a response with a missing or unrecognized status becomes a
//! FAILED outcome carrying a `States.UnrecognizedStatus` error, and a
//! SUCCEEDED response whose fields contradict that status becomes a
//! FAILED outcome carrying `States.MalformedResponse`, so assertion
//! chains stay composable even against a misbehaving oracle.

use crate::types::{
    AttemptRecord, ExecutionOutcome, InspectionTrace, ItemCounts, OutcomeStatus, StateError,
};
use serde_json::Value;

/// Error name used when the oracle reports a status outside the closed set.
pub const UNRECOGNIZED_STATUS: &str = "States.UnrecognizedStatus";

/// Error name used when the response's fields contradict its status.
pub const MALFORMED_RESPONSE: &str = "States.MalformedResponse";

/// Normalize a raw oracle response into a structured outcome.
///
/// The raw value is kept verbatim in `trace.raw`; branch outcomes are
/// normalized recursively in declaration order.
pub fn normalize(raw: &Value) -> ExecutionOutcome {
    let status = match decode_status(raw) {
        Ok(status) => status,
        Err(cause) => {
            return ExecutionOutcome {
                status: OutcomeStatus::Failed,
                output_document: None,
                next_state: None,
                error: Some(StateError::new(UNRECOGNIZED_STATUS, cause)),
                trace: decode_trace(raw),
            }
        }
    };

    let output_document = raw.get("outputDocument").cloned();
    let error = decode_error(raw);

    // A SUCCEEDED outcome carries an output and no error. A response
    // that claims success while contradicting that degrades the same
    // way an unrecognized status does.
    if status == OutcomeStatus::Succeeded {
        let mismatch = if let Some(reported) = &error {
            Some(format!("SUCCEEDED response carries an error: {}", reported))
        } else if output_document.is_none() {
            Some("SUCCEEDED response has no outputDocument".to_string())
        } else {
            None
        };
        if let Some(cause) = mismatch {
            return ExecutionOutcome {
                status: OutcomeStatus::Failed,
                output_document: None,
                next_state: None,
                error: Some(StateError::new(MALFORMED_RESPONSE, cause)),
                trace: decode_trace(raw),
            };
        }
    }

    ExecutionOutcome {
        status,
        output_document,
        next_state: raw
            .get("nextState")
            .and_then(Value::as_str)
            .map(str::to_owned),
        error,
        trace: decode_trace(raw),
    }
}

fn decode_status(raw: &Value) -> Result<OutcomeStatus, String> {
    let status = match raw.get("status") {
        Some(Value::String(s)) => s.as_str(),
        Some(other) => return Err(format!("status is not a string: {}", other)),
        None => return Err("status field missing".to_string()),
    };
    match status {
        "SUCCEEDED" => Ok(OutcomeStatus::Succeeded),
        "FAILED" => Ok(OutcomeStatus::Failed),
        "CAUGHT" => Ok(OutcomeStatus::Caught),
        "TIMED_OUT" => Ok(OutcomeStatus::TimedOut),
        other => Err(format!("unrecognized status '{}'", other)),
    }
}

/// Decode the error field. Accepts both the structured shape
/// `{"error": {"name": ..., "cause": ...}}` and the flat legacy shape
/// `{"error": "Name", "cause": "..."}`.
fn decode_error(raw: &Value) -> Option<StateError> {
    match raw.get("error")? {
        Value::Object(obj) => {
            let name = obj.get("name").and_then(Value::as_str)?;
            let cause = obj
                .get("cause")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(StateError::new(name, cause))
        }
        Value::String(name) => {
            let cause = raw
                .get("cause")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(StateError::new(name.as_str(), cause))
        }
        _ => None,
    }
}

fn decode_trace(raw: &Value) -> InspectionTrace {
    let inspection = raw.get("inspectionTrace").unwrap_or(&Value::Null);

    InspectionTrace {
        sent_request: None,
        received_at: None,
        step_request: inspection.get("stepRequest").cloned(),
        step_response: inspection.get("stepResponse").cloned(),
        attempts: decode_attempts(inspection),
        item_counts: decode_item_counts(inspection),
        branches: decode_branches(inspection),
        raw: raw.clone(),
    }
}

fn decode_attempts(inspection: &Value) -> Vec<AttemptRecord> {
    let Some(entries) = inspection.get("attempts").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| AttemptRecord {
            index: entry
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(position as u64) as u32,
            delay_seconds: entry.get("delaySeconds").and_then(Value::as_f64),
        })
        .collect()
}

fn decode_item_counts(inspection: &Value) -> Option<ItemCounts> {
    let counts = inspection.get("itemCounts")?;
    Some(ItemCounts {
        total_items: counts.get("totalItems").and_then(Value::as_u64)?,
        failed_items: counts
            .get("failedItems")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    })
}

fn decode_branches(inspection: &Value) -> Vec<ExecutionOutcome> {
    inspection
        .get("branches")
        .and_then(Value::as_array)
        .map(|branches| branches.iter().map(normalize).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn succeeded_response_decodes_output_and_next_state() {
        let raw = json!({
            "status": "SUCCEEDED",
            "outputDocument": {"isValid": true, "orderId": "o-1"},
            "nextState": "CheckValidation"
        });
        let outcome = normalize(&raw);
        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(
            outcome.output_document,
            Some(json!({"isValid": true, "orderId": "o-1"}))
        );
        assert_eq!(outcome.next_state.as_deref(), Some("CheckValidation"));
        assert!(outcome.error.is_none());
        assert_eq!(outcome.trace.raw, raw);
    }

    #[test]
    fn caught_response_decodes_structured_error() {
        let raw = json!({
            "status": "CAUGHT",
            "nextState": "RejectOrder",
            "error": {"name": "ValidationException", "cause": "amount below minimum"}
        });
        let outcome = normalize(&raw);
        assert_eq!(outcome.status, OutcomeStatus::Caught);
        assert_eq!(
            outcome.error,
            Some(StateError::new("ValidationException", "amount below minimum"))
        );
        assert_eq!(outcome.next_state.as_deref(), Some("RejectOrder"));
    }

    #[test]
    fn flat_error_shape_is_accepted() {
        let raw = json!({
            "status": "FAILED",
            "error": "States.TaskFailed",
            "cause": "step exploded"
        });
        let outcome = normalize(&raw);
        assert_eq!(
            outcome.error,
            Some(StateError::new("States.TaskFailed", "step exploded"))
        );
    }

    #[test]
    fn unrecognized_status_maps_to_failed() {
        let raw = json!({"status": "RETRIABLE"});
        let outcome = normalize(&raw);
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        let error = outcome.error.unwrap();
        assert_eq!(error.name, UNRECOGNIZED_STATUS);
        assert!(error.cause.contains("RETRIABLE"));
    }

    #[test]
    fn succeeded_with_error_field_degrades_to_failed() {
        let raw = json!({
            "status": "SUCCEEDED",
            "outputDocument": {},
            "error": {"name": "Phantom", "cause": "should not be here"}
        });
        let outcome = normalize(&raw);
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        let error = outcome.error.unwrap();
        assert_eq!(error.name, MALFORMED_RESPONSE);
        assert!(error.cause.contains("Phantom"));
        assert!(outcome.output_document.is_none());
    }

    #[test]
    fn succeeded_without_output_degrades_to_failed() {
        let outcome = normalize(&json!({"status": "SUCCEEDED", "nextState": "CheckValidation"}));
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        let error = outcome.error.unwrap();
        assert_eq!(error.name, MALFORMED_RESPONSE);
        assert!(error.cause.contains("outputDocument"));
        assert!(outcome.next_state.is_none());
    }

    #[test]
    fn explicit_null_output_counts_as_present() {
        let outcome = normalize(&json!({"status": "SUCCEEDED", "outputDocument": null}));
        assert_eq!(outcome.status, OutcomeStatus::Succeeded);
        assert_eq!(outcome.output_document, Some(Value::Null));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn missing_status_maps_to_failed() {
        let outcome = normalize(&json!({"outputDocument": {}}));
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error.unwrap().cause, "status field missing");
    }

    #[test]
    fn non_object_response_maps_to_failed() {
        let outcome = normalize(&json!("gibberish"));
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error.unwrap().name, UNRECOGNIZED_STATUS);
    }

    #[test]
    fn attempts_decode_with_explicit_and_positional_indices() {
        let raw = json!({
            "status": "FAILED",
            "error": {"name": "Lambda.TooManyRequestsException", "cause": "rate exceeded"},
            "inspectionTrace": {
                "attempts": [
                    {"index": 0, "delaySeconds": 1.0},
                    {"index": 1, "delaySeconds": 2.0},
                    {"delaySeconds": 4.0},
                    {}
                ]
            }
        });
        let attempts = normalize(&raw).trace.attempts;
        assert_eq!(attempts.len(), 4);
        assert_eq!(attempts[2].index, 2);
        assert_eq!(attempts[2].delay_seconds, Some(4.0));
        assert_eq!(attempts[3].index, 3);
        assert_eq!(attempts[3].delay_seconds, None);
    }

    #[test]
    fn item_counts_decode() {
        let raw = json!({
            "status": "SUCCEEDED",
            "outputDocument": [],
            "inspectionTrace": {"itemCounts": {"totalItems": 10, "failedItems": 2}}
        });
        let counts = normalize(&raw).trace.item_counts.unwrap();
        assert_eq!(counts.total_items, 10);
        assert_eq!(counts.failed_items, 2);
    }

    #[test]
    fn branches_normalize_recursively_in_order() {
        let raw = json!({
            "status": "FAILED",
            "error": {"name": "States.BranchFailed", "cause": ""},
            "inspectionTrace": {
                "branches": [
                    {"status": "SUCCEEDED", "outputDocument": {"paymentId": "p-1"}},
                    {"status": "FAILED", "error": {"name": "PaymentDeclined", "cause": ""}},
                    {"status": "MYSTERY"}
                ]
            }
        });
        let branches = normalize(&raw).trace.branches;
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0].status, OutcomeStatus::Succeeded);
        assert_eq!(branches[1].status, OutcomeStatus::Failed);
        assert_eq!(branches[1].error.as_ref().unwrap().name, "PaymentDeclined");
        // Unrecognized branch status degrades the same way as a top-level one.
        assert_eq!(branches[2].status, OutcomeStatus::Failed);
        assert_eq!(branches[2].error.as_ref().unwrap().name, UNRECOGNIZED_STATUS);
    }

    #[test]
    fn step_request_and_response_pass_through() {
        let raw = json!({
            "status": "SUCCEEDED",
            "outputDocument": {},
            "inspectionTrace": {
                "stepRequest": {"Payload": {"orderId": "o-1"}},
                "stepResponse": {"isValid": true}
            }
        });
        let trace = normalize(&raw).trace;
        assert_eq!(trace.step_request, Some(json!({"Payload": {"orderId": "o-1"}})));
        assert_eq!(trace.step_response, Some(json!({"isValid": true})));
    }
}

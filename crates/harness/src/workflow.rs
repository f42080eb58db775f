//! Workflow definition handle: an opaque reference plus per-state
//! definitions.
//!
//! The harness never interprets state definitions — it only needs to
//! know which state ids exist (so unknown ids fail before reaching the
//! oracle) and to feed the one definition under test through the wire.

use crate::error::HarnessError;
use serde_json::Value;
use std::collections::BTreeMap;

/// An opaque workflow reference and its per-state definitions.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    reference: String,
    states: BTreeMap<String, Value>,
}

impl WorkflowDefinition {
    pub fn new(reference: impl Into<String>, states: BTreeMap<String, Value>) -> Self {
        WorkflowDefinition {
            reference: reference.into(),
            states,
        }
    }

    /// Build from a workflow document whose top-level `States` object
    /// maps state ids to definitions.
    pub fn from_document(
        reference: impl Into<String>,
        document: &Value,
    ) -> Result<Self, HarnessError> {
        let states = document
            .get("States")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                HarnessError::configuration(
                    "workflow document has no 'States' object mapping state ids to definitions",
                )
            })?;

        Ok(WorkflowDefinition {
            reference: reference.into(),
            states: states
                .iter()
                .map(|(id, def)| (id.clone(), def.clone()))
                .collect(),
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn contains(&self, state_id: &str) -> bool {
        self.states.contains_key(state_id)
    }

    /// Look up one state's definition.
    pub fn state(&self, state_id: &str) -> Option<&Value> {
        self.states.get(state_id)
    }

    /// All known state ids, in sorted order.
    pub fn state_ids(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}

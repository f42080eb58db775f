//! Mock registry: step id → substituted result or error.
//!
//! Resolution is total — "not bound" is a valid outcome meaning the
//! oracle decides whether to invoke the live step, which is distinct
//! from a binding whose result is `null`.

use serde_json::Value;
use stateprobe_protocol::{StepSubstitution, SubstitutedError};
use std::collections::BTreeMap;

/// Failure descriptor for a mocked step.
#[derive(Debug, Clone, PartialEq)]
pub struct MockError {
    pub name: String,
    pub cause: String,
    pub retryable: Option<bool>,
}

impl MockError {
    pub fn new(name: impl Into<String>, cause: impl Into<String>) -> Self {
        MockError {
            name: name.into(),
            cause: cause.into(),
            retryable: None,
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}

/// A substituted result or error for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum MockBinding {
    Result(Value),
    Error(MockError),
}

/// Resolution of a step id against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResolution<'a> {
    Result(&'a Value),
    Error(&'a MockError),
    /// No binding registered — invoke the live step.
    NotBound,
}

/// In-memory mapping of step ids to substituted results, owned by one
/// test case. Keys are unique; binding the same step twice overwrites
/// (last write wins).
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    bindings: BTreeMap<String, MockBinding>,
}

impl MockRegistry {
    pub fn new() -> Self {
        MockRegistry::default()
    }

    /// Register or overwrite a binding for a step.
    pub fn bind(&mut self, step_id: impl Into<String>, binding: MockBinding) {
        self.bindings.insert(step_id.into(), binding);
    }

    /// Resolve a step id. Never fails; absence is `NotBound`.
    pub fn resolve(&self, step_id: &str) -> MockResolution<'_> {
        match self.bindings.get(step_id) {
            Some(MockBinding::Result(value)) => MockResolution::Result(value),
            Some(MockBinding::Error(error)) => MockResolution::Error(error),
            None => MockResolution::NotBound,
        }
    }

    /// Drop all bindings.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Convert the registry into wire substitutions, in key order.
    /// Unbound steps are simply absent from the request.
    pub fn to_substitutions(&self) -> Vec<StepSubstitution> {
        self.bindings
            .iter()
            .map(|(step_id, binding)| match binding {
                MockBinding::Result(value) => StepSubstitution {
                    step_id: step_id.clone(),
                    result: Some(value.clone()),
                    error_output: None,
                },
                MockBinding::Error(error) => StepSubstitution {
                    step_id: step_id.clone(),
                    result: None,
                    error_output: Some(SubstitutedError {
                        name: error.name.clone(),
                        cause: error.cause.clone(),
                        retryable: error.retryable,
                    }),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unbound_step_resolves_to_not_bound() {
        let registry = MockRegistry::new();
        assert_eq!(registry.resolve("ValidateOrder"), MockResolution::NotBound);
    }

    #[test]
    fn bound_null_result_is_distinct_from_not_bound() {
        let mut registry = MockRegistry::new();
        registry.bind("ValidateOrder", MockBinding::Result(Value::Null));
        assert_eq!(
            registry.resolve("ValidateOrder"),
            MockResolution::Result(&Value::Null)
        );
    }

    #[test]
    fn last_write_wins() {
        let mut registry = MockRegistry::new();
        registry.bind("ValidateOrder", MockBinding::Result(json!({"isValid": true})));
        registry.bind(
            "ValidateOrder",
            MockBinding::Error(MockError::new("ValidationException", "bad order")),
        );
        match registry.resolve("ValidateOrder") {
            MockResolution::Error(error) => assert_eq!(error.name, "ValidationException"),
            other => panic!("expected error binding, got {:?}", other),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clear_drops_all_bindings() {
        let mut registry = MockRegistry::new();
        registry.bind("A", MockBinding::Result(json!(1)));
        registry.bind("B", MockBinding::Result(json!(2)));
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve("A"), MockResolution::NotBound);
    }

    #[test]
    fn substitutions_carry_result_or_error_exclusively() {
        let mut registry = MockRegistry::new();
        registry.bind("ValidateOrder", MockBinding::Result(json!({"isValid": true})));
        registry.bind(
            "ProcessPayment",
            MockBinding::Error(MockError::new("PaymentDeclined", "card expired").retryable(false)),
        );

        let subs = registry.to_substitutions();
        assert_eq!(subs.len(), 2);

        let payment = subs.iter().find(|s| s.step_id == "ProcessPayment").unwrap();
        assert!(payment.result.is_none());
        let error = payment.error_output.as_ref().unwrap();
        assert_eq!(error.name, "PaymentDeclined");
        assert_eq!(error.retryable, Some(false));

        let validate = subs.iter().find(|s| s.step_id == "ValidateOrder").unwrap();
        assert_eq!(validate.result, Some(json!({"isValid": true})));
        assert!(validate.error_output.is_none());
    }
}

//! Execution invoker: the only component that performs I/O.
//!
//! [`OracleInvoker`] is the seam between the harness and the oracle's
//! transport. The HTTP implementation uses `ureq` and performs exactly
//! one POST per invocation — retry behavior under test belongs to the
//! state's declared policy, which the harness observes, not drives.

use crate::error::HarnessError;
use serde_json::Value;
use stateprobe_protocol::OracleRequest;

/// Environment variable consulted for a bearer token when none is
/// configured explicitly.
pub const AUTH_TOKEN_ENV: &str = "STATEPROBE_ORACLE_AUTH_TOKEN";

/// Sends one single-state test request to the oracle and returns the
/// raw response document.
///
/// Implementations must not retry or cache. Connectivity and
/// authorization failures are returned as
/// [`HarnessError::Connectivity`] and abort the test case.
pub trait OracleInvoker: Send + Sync {
    fn invoke(&self, request: &OracleRequest) -> Result<Value, HarnessError>;

    /// Identifier for diagnostics (e.g. "http").
    fn invoker_id(&self) -> &str;
}

/// Invoker that posts requests to an oracle endpoint over HTTP.
///
/// - `endpoint` is the full URL of the oracle's single-state test route.
/// - The bearer token comes from [`with_auth_token`](Self::with_auth_token)
///   or falls back to the `STATEPROBE_ORACLE_AUTH_TOKEN` env var.
pub struct HttpOracleInvoker {
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpOracleInvoker {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpOracleInvoker {
            endpoint: endpoint.into(),
            auth_token: std::env::var(AUTH_TOKEN_ENV).ok(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl OracleInvoker for HttpOracleInvoker {
    fn invoke(&self, request: &OracleRequest) -> Result<Value, HarnessError> {
        let agent = ureq::Agent::new_with_defaults();
        let mut post = agent.post(&self.endpoint);

        if let Some(ref token) = self.auth_token {
            post = post.header("Authorization", &format!("Bearer {}", token));
        }

        // Any transport or HTTP-status error is fatal: it indicates
        // environment misconfiguration, not a property of the state.
        let response = post.send_json(request).map_err(|e| {
            HarnessError::connectivity(format!("POST {} failed: {}", self.endpoint, e))
        })?;

        response.into_body().read_json().map_err(|e| {
            HarnessError::connectivity(format!(
                "oracle at {} returned a non-JSON body: {}",
                self.endpoint, e
            ))
        })
    }

    fn invoker_id(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_auth_token_overrides_env() {
        let invoker = HttpOracleInvoker::new("http://localhost:8083/test-state")
            .with_auth_token("explicit-token");
        assert_eq!(invoker.auth_token.as_deref(), Some("explicit-token"));
        assert_eq!(invoker.endpoint(), "http://localhost:8083/test-state");
    }

    #[test]
    fn invoker_id_is_http() {
        let invoker = HttpOracleInvoker::new("http://localhost:8083/test-state");
        assert_eq!(invoker.invoker_id(), "http");
    }
}

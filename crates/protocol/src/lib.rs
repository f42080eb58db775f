//! stateprobe-protocol: Shared oracle wire types and response normalization.
//!
//! Provides typed structs for the single-state test request sent to the
//! execution oracle, the structured `ExecutionOutcome` decoded from its
//! response, and a single `normalize()` entry point that turns a loosely
//! typed `serde_json::Value` response into an outcome with a closed status
//! set.
//!
//! The harness crate depends on this crate for the wire boundary; the
//! concrete transport lives on the harness side. Documents the protocol
//! does not interpret (state definitions, input/output payloads, step
//! requests) stay `serde_json::Value`.

pub mod normalize;
pub mod types;

pub use normalize::{normalize, MALFORMED_RESPONSE, UNRECOGNIZED_STATUS};
pub use types::*;

//! Built-in smoke-test handlers (§4.3, §10), grounded on the reference
//! implementation's own integration-test fixture handler: a trivial function
//! that echoes its input back with a marker, so a freshly deployed runtime
//! can be exercised end to end before a bespoke handler exists.

use async_trait::async_trait;
use serde_json::{json, Value};
use transit_core::Envelope;

use crate::handler::{HandlerError, HandlerReturn, MessageHandler, PayloadHandler};

/// Payload-mode identity handler: returns its input unchanged.
pub struct Echo;

#[async_trait]
impl PayloadHandler for Echo {
    async fn call(&self, payload: Value) -> Result<HandlerReturn<Value>, HandlerError> {
        Ok(HandlerReturn::One(payload))
    }
}

/// Message-mode handler mirroring the reference implementation's
/// integration-test fixture: wraps the payload with a "processed" marker
/// and returns it on the same route it was given (route-invariant: the
/// cursor is untouched, only `payload` changes).
pub struct Smoke;

#[async_trait]
impl MessageHandler for Smoke {
    async fn call(&self, envelope: Envelope) -> Result<HandlerReturn<Envelope>, HandlerError> {
        let wrapped = json!({
            "status": "processed",
            "original": envelope.payload,
        });
        Ok(HandlerReturn::One(envelope.with_payload(wrapped)))
    }
}

//! The handler contract (C3): the two calling conventions a user function
//! can be registered under.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use transit_core::Envelope;

/// Normalised handler return shape (§4.4 "normalise the return"): `None`
/// collapses to zero outputs, a single value to one, a list to N (fan-out).
pub enum HandlerReturn<T> {
    None,
    One(T),
    Many(Vec<T>),
}

impl<T> HandlerReturn<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            HandlerReturn::None => Vec::new(),
            HandlerReturn::One(v) => vec![v],
            HandlerReturn::Many(v) => v,
        }
    }
}

/// An error raised by a handler. `kind` carries the exception-class-like
/// name surfaced in the error envelope's `details.type` (§3); the sidecar
/// additionally scans `message` for the out-of-memory signatures that
/// reclassify a `processing_error` into `oom_error`/`cuda_oom_error` (§4.7).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub kind: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into() }
    }
}

/// A handler registered for **payload mode**: receives and returns only the
/// business payload. The runtime reattaches the unchanged input route.
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    async fn call(&self, payload: Value) -> Result<HandlerReturn<Value>, HandlerError>;
}

/// A handler registered for **message mode**: receives and returns the full
/// envelope, and therefore owns its own (route-invariant-constrained) route.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn call(&self, envelope: Envelope) -> Result<HandlerReturn<Envelope>, HandlerError>;
}

/// One registry entry: exactly one of the two calling conventions. A
/// process is configured (§4.3, §9) with a single `CallingConvention` at
/// startup, so only the matching variant is ever invoked.
pub enum HandlerEntry {
    Payload(std::sync::Arc<dyn PayloadHandler>),
    Message(std::sync::Arc<dyn MessageHandler>),
}

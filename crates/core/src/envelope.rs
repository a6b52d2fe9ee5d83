//! The wire data model: [`Envelope`], [`Route`], and the error-envelope union.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The ordered sequence of steps a job must pass through, plus a cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub steps: Vec<String>,
    pub current: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Route {
    /// `0 <= current < len(steps)`.
    pub fn in_bounds(&self) -> bool {
        !self.steps.is_empty() && self.current < self.steps.len()
    }

    /// The step name the cursor currently points at, if in bounds.
    pub fn current_step(&self) -> Option<&str> {
        self.steps.get(self.current).map(String::as_str)
    }

    /// Whether advancing the cursor by one would run past the end of `steps`.
    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.steps.len()
    }
}

/// The unit of work on the wire: opaque business payload plus routing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub payload: Value,
    pub route: Route,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl Envelope {
    pub fn with_payload(&self, payload: Value) -> Envelope {
        Envelope {
            payload,
            route: self.route.clone(),
            job_id: self.job_id.clone(),
        }
    }
}

/// The closed taxonomy of wire error kinds (§7). Each has a fixed severity
/// and disposition that the sidecar uses to decide requeue vs. terminalise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MsgParsingError,
    ProcessingError,
    ConnectionError,
    TimeoutError,
    OomError,
    CudaOomError,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::MsgParsingError | ErrorKind::ProcessingError => Severity::Fatal,
            ErrorKind::ConnectionError => Severity::Transient,
            ErrorKind::TimeoutError | ErrorKind::OomError | ErrorKind::CudaOomError => {
                Severity::Recoverable
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Publish to the error-terminal queue immediately.
    Fatal,
    /// Broker requeue; expected to clear on retry.
    Transient,
    /// Broker requeue up to policy, then error-terminal.
    Recoverable,
}

/// Structured detail attached to an error envelope; mirrors what a caught
/// exception/panic would have carried in a dynamically-typed runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

/// An error envelope, produced by the runtime or the router, never by a handler directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    /// The envelope (or raw JSON) that triggered the error, preserved so the
    /// error-terminal handler can recover `job_id` and route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_message: Option<Value>,
}

/// One element of the runtime's response array: either a success envelope
/// or a single error. Discriminated by the presence of the `error` key,
/// matching the in-band union the wire format uses (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseItem {
    Failure(ErrorEnvelope),
    Success(Envelope),
}

impl ResponseItem {
    pub fn is_error(&self) -> bool {
        matches!(self, ResponseItem::Failure(_))
    }
}

/// Which calling convention a runtime process was configured with. Selected
/// once at startup (§4.3, §9) — never re-decided per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    Payload,
    Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_bounds() {
        let r = Route { steps: vec!["a".into(), "b".into()], current: 0, metadata: None };
        assert!(r.in_bounds());
        assert!(!r.is_last());
        let r2 = Route { steps: vec!["a".into()], current: 0, metadata: None };
        assert!(r2.is_last());
    }

    #[test]
    fn response_item_discriminates_on_error_key() {
        let success = r#"{"payload":{"x":1},"route":{"steps":["a"],"current":0}}"#;
        let failure = r#"{"error":"processing_error","details":{"message":"bad"}}"#;
        let s: ResponseItem = serde_json::from_str(success).unwrap();
        let f: ResponseItem = serde_json::from_str(failure).unwrap();
        assert!(!s.is_error());
        assert!(f.is_error());
    }

    #[test]
    fn envelope_roundtrip() {
        let env = Envelope {
            payload: serde_json::json!({"x": 1}),
            route: Route { steps: vec!["a".into(), "b".into()], current: 0, metadata: None },
            job_id: Some("job-1".into()),
        };
        let bytes = serde_json::to_vec(&env).unwrap();
        let back: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(env, back);
    }
}

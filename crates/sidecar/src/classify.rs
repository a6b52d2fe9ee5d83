//! Error-kind policy (§4.7, §7): recognizing resource-exhaustion signatures
//! inside an otherwise-generic `processing_error`, and deciding whether a
//! given error kind gets requeued or sent straight to the error-terminal.

use std::time::Duration;

use transit_core::{Envelope, ErrorDetails, ErrorEnvelope, ErrorKind, ResponseItem, Severity};

const CUDA_OOM_SIGNATURES: &[&str] = &["CUDA out of memory", "CUDA error: out of memory"];
const OOM_SIGNATURES: &[&str] = &["MemoryError", "Cannot allocate memory", "out of memory"];

/// Promote a generic `processing_error` to `oom_error`/`cuda_oom_error` when
/// its message matches a known exhaustion signature, leaving every other
/// response item untouched.
pub fn reclassify_oom(items: Vec<ResponseItem>) -> Vec<ResponseItem> {
    items
        .into_iter()
        .map(|item| match item {
            ResponseItem::Failure(mut err) if err.error == ErrorKind::ProcessingError => {
                if let Some(message) = err.details.as_ref().map(|d| d.message.as_str()) {
                    if CUDA_OOM_SIGNATURES.iter().any(|sig| message.contains(sig)) {
                        err.error = ErrorKind::CudaOomError;
                    } else if OOM_SIGNATURES.iter().any(|sig| message.contains(sig)) {
                        err.error = ErrorKind::OomError;
                    }
                }
                ResponseItem::Failure(err)
            }
            other => other,
        })
        .collect()
}

/// Wrap an I/O-level failure to reach the runtime at all as a
/// `connection_error` (§7: transient, broker requeue).
pub fn connection_failure(original: &Envelope, message: String) -> ErrorEnvelope {
    ErrorEnvelope {
        error: ErrorKind::ConnectionError,
        details: Some(ErrorDetails { message, r#type: None, traceback: None }),
        original_message: serde_json::to_value(original).ok(),
    }
}

/// Wrap a request that exceeded `REQUEST_TIMEOUT_SECS` as a `timeout_error`
/// (§7: recoverable — requeue up to policy, then error-terminal).
pub fn timeout_failure(original: &Envelope, timeout: Duration) -> ErrorEnvelope {
    ErrorEnvelope {
        error: ErrorKind::TimeoutError,
        details: Some(ErrorDetails {
            message: format!("runtime did not respond within {timeout:?}"),
            r#type: None,
            traceback: None,
        }),
        original_message: serde_json::to_value(original).ok(),
    }
}

/// What the sidecar should do with a message that produced this error kind,
/// given how many times it has already been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Nack back onto the queue; do not touch object storage or the gateway.
    Requeue,
    /// Exhausted its retries (or never gets any) — route to the error-terminal.
    Terminalize,
}

pub fn disposition(kind: ErrorKind, attempt_count: u32, max_attempts: u32) -> Disposition {
    match kind.severity() {
        Severity::Fatal => Disposition::Terminalize,
        Severity::Transient => Disposition::Requeue,
        Severity::Recoverable => {
            if attempt_count >= max_attempts {
                Disposition::Terminalize
            } else {
                Disposition::Requeue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use transit_core::Route;

    fn failure(message: &str) -> ResponseItem {
        ResponseItem::Failure(ErrorEnvelope {
            error: ErrorKind::ProcessingError,
            details: Some(ErrorDetails { message: message.into(), r#type: None, traceback: None }),
            original_message: None,
        })
    }

    #[test]
    fn reclassifies_cuda_oom_signature() {
        let out = reclassify_oom(vec![failure("RuntimeError: CUDA out of memory. Tried to allocate 2 GiB")]);
        match &out[0] {
            ResponseItem::Failure(e) => assert_eq!(e.error, ErrorKind::CudaOomError),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn reclassifies_generic_oom_signature() {
        let out = reclassify_oom(vec![failure("OSError: Cannot allocate memory")]);
        match &out[0] {
            ResponseItem::Failure(e) => assert_eq!(e.error, ErrorKind::OomError),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn leaves_unrelated_processing_errors_alone() {
        let out = reclassify_oom(vec![failure("ValueError: bad input")]);
        match &out[0] {
            ResponseItem::Failure(e) => assert_eq!(e.error, ErrorKind::ProcessingError),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn fatal_kinds_always_terminalize() {
        assert_eq!(disposition(ErrorKind::MsgParsingError, 1, 3), Disposition::Terminalize);
        assert_eq!(disposition(ErrorKind::ProcessingError, 1, 3), Disposition::Terminalize);
    }

    #[test]
    fn transient_kinds_always_requeue() {
        assert_eq!(disposition(ErrorKind::ConnectionError, 99, 3), Disposition::Requeue);
    }

    #[test]
    fn recoverable_kinds_terminalize_past_max_attempts() {
        assert_eq!(disposition(ErrorKind::TimeoutError, 2, 3), Disposition::Requeue);
        assert_eq!(disposition(ErrorKind::TimeoutError, 3, 3), Disposition::Terminalize);
    }

    #[test]
    fn connection_failure_preserves_original_envelope() {
        let env = Envelope {
            payload: json!({"x": 1}),
            route: Route { steps: vec!["a".into()], current: 0, metadata: None },
            job_id: Some("job-1".into()),
        };
        let err = connection_failure(&env, "refused".into());
        assert_eq!(err.error, ErrorKind::ConnectionError);
        let recovered: Envelope = serde_json::from_value(err.original_message.unwrap()).unwrap();
        assert_eq!(recovered, env);
    }
}

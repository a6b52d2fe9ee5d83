//! Runtime server (C4): accept-serve-close over a Unix socket, one request
//! at a time, invoking the configured handler and framing back a JSON array
//! response (§4.4).

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, warn};
use transit_codec::{read_frame, write_frame, FrameError};
use transit_core::{
    validate, CallingConvention, Envelope, ErrorDetails, ErrorEnvelope, ErrorKind, ResponseItem,
};

use crate::handler::{HandlerEntry, HandlerReturn};

/// Everything the request-handling path needs, independent of the listening
/// socket itself — kept separate from the accept loop so the core logic is
/// testable without a real Unix socket (§8 ambient test tooling).
pub struct RequestContext<'a> {
    pub entry: &'a HandlerEntry,
    pub calling_convention: CallingConvention,
    pub enable_validation: bool,
}

/// Process one already-framed request body and return the framed response
/// body to write back. Never fails: every error path is converted to a
/// one-element error-envelope array (§4.4 step 4, §7 "always returns a
/// single structured error envelope").
pub async fn build_response(body: &[u8], ctx: &RequestContext<'_>) -> Vec<u8> {
    let envelope = if ctx.enable_validation {
        validate::decode_envelope(body)
    } else {
        lenient_decode(body)
    };

    let envelope = match envelope {
        Ok(e) => e,
        Err(e) => return encode_error(ErrorKind::MsgParsingError, &e.to_string(), None, body),
    };

    let outputs = match invoke(ctx, &envelope).await {
        Ok(outputs) => outputs,
        Err(e) => {
            return encode_error(
                ErrorKind::ProcessingError,
                &e.message,
                Some(e.kind),
                body,
            )
        }
    };

    if ctx.enable_validation && ctx.calling_convention == CallingConvention::Message {
        // `decode_envelope` above (only run when validation is enabled)
        // already enforced `0 <= current < len(steps)`, so this is always `Some`.
        let expected_step = envelope
            .route
            .current_step()
            .expect("decode_envelope validated route bounds");
        if let Err(e) = validate::validate_outputs(&outputs, expected_step) {
            return encode_error(ErrorKind::ProcessingError, &e.to_string(), None, body);
        }
    }

    let items: Vec<ResponseItem> = outputs.into_iter().map(ResponseItem::Success).collect();
    serde_json::to_vec(&items).expect("response items always serialize")
}

fn lenient_decode(body: &[u8]) -> Result<Envelope, transit_core::SchemaError> {
    serde_json::from_slice(body)
        .map_err(|e| transit_core::SchemaError::Decode(e.to_string()))
}

async fn invoke(
    ctx: &RequestContext<'_>,
    envelope: &Envelope,
) -> Result<Vec<Envelope>, crate::handler::HandlerError> {
    match (ctx.entry, ctx.calling_convention) {
        (HandlerEntry::Payload(h), CallingConvention::Payload) => {
            let outputs = h.call(envelope.payload.clone()).await?.into_vec();
            Ok(outputs.into_iter().map(|p| envelope.with_payload(p)).collect())
        }
        (HandlerEntry::Message(h), CallingConvention::Message) => {
            Ok(h.call(envelope.clone()).await?.into_vec())
        }
        _ => Err(crate::handler::HandlerError::new(
            "ConfigurationError",
            "handler's calling convention does not match HANDLER_ARG_TYPE",
        )),
    }
}

fn encode_error(
    kind: ErrorKind,
    message: &str,
    exc_type: Option<String>,
    original_body: &[u8],
) -> Vec<u8> {
    let original_message: Option<Value> = serde_json::from_slice(original_body).ok();
    let err = ErrorEnvelope {
        error: kind,
        details: Some(ErrorDetails {
            message: message.to_string(),
            r#type: exc_type,
            traceback: None,
        }),
        original_message,
    };
    let items = vec![ResponseItem::Failure(err)];
    serde_json::to_vec(&items).expect("error envelope always serializes")
}

/// Serve exactly one request on an already-accepted connection (§4.4 step 2):
/// read one frame, build the response, write one frame, then the caller
/// closes the stream.
pub async fn serve_one<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    ctx: &RequestContext<'_>,
    chunk_size: usize,
) {
    let body = match read_frame(stream, chunk_size).await {
        Ok(b) => b,
        Err(FrameError::ConnectionClosed) => {
            warn!("connection closed before a full frame was received");
            return;
        }
        Err(e) => {
            error!(error = %e, "io error reading frame");
            return;
        }
    };

    let response = build_response(&body, ctx).await;

    if let Err(e) = write_frame(stream, &response).await {
        warn!(error = %e, "failed to write response frame; peer likely disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{Echo, Smoke};
    use crate::handler::HandlerEntry;
    use serde_json::json;
    use std::sync::Arc;

    fn payload_ctx() -> (HandlerEntry, CallingConvention) {
        (HandlerEntry::Payload(Arc::new(Echo)), CallingConvention::Payload)
    }

    fn message_ctx() -> (HandlerEntry, CallingConvention) {
        (HandlerEntry::Message(Arc::new(Smoke)), CallingConvention::Message)
    }

    #[tokio::test]
    async fn echo_happy_path() {
        let (entry, cc) = payload_ctx();
        let ctx = RequestContext { entry: &entry, calling_convention: cc, enable_validation: true };
        let body = br#"{"payload":{"x":1},"route":{"steps":["a","b"],"current":0}}"#;
        let resp = build_response(body, &ctx).await;
        let items: Vec<ResponseItem> = serde_json::from_slice(&resp).unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            ResponseItem::Success(e) => assert_eq!(e.payload, json!({"x": 1})),
            ResponseItem::Failure(_) => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn disabled_validation_bypasses_bounds_check_in_payload_mode() {
        let (entry, cc) = payload_ctx();
        let ctx = RequestContext { entry: &entry, calling_convention: cc, enable_validation: false };
        // `current` points past the end of `steps` — rejected by §4.2 step 3
        // when validation is enabled, but §6 says disabling validation
        // bypasses input *and* output checks, so this must still succeed.
        let body = br#"{"payload":{"x":1},"route":{"steps":["a"],"current":5}}"#;
        let resp = build_response(body, &ctx).await;
        let items: Vec<ResponseItem> = serde_json::from_slice(&resp).unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            ResponseItem::Success(e) => assert_eq!(e.route.current, 5),
            ResponseItem::Failure(_) => panic!("expected success with validation disabled"),
        }
    }

    #[tokio::test]
    async fn malformed_input_is_msg_parsing_error() {
        let (entry, cc) = payload_ctx();
        let ctx = RequestContext { entry: &entry, calling_convention: cc, enable_validation: true };
        let resp = build_response(b"not json", &ctx).await;
        let items: Vec<ResponseItem> = serde_json::from_slice(&resp).unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            ResponseItem::Failure(e) => assert_eq!(e.error, ErrorKind::MsgParsingError),
            ResponseItem::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn message_mode_route_mismatch_is_processing_error() {
        struct BadRoute;
        #[async_trait::async_trait]
        impl crate::handler::MessageHandler for BadRoute {
            async fn call(
                &self,
                envelope: Envelope,
            ) -> Result<HandlerReturn<Envelope>, crate::handler::HandlerError> {
                let mut out = envelope;
                out.route.current += 1;
                Ok(HandlerReturn::One(out))
            }
        }
        let entry = HandlerEntry::Message(Arc::new(BadRoute));
        let ctx = RequestContext {
            entry: &entry,
            calling_convention: CallingConvention::Message,
            enable_validation: true,
        };
        let body = br#"{"payload":{},"route":{"steps":["a","b"],"current":0}}"#;
        let resp = build_response(body, &ctx).await;
        let items: Vec<ResponseItem> = serde_json::from_slice(&resp).unwrap();
        match &items[0] {
            ResponseItem::Failure(e) => {
                assert_eq!(e.error, ErrorKind::ProcessingError);
                let msg = &e.details.as_ref().unwrap().message;
                assert!(msg.contains("Route mismatch"));
                assert!(msg.contains("'a'"));
                assert!(msg.contains("'b'"));
            }
            ResponseItem::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn empty_return_yields_empty_array() {
        struct Nothing;
        #[async_trait::async_trait]
        impl crate::handler::PayloadHandler for Nothing {
            async fn call(
                &self,
                _payload: Value,
            ) -> Result<HandlerReturn<Value>, crate::handler::HandlerError> {
                Ok(HandlerReturn::None)
            }
        }
        let entry = HandlerEntry::Payload(Arc::new(Nothing));
        let ctx = RequestContext {
            entry: &entry,
            calling_convention: CallingConvention::Payload,
            enable_validation: true,
        };
        let body = br#"{"payload":1,"route":{"steps":["a"],"current":0}}"#;
        let resp = build_response(body, &ctx).await;
        let items: Vec<ResponseItem> = serde_json::from_slice(&resp).unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn handler_error_is_processing_error() {
        struct Boom;
        #[async_trait::async_trait]
        impl crate::handler::PayloadHandler for Boom {
            async fn call(
                &self,
                _payload: Value,
            ) -> Result<HandlerReturn<Value>, crate::handler::HandlerError> {
                Err(crate::handler::HandlerError::new("ValueError", "bad"))
            }
        }
        let entry = HandlerEntry::Payload(Arc::new(Boom));
        let ctx = RequestContext {
            entry: &entry,
            calling_convention: CallingConvention::Payload,
            enable_validation: true,
        };
        let body = br#"{"payload":1,"route":{"steps":["a"],"current":0}}"#;
        let resp = build_response(body, &ctx).await;
        let items: Vec<ResponseItem> = serde_json::from_slice(&resp).unwrap();
        match &items[0] {
            ResponseItem::Failure(e) => {
                assert_eq!(e.error, ErrorKind::ProcessingError);
                assert_eq!(e.details.as_ref().unwrap().message, "bad");
                assert_eq!(e.details.as_ref().unwrap().r#type.as_deref(), Some("ValueError"));
            }
            ResponseItem::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn message_mode_fan_out_preserves_order() {
        struct FanOut;
        #[async_trait::async_trait]
        impl crate::handler::MessageHandler for FanOut {
            async fn call(
                &self,
                envelope: Envelope,
            ) -> Result<HandlerReturn<Envelope>, crate::handler::HandlerError> {
                let outs = (1..=3)
                    .map(|i| envelope.with_payload(json!({"id": i})))
                    .collect();
                Ok(HandlerReturn::Many(outs))
            }
        }
        let entry = HandlerEntry::Message(Arc::new(FanOut));
        let ctx = RequestContext {
            entry: &entry,
            calling_convention: CallingConvention::Message,
            enable_validation: true,
        };
        let body = br#"{"payload":null,"route":{"steps":["a","b"],"current":0}}"#;
        let resp = build_response(body, &ctx).await;
        let items: Vec<ResponseItem> = serde_json::from_slice(&resp).unwrap();
        assert_eq!(items.len(), 3);
        for (i, item) in items.iter().enumerate() {
            match item {
                ResponseItem::Success(e) => assert_eq!(e.payload, json!({"id": i + 1})),
                ResponseItem::Failure(_) => panic!("expected success"),
            }
        }
    }
}

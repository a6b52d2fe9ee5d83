//! Envelope schema validation (C2): shape, bounds, and the route-invariant.

use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::SchemaError;

/// Decode a UTF-8 JSON body into an [`Envelope`], checking shape and bounds.
///
/// Equivalent to the source's `_parse_msg_json` + `_validate_message_syntax`
/// with no `expected_current_step` (input-side validation).
pub fn decode_envelope(body: &[u8]) -> Result<Envelope, SchemaError> {
    let text = std::str::from_utf8(body).map_err(|e| SchemaError::Decode(e.to_string()))?;
    let value: Value =
        serde_json::from_str(text).map_err(|e| SchemaError::Decode(e.to_string()))?;
    validate_shape(&value)?;
    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| SchemaError::Decode(e.to_string()))?;
    validate_bounds(&envelope)?;
    Ok(envelope)
}

/// Structural checks: `payload` present, `route` an object with the right
/// field types. Runs before attempting a typed deserialization so that a
/// malformed envelope produces a message describing the bad field rather
/// than a generic serde error.
fn validate_shape(value: &Value) -> Result<(), SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::Shape("message is not a JSON object".into()))?;

    if !obj.contains_key("payload") {
        return Err(SchemaError::Shape("missing 'payload' field".into()));
    }

    let route = obj
        .get("route")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::Shape("missing or invalid 'route' object".into()))?;

    let steps = route
        .get("steps")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError::Shape("'route.steps' must be an array".into()))?;
    if !steps.iter().all(Value::is_string) {
        return Err(SchemaError::Shape("'route.steps' must contain only strings".into()));
    }

    if !route.get("current").map(Value::is_u64).unwrap_or(false) {
        return Err(SchemaError::Shape(
            "'route.current' must be a non-negative integer".into(),
        ));
    }

    Ok(())
}

fn validate_bounds(envelope: &Envelope) -> Result<(), SchemaError> {
    if !envelope.route.in_bounds() {
        return Err(SchemaError::Bounds(format!(
            "route.current ({}) out of bounds for {} step(s)",
            envelope.route.current,
            envelope.route.steps.len()
        )));
    }
    Ok(())
}

/// Validate a single handler output envelope against the route-invariant:
/// the step that produced it must not have moved its own cursor.
///
/// `expected_step` is the step name that was executing when the handler ran.
pub fn validate_output(envelope: &Envelope, expected_step: &str) -> Result<(), SchemaError> {
    validate_bounds(envelope)?;
    match envelope.route.current_step() {
        Some(actual) if actual == expected_step => Ok(()),
        Some(actual) => Err(SchemaError::RouteMismatch {
            expected: expected_step.to_string(),
            actual: actual.to_string(),
        }),
        None => Err(SchemaError::Bounds("route.current out of range".into())),
    }
}

/// Validate a fan-out list of outputs element-wise. On the first failure,
/// the error identifies the offending index as `message[i/N]` (§4.2) and the
/// caller is expected to discard the entire response (all-or-nothing, §9).
pub fn validate_outputs(envelopes: &[Envelope], expected_step: &str) -> Result<(), SchemaError> {
    let n = envelopes.len();
    for (i, envelope) in envelopes.iter().enumerate() {
        if let Err(e) = validate_output(envelope, expected_step) {
            return Err(SchemaError::Indexed {
                index: i,
                total: n,
                source: Box::new(e),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Route;

    fn envelope(steps: &[&str], current: usize) -> Envelope {
        Envelope {
            payload: serde_json::json!(null),
            route: Route {
                steps: steps.iter().map(|s| s.to_string()).collect(),
                current,
                metadata: None,
            },
            job_id: None,
        }
    }

    #[test]
    fn decode_rejects_non_object() {
        let err = decode_envelope(b"\"just a string\"").unwrap_err();
        assert!(matches!(err, SchemaError::Shape(_)));
    }

    #[test]
    fn decode_rejects_missing_payload() {
        let body = br#"{"route":{"steps":["a"],"current":0}}"#;
        let err = decode_envelope(body).unwrap_err();
        assert!(matches!(err, SchemaError::Shape(_)));
    }

    #[test]
    fn decode_rejects_out_of_bounds_current() {
        let body = br#"{"payload":1,"route":{"steps":["a"],"current":5}}"#;
        let err = decode_envelope(body).unwrap_err();
        assert!(matches!(err, SchemaError::Bounds(_)));
    }

    #[test]
    fn decode_accepts_valid_envelope() {
        let body = br#"{"payload":{"x":1},"route":{"steps":["a","b"],"current":0}}"#;
        let env = decode_envelope(body).unwrap();
        assert_eq!(env.route.current_step(), Some("a"));
    }

    #[test]
    fn output_validation_catches_cursor_move() {
        let out = envelope(&["a", "b"], 1);
        let err = validate_output(&out, "a").unwrap_err();
        match err {
            SchemaError::RouteMismatch { expected, actual } => {
                assert_eq!(expected, "a");
                assert_eq!(actual, "b");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn indexed_fan_out_failure_reports_position() {
        let outputs = vec![envelope(&["a", "b"], 0), envelope(&["a", "b"], 1)];
        let err = validate_outputs(&outputs, "a").unwrap_err();
        match err {
            SchemaError::Indexed { index, total, .. } => {
                assert_eq!(index, 1);
                assert_eq!(total, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! Router (C5): given the runtime's response array for one input envelope,
//! decide which queue(s) receive what (§4.5).

use transit_core::{Envelope, ErrorEnvelope, ResponseItem};

/// One publish instruction the sidecar must durably confirm before acking
/// the inbound delivery (§4.5 "publication must use ... publisher confirms").
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub queue: String,
    pub envelope: Envelope,
}

/// An error publish instruction: same shape as [`Publication`] but the body
/// is an error envelope rather than a success envelope.
#[derive(Debug, Clone)]
pub struct ErrorPublication {
    pub queue: String,
    pub error: ErrorEnvelope,
}

/// The router's verdict for one runtime response (§4.5's three-row table).
#[derive(Debug, Clone)]
pub enum RouterDecision {
    /// Route response items to the next step (or the happy-terminal queue,
    /// if any advanced cursor runs off the end of `steps`).
    Advance(Vec<Publication>),
    /// Empty-collapse: publish the original envelope, unchanged, to the
    /// happy-terminal queue.
    HappyTerminal(Publication),
    /// The runtime reported an error; wrap and publish to the error-terminal
    /// queue without advancing `current`.
    ErrorTerminal(ErrorPublication),
}

/// The queue names a router instance needs to know about; one router is
/// constructed per sidecar instance (one step per sidecar, §2).
pub struct RouteTable {
    pub happy_terminal_queue: String,
    pub error_terminal_queue: String,
}

/// Queue name for step index `i` of `steps`. The sidecar's own queue-naming
/// convention is external to this core (§1 out-of-scope); callers needing a
/// different convention substitute their own function — this one simply
/// uses the step name as the queue name, which is what the reference
/// implementation does.
pub fn queue_for_step(steps: &[String], index: usize) -> Option<&str> {
    steps.get(index).map(String::as_str)
}

impl RouteTable {
    /// Apply the router rules (§4.5) to one runtime response.
    pub fn decide(&self, input: &Envelope, response: Vec<ResponseItem>) -> RouterDecision {
        if response.len() == 1 && response[0].is_error() {
            let ResponseItem::Failure(mut err) = response.into_iter().next().unwrap() else {
                unreachable!("checked is_error above");
            };
            if err.original_message.is_none() {
                err.original_message =
                    serde_json::to_value(input).ok();
            }
            return RouterDecision::ErrorTerminal(ErrorPublication {
                queue: self.error_terminal_queue.clone(),
                error: err,
            });
        }

        if response.is_empty() {
            return RouterDecision::HappyTerminal(Publication {
                queue: self.happy_terminal_queue.clone(),
                envelope: input.clone(),
            });
        }

        let mut publications = Vec::with_capacity(response.len());
        for item in response {
            let ResponseItem::Success(mut envelope) = item else {
                // A mixed array (some success, some error) cannot occur from a
                // well-behaved runtime (§4.4 is all-or-nothing), but guard
                // defensively rather than panic on an adversarial response.
                continue;
            };
            if envelope.route.is_last() {
                publications.push(Publication {
                    queue: self.happy_terminal_queue.clone(),
                    envelope,
                });
            } else {
                let new_current = envelope.route.current + 1;
                envelope.route.current = new_current;
                let queue = queue_for_step(&envelope.route.steps, new_current)
                    .unwrap_or(&self.happy_terminal_queue)
                    .to_string();
                publications.push(Publication { queue, envelope });
            }
        }

        RouterDecision::Advance(publications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use transit_core::{ErrorDetails, ErrorKind, Route};

    fn table() -> RouteTable {
        RouteTable {
            happy_terminal_queue: "happy-terminal".into(),
            error_terminal_queue: "error-terminal".into(),
        }
    }

    fn input(steps: &[&str], current: usize) -> Envelope {
        Envelope {
            payload: json!({"x": 1}),
            route: Route {
                steps: steps.iter().map(|s| s.to_string()).collect(),
                current,
                metadata: None,
            },
            job_id: Some("job-1".into()),
        }
    }

    #[test]
    fn echo_happy_path_advances_to_next_queue() {
        let inp = input(&["a", "b"], 0);
        let out = ResponseItem::Success(inp.clone());
        match table().decide(&inp, vec![out]) {
            RouterDecision::Advance(pubs) => {
                assert_eq!(pubs.len(), 1);
                assert_eq!(pubs[0].queue, "b");
                assert_eq!(pubs[0].envelope.route.current, 1);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn fan_out_of_three_preserves_order() {
        let inp = input(&["a", "b"], 0);
        let outs: Vec<ResponseItem> = (1..=3)
            .map(|i| ResponseItem::Success(inp.with_payload(json!({"id": i}))))
            .collect();
        match table().decide(&inp, outs) {
            RouterDecision::Advance(pubs) => {
                assert_eq!(pubs.len(), 3);
                for (i, p) in pubs.iter().enumerate() {
                    assert_eq!(p.envelope.payload, json!({"id": i + 1}));
                    assert_eq!(p.queue, "b");
                }
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn empty_return_publishes_original_to_happy_terminal() {
        let inp = input(&["a", "b"], 0);
        match table().decide(&inp, vec![]) {
            RouterDecision::HappyTerminal(p) => {
                assert_eq!(p.queue, "happy-terminal");
                assert_eq!(p.envelope, inp);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn last_step_advance_goes_to_happy_terminal() {
        let inp = input(&["a"], 0);
        let out = ResponseItem::Success(inp.clone());
        match table().decide(&inp, vec![out]) {
            RouterDecision::Advance(pubs) => {
                assert_eq!(pubs.len(), 1);
                assert_eq!(pubs[0].queue, "happy-terminal");
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn error_response_routes_to_error_terminal_without_advancing() {
        let inp = input(&["a", "b"], 0);
        let err = ResponseItem::Failure(ErrorEnvelope {
            error: ErrorKind::ProcessingError,
            details: Some(ErrorDetails {
                message: "bad".into(),
                r#type: Some("ValueError".into()),
                traceback: None,
            }),
            original_message: None,
        });
        match table().decide(&inp, vec![err]) {
            RouterDecision::ErrorTerminal(p) => {
                assert_eq!(p.queue, "error-terminal");
                let original: Envelope =
                    serde_json::from_value(p.error.original_message.unwrap()).unwrap();
                assert_eq!(original, inp);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }
}

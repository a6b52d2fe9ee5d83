//! Object-storage key computation for terminal persistence (§4.6, §6).

use chrono::{DateTime, Utc};
use transit_core::Route;

/// The "last step" a job passed through before reaching a terminal (§4.6,
/// §11 open-question decision): `steps[current-1]` when `current>0`, else
/// the final element of `steps`, else `"unknown"` when `steps` is empty.
///
/// Tightened from the reference implementation's fallback chain only in
/// that an empty `steps` array resolves to `"unknown"` explicitly rather
/// than indexing a negative or out-of-range position.
pub fn last_step(route: &Route) -> String {
    if route.current > 0 {
        if let Some(step) = route.steps.get(route.current - 1) {
            return step.clone();
        }
    }
    route.steps.last().cloned().unwrap_or_else(|| "unknown".to_string())
}

/// `<prefix>/<YYYY-MM-DD>/<HH>/<last_step>/<job_id>.json`, UTC (§6).
pub fn object_key(prefix: &str, at: DateTime<Utc>, last_step: &str, job_id: &str) -> String {
    format!(
        "{}{}/{}/{}/{}.json",
        prefix,
        at.format("%Y-%m-%d"),
        at.format("%H"),
        last_step,
        job_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn last_step_uses_current_minus_one_when_in_progress() {
        let route = Route { steps: vec!["a".into(), "b".into(), "c".into()], current: 2, metadata: None };
        assert_eq!(last_step(&route), "b");
    }

    #[test]
    fn last_step_falls_back_to_final_step_when_current_is_zero() {
        let route = Route { steps: vec!["a".into(), "b".into()], current: 0, metadata: None };
        assert_eq!(last_step(&route), "b");
    }

    #[test]
    fn last_step_is_unknown_for_empty_steps() {
        let route = Route { steps: vec![], current: 0, metadata: None };
        assert_eq!(last_step(&route), "unknown");
    }

    #[test]
    fn object_key_matches_layout() {
        let at = Utc.with_ymd_and_hms(2026, 7, 28, 14, 30, 0).unwrap();
        let key = object_key("asya-results/", at, "transform", "job-42");
        assert_eq!(key, "asya-results/2026-07-28/14/transform/job-42.json");
    }
}

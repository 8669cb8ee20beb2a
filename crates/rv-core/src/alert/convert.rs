use chrono::{DateTime, Utc};

use crate::eval::EvalState;
use crate::state::StateTransition;

use super::types::{AlertBatch, PostableAlert};

impl AlertBatch {
    /// Alerts to send after processing evaluation results.
    ///
    /// - firing: current state is `Alerting`, `Error` or `NoData`
    /// - resolved: back to `Normal` from a firing state (ends at the
    ///   evaluation time)
    /// - stale: series vanished from results while firing (ends at the
    ///   evaluation time)
    ///
    /// `Pending` and steady `Normal` instances produce nothing.
    pub fn from_transitions(transitions: &[StateTransition], app_url: &str) -> Self {
        let mut alerts = Vec::with_capacity(transitions.len());
        for t in transitions {
            if t.stale {
                if is_firing(t.previous_state) || is_firing(t.state) {
                    alerts.push(to_postable(t, app_url, Some(t.last_evaluated_at)));
                }
                continue;
            }
            match t.state {
                s if is_firing(s) => alerts.push(to_postable(t, app_url, None)),
                EvalState::Normal if is_firing(t.previous_state) => {
                    alerts.push(to_postable(t, app_url, Some(t.last_evaluated_at)))
                }
                _ => {}
            }
        }
        Self { alerts }
    }

    /// Alerts that must be closed because the state behind them was reset
    /// or deleted. Every instance that was neither `Normal` nor `Pending`
    /// before the change is sent with `ends_at = now`.
    pub fn stopped(transitions: &[StateTransition], app_url: &str, now: DateTime<Utc>) -> Self {
        let alerts = transitions
            .iter()
            .filter(|t| !matches!(t.previous_state, EvalState::Normal | EvalState::Pending))
            .map(|t| to_postable(t, app_url, Some(now)))
            .collect();
        Self { alerts }
    }
}

fn is_firing(state: EvalState) -> bool {
    matches!(
        state,
        EvalState::Alerting | EvalState::Error | EvalState::NoData
    )
}

fn to_postable(
    t: &StateTransition,
    app_url: &str,
    ends_at: Option<DateTime<Utc>>,
) -> PostableAlert {
    PostableAlert {
        labels: t.labels.clone(),
        annotations: t.annotations.clone(),
        starts_at: t.starts_at,
        ends_at: ends_at.unwrap_or(t.ends_at),
        generator_url: format!(
            "{app_url}alerting/rule/{}/view?orgId={}",
            t.key.uid, t.key.org_id
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

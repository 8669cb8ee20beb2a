use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use rv_core::alert::AlertBatch;
use rv_core::eval::{EvalContext, EvalResults};
use rv_core::state::StateTransition;
use rv_core::{Fingerprint, RuleKey};

use crate::cancel::CancelScope;
use crate::metrics::OrgMetrics;

use super::task_types::{EvaluationRequest, SupervisorContext};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Where an evaluation error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The evaluator could not be built or the backend call itself failed.
    Backend,
    /// Every errored series was marked retryable.
    RetryableResults,
    /// At least one errored series was not retryable.
    NonRetryableResults,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::NonRetryableResults)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalFailure {
    pub class: FailureClass,
    pub detail: String,
}

/// What the supervisor should do after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Results went through the state manager (and possibly the sender).
    Applied,
    /// Transient failure on a non-final attempt; nothing was applied.
    Retry,
    /// The supervisor was stopped mid-evaluation; nothing was applied.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub results: EvalResults,
    pub error: Option<EvalFailure>,
    pub duration: Duration,
    pub disposition: Disposition,
}

impl EvaluationOutcome {
    fn cancelled(duration: Duration) -> Self {
        Self {
            results: EvalResults::default(),
            error: None,
            duration,
            disposition: Disposition::Cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// EvalExecutor -- one attempt: evaluate, classify, apply
// ---------------------------------------------------------------------------

pub(super) struct EvalExecutor {
    key: RuleKey,
    ctx: Arc<SupervisorContext>,
    scope: CancelScope,
    metrics: Option<Arc<OrgMetrics>>,
}

impl EvalExecutor {
    pub(super) fn new(key: RuleKey, ctx: Arc<SupervisorContext>, scope: CancelScope) -> Self {
        let metrics = ctx.metrics.as_ref().map(|m| m.for_org(key.org_id));
        Self {
            key,
            ctx,
            scope,
            metrics,
        }
    }

    pub(super) fn metrics(&self) -> Option<&OrgMetrics> {
        self.metrics.as_deref()
    }

    /// Run one attempt of `req`.
    ///
    /// On a non-final attempt a backend failure or an all-retryable result
    /// set returns [`Disposition::Retry`] without touching state. Anything
    /// else, including failures on the final attempt, is applied.
    pub(super) async fn evaluate(
        &self,
        req: &EvaluationRequest,
        fingerprint: Fingerprint,
        attempt: u32,
        is_final: bool,
    ) -> EvaluationOutcome {
        let started = Instant::now();
        let eval_ctx = EvalContext {
            key: self.key.clone(),
            scheduled_at: req.scheduled_at,
            previous_results: self.ctx.state_manager.previous_results(&self.key),
        };

        let evaluated = match self
            .ctx
            .evaluator_factory
            .create(&eval_ctx, &req.rule.condition)
        {
            Err(e) => {
                rv_error!(pipe,
                    rule = %self.key,
                    fingerprint = %fingerprint,
                    error = %e,
                    "failed to build rule evaluator"
                );
                Some(Err(e))
            }
            Ok(evaluator) => tokio::select! {
                res = evaluator.evaluate(req.scheduled_at) => Some(res),
                _ = self.scope.cancelled() => None,
            },
        };
        let duration = started.elapsed();

        if let Some(m) = self.metrics() {
            m.inc_eval();
            m.observe_eval(duration);
        }

        let (mut results, backend_error) = match evaluated {
            _ if self.scope.is_cancelled() => {
                rv_debug!(pipe, rule = %self.key, attempt, "evaluation abandoned, supervisor stopped");
                return EvaluationOutcome::cancelled(duration);
            }
            None => return EvaluationOutcome::cancelled(duration),
            Some(Ok(results)) => (results, None),
            Some(Err(e)) => (EvalResults::default(), Some(e.to_string())),
        };

        let error = classify(&results, backend_error.as_deref());
        match &error {
            Some(failure) => {
                if let Some(m) = self.metrics() {
                    m.inc_eval_failure();
                }
                if !is_final && failure.class.is_retryable() {
                    return EvaluationOutcome {
                        results,
                        error,
                        duration,
                        disposition: Disposition::Retry,
                    };
                }
                if results.is_empty() {
                    results = EvalResults::from_error(
                        failure.detail.clone(),
                        req.scheduled_at,
                        duration,
                    );
                }
                rv_warn!(pipe,
                    rule = %self.key,
                    attempt,
                    class = ?failure.class,
                    error = %failure.detail,
                    "rule evaluation failed, applying error results"
                );
            }
            None => {
                rv_debug!(pipe,
                    rule = %self.key,
                    attempt,
                    series = results.len(),
                    duration_ms = duration.as_millis() as u64,
                    "rule evaluated"
                );
            }
        }

        self.apply(req, results.clone()).await;
        EvaluationOutcome {
            results,
            error,
            duration,
            disposition: Disposition::Applied,
        }
    }

    /// Hand results to the state manager and send the resulting alerts.
    async fn apply(&self, req: &EvaluationRequest, results: EvalResults) {
        let settings = &self.ctx.settings;
        let extra_labels = req
            .rule
            .extra_labels(&req.folder_title, settings.include_folder_label);

        let started = Instant::now();
        let transitions = self
            .ctx
            .state_manager
            .process_eval_results(req.scheduled_at, &req.rule, results, extra_labels)
            .await;
        if let Some(m) = self.metrics() {
            m.observe_process(started.elapsed());
        }

        let started = Instant::now();
        let batch = AlertBatch::from_transitions(&transitions, &settings.app_url);
        rv_debug!(pipe,
            rule = %self.key,
            transitions = transitions.len(),
            alerts = batch.len(),
            "results processed"
        );
        if !batch.is_empty() {
            self.ctx.alert_sender.send(&self.key, batch).await;
        }
        if let Some(m) = self.metrics() {
            m.observe_send(started.elapsed());
        }
    }

    /// Resolve every active alert of `transitions` and send them.
    pub(super) async fn send_stopped(&self, transitions: &[StateTransition]) {
        let batch = AlertBatch::stopped(transitions, &self.ctx.settings.app_url, Utc::now());
        if batch.is_empty() {
            return;
        }
        rv_debug!(pipe, rule = %self.key, alerts = batch.len(), "sending resolved alerts");
        self.ctx.alert_sender.send(&self.key, batch).await;
    }
}

fn classify(results: &EvalResults, backend_error: Option<&str>) -> Option<EvalFailure> {
    if let Some(detail) = backend_error {
        return Some(EvalFailure {
            class: FailureClass::Backend,
            detail: detail.to_string(),
        });
    }
    let detail = results.error()?;
    let class = if results.has_non_retryable_errors() {
        FailureClass::NonRetryableResults
    } else {
        FailureClass::RetryableResults
    };
    Some(EvalFailure { class, detail })
}

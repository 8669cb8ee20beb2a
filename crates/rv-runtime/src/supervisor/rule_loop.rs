use std::sync::Arc;

use tracing::Instrument;

use rv_core::state::StateReason;
use rv_core::{Fingerprint, RuleKey, fingerprint};

use crate::cancel::{CancelScope, StopReason};

use super::executor::{Disposition, EvalExecutor};
use super::inbox::Inbox;
use super::task_types::{EvaluationRequest, SupervisorContext, UpdateNotice};

// ---------------------------------------------------------------------------
// RuleLoop -- runtime state for one rule supervisor
// ---------------------------------------------------------------------------

/// Holds all mutable state of one supervisor loop.
///
/// `current_fingerprint` and `evaluation_in_progress` are owned by the loop
/// and never shared, so they need no synchronization.
pub(super) struct RuleLoop {
    key: RuleKey,
    ctx: Arc<SupervisorContext>,
    scope: CancelScope,
    eval_inbox: Arc<Inbox<EvaluationRequest>>,
    update_inbox: Arc<Inbox<UpdateNotice>>,
    executor: EvalExecutor,
    current_fingerprint: Fingerprint,
    evaluation_in_progress: bool,
}

impl RuleLoop {
    pub(super) fn new(
        key: RuleKey,
        ctx: Arc<SupervisorContext>,
        scope: CancelScope,
        eval_inbox: Arc<Inbox<EvaluationRequest>>,
        update_inbox: Arc<Inbox<UpdateNotice>>,
    ) -> Self {
        let executor = EvalExecutor::new(key.clone(), Arc::clone(&ctx), scope.clone());
        Self {
            key,
            ctx,
            scope,
            eval_inbox,
            update_inbox,
            executor,
            current_fingerprint: Fingerprint::ZERO,
            evaluation_in_progress: false,
        }
    }

    /// Serve both inboxes until the scope is cancelled.
    pub(super) async fn run(mut self) {
        rv_debug!(sys, rule = %self.key, "rule supervisor started");

        // Clone the shared handles so the select arms borrow these locals
        // and the handlers are free to take `&mut self`.
        let eval_inbox = Arc::clone(&self.eval_inbox);
        let update_inbox = Arc::clone(&self.update_inbox);
        let scope = self.scope.clone();

        // Stop outranks pending work, and updates outrank evaluations.
        loop {
            tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    self.on_stop().await;
                    break;
                }
                notice = update_inbox.recv() => self.on_update(notice).await,
                req = eval_inbox.recv() => self.on_evaluate(req).await,
            }
        }

        self.eval_inbox.close();
        self.update_inbox.close();
        self.ctx.observer.stop_applied(&self.key);
        rv_debug!(sys, rule = %self.key, "rule supervisor stopped");
    }

    // -- Update path --------------------------------------------------------

    async fn on_update(&mut self, notice: UpdateNotice) {
        if notice.fingerprint == self.current_fingerprint {
            rv_debug!(pipe,
                rule = %self.key,
                fingerprint = %notice.fingerprint,
                "rule definition unchanged, keeping state"
            );
            return;
        }
        rv_info!(pipe,
            rule = %self.key,
            from = %self.current_fingerprint,
            to = %notice.fingerprint,
            paused = notice.is_paused,
            "rule definition changed, clearing state"
        );
        self.reset_state(notice.is_paused).await;
        self.current_fingerprint = notice.fingerprint;
    }

    async fn reset_state(&self, is_paused: bool) {
        let reason = StateReason::for_reset(is_paused);
        let transitions = self
            .ctx
            .state_manager
            .reset_state_by_rule_uid(&self.key, reason)
            .await;
        self.executor.send_stopped(&transitions).await;
    }

    // -- Evaluation path ----------------------------------------------------

    async fn on_evaluate(&mut self, req: EvaluationRequest) {
        if self.evaluation_in_progress {
            rv_debug!(pipe, rule = %self.key, tick = %req.scheduled_at, "evaluation already in progress, skipping");
            return;
        }
        self.evaluation_in_progress = true;
        self.run_attempts(&req).await;
        self.evaluation_in_progress = false;
        self.ctx.observer.eval_applied(&self.key, req.scheduled_at);
    }

    /// Up to `max_attempts` evaluations of one request, spaced by
    /// `retry_delay`. Returns early once an attempt is applied, the rule is
    /// paused, or the scope is cancelled.
    async fn run_attempts(&mut self, req: &EvaluationRequest) {
        let max_attempts = self.ctx.settings.max_attempts.max(1);
        let retry_delay = self.ctx.settings.retry_delay;
        let rule = &req.rule;

        for attempt in 1..=max_attempts {
            let fp = fingerprint(rule, &req.folder_title);
            let current = self.current_fingerprint;
            let changed = !current.is_zero() && current != fp;
            let first_seen_paused = current.is_zero() && rule.is_paused;
            if changed || first_seen_paused {
                rv_info!(pipe,
                    rule = %self.key,
                    from = %current,
                    to = %fp,
                    paused = rule.is_paused,
                    "rule definition changed before evaluation, clearing state"
                );
                self.reset_state(rule.is_paused).await;
            }
            self.current_fingerprint = fp;

            if rule.is_paused {
                rv_debug!(pipe, rule = %self.key, "rule is paused, skipping evaluation");
                return;
            }
            if self.scope.is_cancelled() {
                rv_debug!(pipe, rule = %self.key, attempt, "supervisor stopped, skipping evaluation");
                return;
            }

            let is_final = attempt == max_attempts;
            let span = tracing::info_span!(
                "rule_execution",
                rule_uid = %rule.uid,
                org_id = rule.org_id,
                rule_version = rule.version,
                rule_fingerprint = %fp,
                tick = %req.scheduled_at.to_rfc3339(),
                attempt,
            );
            let outcome = self
                .executor
                .evaluate(req, fp, attempt, is_final)
                .instrument(span)
                .await;

            match outcome.disposition {
                Disposition::Applied => {
                    let exhausted = attempt > 1
                        && outcome.error.as_ref().is_some_and(|e| e.class.is_retryable());
                    if exhausted {
                        if let Some(m) = self.executor.metrics() {
                            m.inc_eval_exhausted();
                        }
                        rv_warn!(pipe, rule = %self.key, attempts = attempt, "evaluation retries exhausted");
                    }
                    return;
                }
                Disposition::Cancelled => return,
                Disposition::Retry => {}
            }

            rv_warn!(pipe,
                rule = %self.key,
                attempt,
                max_attempts,
                error = outcome.error.as_ref().map(|e| e.detail.as_str()).unwrap_or(""),
                "rule evaluation failed, retrying"
            );
            tokio::select! {
                _ = self.scope.cancelled() => {
                    rv_debug!(pipe, rule = %self.key, attempt, "supervisor stopped during retry backoff");
                    return;
                }
                _ = tokio::time::sleep(retry_delay) => {}
            }
        }
    }

    // -- Stop path ----------------------------------------------------------

    async fn on_stop(&self) {
        match self.scope.cause() {
            Some(StopReason::RuleDeleted) => {
                let timeout = self.ctx.settings.cleanup_timeout;
                let cleanup = async {
                    let transitions = self
                        .ctx
                        .state_manager
                        .delete_state_by_rule_uid(&self.key, StateReason::RuleDeleted)
                        .await;
                    self.executor.send_stopped(&transitions).await;
                    transitions.len()
                };
                match tokio::time::timeout(timeout, cleanup).await {
                    Ok(n) => {
                        rv_info!(sys, rule = %self.key, transitions = n, "rule deleted, state cleared")
                    }
                    Err(_) => rv_warn!(sys,
                        rule = %self.key,
                        timeout_ms = timeout.as_millis() as u64,
                        "state cleanup timed out after rule deletion"
                    ),
                }
            }
            cause => {
                let cause = cause.unwrap_or(StopReason::Shutdown);
                rv_debug!(sys, rule = %self.key, reason = %cause, "stopping, state retained");
            }
        }
    }
}

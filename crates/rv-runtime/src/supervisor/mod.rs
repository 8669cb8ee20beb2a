mod executor;
mod inbox;
mod rule_loop;
mod task_types;


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use orion_error::prelude::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rv_core::{RuleKey, RuleSnapshot, fingerprint};

use crate::cancel::{CancelScope, StopReason};
use crate::error::{RuntimeReason, RuntimeResult};

pub use executor::{Disposition, EvalFailure, EvaluationOutcome, FailureClass};
pub use task_types::{
    EvalObserver, EvaluationRequest, NoopObserver, SupervisorContext, SupervisorSettings,
};

use inbox::Inbox;
use task_types::UpdateNotice;

// ---------------------------------------------------------------------------
// SupervisorHandle -- the caller-facing side of one rule supervisor
// ---------------------------------------------------------------------------

/// Cheap, cloneable handle to one rule's supervisor.
///
/// Callers hand work to the supervisor through two single-slot inboxes and
/// never wait on it: a newer request replaces one that has not been picked
/// up yet. The loop itself is started with [`SupervisorHandle::spawn`] or
/// [`SupervisorHandle::run`], at most once per handle family.
#[derive(Clone)]
pub struct SupervisorHandle {
    key: RuleKey,
    scope: CancelScope,
    eval_inbox: Arc<Inbox<EvaluationRequest>>,
    update_inbox: Arc<Inbox<UpdateNotice>>,
    started: Arc<AtomicBool>,
}

impl SupervisorHandle {
    /// New idle supervisor, stopped together with `parent`.
    pub fn new(key: RuleKey, parent: &CancellationToken) -> Self {
        Self {
            key,
            scope: CancelScope::child_of(parent),
            eval_inbox: Arc::new(Inbox::new()),
            update_inbox: Arc::new(Inbox::new()),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn key(&self) -> &RuleKey {
        &self.key
    }

    /// Queue an evaluation.
    ///
    /// Returns whether `req` was accepted, plus the older request it
    /// displaced (if the loop had not picked that one up yet). Draining the
    /// old request and storing the new one happen under one lock, so
    /// concurrent callers each get back exactly what they displaced.
    ///
    /// Acceptance does not promise an `eval_applied` callback. A request
    /// still waiting in the inbox when the supervisor stops is discarded
    /// with it, so dispatchers must not block on that callback once they
    /// have called [`stop`](Self::stop).
    pub fn request_evaluation(
        &self,
        req: EvaluationRequest,
    ) -> (bool, Option<EvaluationRequest>) {
        if self.scope.is_cancelled() {
            return (false, self.eval_inbox.try_take());
        }
        match self.eval_inbox.offer(req) {
            Ok(dropped) => (true, dropped),
            Err(_) => (false, None),
        }
    }

    /// Tell the supervisor the rule definition may have changed.
    ///
    /// Returns `false` once the supervisor is stopped.
    pub fn notify_update(&self, rule: &RuleSnapshot, folder_title: &str) -> bool {
        if self.scope.is_cancelled() {
            return false;
        }
        let notice = UpdateNotice {
            fingerprint: fingerprint(rule, folder_title),
            is_paused: rule.is_paused,
        };
        self.update_inbox.offer(notice).is_ok()
    }

    /// Ask the loop to terminate. Idempotent; the first reason wins.
    pub fn stop(&self, reason: StopReason) {
        self.scope.cancel(reason);
    }

    pub fn is_stopped(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Run the supervisor loop until stopped.
    ///
    /// Fails if a loop was already started for this handle or a clone of it.
    pub async fn run(self, ctx: Arc<SupervisorContext>) -> RuntimeResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(StructError::from(RuntimeReason::Supervisor)
                .with_detail(format!("supervisor for rule {} is already running", self.key)));
        }
        rule_loop::RuleLoop::new(
            self.key,
            ctx,
            self.scope,
            self.eval_inbox,
            self.update_inbox,
        )
        .run()
        .await;
        Ok(())
    }

    /// Spawn [`SupervisorHandle::run`] on the current runtime.
    pub fn spawn(&self, ctx: Arc<SupervisorContext>) -> JoinHandle<RuntimeResult<()>> {
        tokio::spawn(self.clone().run(ctx))
    }
}

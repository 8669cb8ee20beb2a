//! Collaborators the supervisor drives but does not implement.
//!
//! The evaluator engine, the alert state manager and the notification
//! transport live outside this workspace; they plug in through these traits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::alert::AlertBatch;
use crate::error::CoreResult;
use crate::eval::{EvalContext, EvalResults};
use crate::rule::{Condition, RuleKey, RuleSnapshot};
use crate::state::{StateReason, StateTransition};

/// Builds a runnable evaluator for a rule condition.
pub trait EvaluatorFactory: Send + Sync {
    fn create(
        &self,
        ctx: &EvalContext,
        condition: &Condition,
    ) -> CoreResult<Box<dyn ConditionEvaluator>>;
}

/// A compiled condition, ready to run against a point in time.
///
/// An `Err` means the evaluation backend itself failed (transport, remote
/// expression pipeline). Per-series problems are reported inside
/// [`EvalResults`] instead.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn evaluate(&self, at: DateTime<Utc>) -> CoreResult<EvalResults>;
}

/// Owner of per-rule alert state.
#[async_trait]
pub trait StateManager: Send + Sync {
    /// Last processed results for the rule, used as evaluation history.
    fn previous_results(&self, key: &RuleKey) -> EvalResults;

    /// Fold a fresh result set into the rule's state.
    async fn process_eval_results(
        &self,
        evaluated_at: DateTime<Utc>,
        rule: &RuleSnapshot,
        results: EvalResults,
        extra_labels: BTreeMap<String, String>,
    ) -> Vec<StateTransition>;

    /// Clear the rule's state after a definition change or a pause.
    async fn reset_state_by_rule_uid(
        &self,
        key: &RuleKey,
        reason: StateReason,
    ) -> Vec<StateTransition>;

    /// Drop every trace of the rule's state after it was deleted.
    async fn delete_state_by_rule_uid(
        &self,
        key: &RuleKey,
        reason: StateReason,
    ) -> Vec<StateTransition>;
}

/// Notification transport.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, key: &RuleKey, batch: AlertBatch);
}

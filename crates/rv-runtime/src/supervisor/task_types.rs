use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use rv_config::SchedulerConfig;
use rv_core::contract::{AlertSender, EvaluatorFactory, StateManager};
use rv_core::{Fingerprint, RuleKey, RuleSnapshot};

use crate::metrics::SchedulerMetrics;

// ---------------------------------------------------------------------------
// Messages -- what travels through the two inboxes
// ---------------------------------------------------------------------------

/// "Evaluate this rule as of `scheduled_at`."
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub rule: Arc<RuleSnapshot>,
    pub scheduled_at: DateTime<Utc>,
    pub folder_title: String,
}

/// "The rule's definition is now `fingerprint`, paused or not."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UpdateNotice {
    pub fingerprint: Fingerprint,
    pub is_paused: bool,
}

// ---------------------------------------------------------------------------
// EvalObserver -- bookkeeping hooks for the dispatcher
// ---------------------------------------------------------------------------

/// Callbacks fired by the supervisor loop. Both default to no-ops.
pub trait EvalObserver: Send + Sync {
    /// One evaluation request has been fully handled (applied, skipped
    /// because paused, or given up after retries).
    fn eval_applied(&self, _key: &RuleKey, _scheduled_at: DateTime<Utc>) {}

    /// The supervisor loop has terminated.
    fn stop_applied(&self, _key: &RuleKey) {}
}

/// Observer that ignores every callback.
pub struct NoopObserver;

impl EvalObserver for NoopObserver {}

// ---------------------------------------------------------------------------
// SupervisorSettings / SupervisorContext -- shared by every supervisor
// ---------------------------------------------------------------------------

/// Resolved scheduler knobs.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub cleanup_timeout: Duration,
    pub app_url: String,
    pub include_folder_label: bool,
}

impl SupervisorSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay.as_duration(),
            cleanup_timeout: config.cleanup_timeout.as_duration(),
            app_url: config.app_url.clone(),
            include_folder_label: !config.disable_folder_label,
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// Collaborators and settings every supervisor needs to run.
pub struct SupervisorContext {
    pub evaluator_factory: Arc<dyn EvaluatorFactory>,
    pub state_manager: Arc<dyn StateManager>,
    pub alert_sender: Arc<dyn AlertSender>,
    pub observer: Arc<dyn EvalObserver>,
    pub metrics: Option<Arc<SchedulerMetrics>>,
    pub settings: SupervisorSettings,
}

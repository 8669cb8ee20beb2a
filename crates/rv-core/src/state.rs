use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eval::EvalState;
use crate::rule::RuleKey;

/// Why a rule's accumulated state was cleared outside of normal evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateReason {
    Updated,
    Paused,
    RuleDeleted,
}

impl StateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "Updated",
            Self::Paused => "Paused",
            Self::RuleDeleted => "RuleDeleted",
        }
    }

    /// `Paused` when the rule is paused, `Updated` otherwise.
    pub fn for_reset(is_paused: bool) -> Self {
        if is_paused { Self::Paused } else { Self::Updated }
    }
}

impl fmt::Display for StateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert instance moving from `previous_state` to `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub key: RuleKey,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub state: EvalState,
    pub previous_state: EvalState,
    pub reason: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub last_evaluated_at: DateTime<Utc>,
    /// The series disappeared from the latest results and the state expired.
    #[serde(default)]
    pub stale: bool,
}


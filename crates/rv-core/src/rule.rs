use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label attached to every result: the rule UID.
pub const RULE_UID_LABEL: &str = "__alert_rule_uid__";
/// Label attached to every result: the namespace (folder) UID.
pub const NAMESPACE_UID_LABEL: &str = "__alert_rule_namespace_uid__";
/// Label attached to every result: the rule title.
pub const ALERT_NAME_LABEL: &str = "alertname";
/// Label carrying the folder title, unless disabled by configuration.
pub const FOLDER_TITLE_LABEL: &str = "grafana_folder";

// ---------------------------------------------------------------------------
// RuleKey
// ---------------------------------------------------------------------------

/// Identifies a rule: organization + rule UID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    pub org_id: i64,
    pub uid: String,
}

impl RuleKey {
    pub fn new(org_id: i64, uid: impl Into<String>) -> Self {
        Self {
            org_id,
            uid: uid.into(),
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org_id, self.uid)
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// One query feeding a rule condition. The `model` is opaque to the
/// scheduler and only matters to the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertQuery {
    pub ref_id: String,
    #[serde(default)]
    pub query_type: String,
    pub datasource_uid: String,
    /// Relative time range `(from, to)` as offsets before the evaluation time.
    #[serde(default)]
    pub relative_range: (Duration, Duration),
    pub model: serde_json::Value,
}

/// The evaluable part of a rule: the queries plus the ref id of the one
/// whose result decides the alert state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub ref_id: String,
    pub queries: Vec<AlertQuery>,
}

/// State to assume when a query returns no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoDataState {
    Alerting,
    #[default]
    NoData,
    Ok,
}

impl NoDataState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alerting => "Alerting",
            Self::NoData => "NoData",
            Self::Ok => "OK",
        }
    }
}

/// State to assume when evaluation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecErrState {
    Alerting,
    #[default]
    Error,
    Ok,
}

impl ExecErrState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alerting => "Alerting",
            Self::Error => "Error",
            Self::Ok => "OK",
        }
    }
}

// ---------------------------------------------------------------------------
// RuleSnapshot
// ---------------------------------------------------------------------------

/// Immutable copy of a rule definition taken when a tick or an update was
/// issued. Shared read-only between the dispatcher, the supervisor and the
/// executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub org_id: i64,
    pub uid: String,
    pub title: String,
    pub namespace_uid: String,
    pub rule_group: String,
    /// Object revision. Not part of the fingerprint.
    pub version: i64,
    pub interval_seconds: i64,
    pub is_paused: bool,
    pub condition: Condition,
    #[serde(default)]
    pub no_data_state: NoDataState,
    #[serde(default)]
    pub exec_err_state: ExecErrState,
    #[serde(default)]
    pub for_duration: Duration,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Last modification time. Not part of the fingerprint.
    pub updated_at: DateTime<Utc>,
}

impl RuleSnapshot {
    pub fn key(&self) -> RuleKey {
        RuleKey::new(self.org_id, self.uid.clone())
    }

    /// Labels the scheduler attaches to every result of this rule.
    pub fn extra_labels(
        &self,
        folder_title: &str,
        include_folder: bool,
    ) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(NAMESPACE_UID_LABEL.to_string(), self.namespace_uid.clone());
        labels.insert(RULE_UID_LABEL.to_string(), self.uid.clone());
        labels.insert(ALERT_NAME_LABEL.to_string(), self.title.clone());
        if include_folder {
            labels.insert(FOLDER_TITLE_LABEL.to_string(), folder_title.to_string());
        }
        labels
    }
}

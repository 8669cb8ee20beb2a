use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::RuleKey;

/// State of one result series (and, after processing, of one alert instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalState {
    Normal,
    Pending,
    Alerting,
    NoData,
    Error,
}

impl fmt::Display for EvalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normal => "Normal",
            Self::Pending => "Pending",
            Self::Alerting => "Alerting",
            Self::NoData => "NoData",
            Self::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Error attached to a single result series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultError {
    pub message: String,
    /// Transient failure (e.g. datasource timeout) that a later attempt may fix.
    pub retryable: bool,
}

/// Result of evaluating the condition for one label set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub instance: BTreeMap<String, String>,
    pub state: EvalState,
    pub error: Option<ResultError>,
    pub evaluated_at: DateTime<Utc>,
    pub evaluation_duration: Duration,
}

/// All series produced by one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalResults(pub Vec<EvalResult>);

impl EvalResults {
    /// Synthesize a single `Error` result when the backend failed before
    /// producing any series.
    pub fn from_error(
        message: impl Into<String>,
        evaluated_at: DateTime<Utc>,
        evaluation_duration: Duration,
    ) -> Self {
        Self(vec![EvalResult {
            instance: BTreeMap::new(),
            state: EvalState::Error,
            error: Some(ResultError {
                message: message.into(),
                retryable: false,
            }),
            evaluated_at,
            evaluation_duration,
        }])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvalResult> {
        self.0.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|r| r.error.is_some())
    }

    pub fn has_non_retryable_errors(&self) -> bool {
        self.0
            .iter()
            .any(|r| r.error.as_ref().is_some_and(|e| !e.retryable))
    }

    /// All per-series error messages joined with `"; "`, or `None` when the
    /// results are clean.
    pub fn error(&self) -> Option<String> {
        let messages: Vec<&str> = self
            .0
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| e.message.as_str()))
            .collect();
        if messages.is_empty() {
            None
        } else {
            Some(messages.join("; "))
        }
    }
}

impl From<Vec<EvalResult>> for EvalResults {
    fn from(v: Vec<EvalResult>) -> Self {
        Self(v)
    }
}

/// Context handed to the evaluator factory for one attempt.
///
/// `previous_results` carries the last processed results of the rule so that
/// stateful conditions see their history across ticks.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub key: RuleKey,
    pub scheduled_at: DateTime<Utc>,
    pub previous_results: EvalResults,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(error: Option<ResultError>) -> EvalResult {
        EvalResult {
            instance: BTreeMap::new(),
            state: if error.is_some() {
                EvalState::Error
            } else {
                EvalState::Normal
            },
            error,
            evaluated_at: DateTime::from_timestamp(0, 0).unwrap(),
            evaluation_duration: Duration::from_millis(5),
        }
    }

    fn err(message: &str, retryable: bool) -> Option<ResultError> {
        Some(ResultError {
            message: message.into(),
            retryable,
        })
    }

    #[test]
    fn clean_results() {
        let results = EvalResults(vec![result(None), result(None)]);
        assert!(!results.has_errors());
        assert!(!results.has_non_retryable_errors());
        assert_eq!(results.error(), None);
    }

    #[test]
    fn retryable_only() {
        let results = EvalResults(vec![result(None), result(err("timeout", true))]);
        assert!(results.has_errors());
        assert!(!results.has_non_retryable_errors());
        assert_eq!(results.error().as_deref(), Some("timeout"));
    }

    #[test]
    fn mixed_errors_count_as_non_retryable() {
        let results = EvalResults(vec![
            result(err("timeout", true)),
            result(err("bad query", false)),
        ]);
        assert!(results.has_non_retryable_errors());
        assert_eq!(results.error().as_deref(), Some("timeout; bad query"));
    }

    #[test]
    fn from_error_builds_single_error_series() {
        let at = DateTime::from_timestamp(100, 0).unwrap();
        let results = EvalResults::from_error("backend down", at, Duration::from_secs(1));
        assert_eq!(results.len(), 1);
        assert_eq!(results.0[0].state, EvalState::Error);
        assert_eq!(results.0[0].evaluated_at, at);
        assert!(results.has_non_retryable_errors());
    }
}

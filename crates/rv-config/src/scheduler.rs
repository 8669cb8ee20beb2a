use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

/// Per-rule supervisor settings (`[scheduler]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Evaluation attempts per tick before giving up (>= 1).
    pub max_attempts: u32,
    /// Fixed wait between two attempts of the same tick.
    pub retry_delay: HumanDuration,
    /// Ceiling for the state cleanup that runs after a rule is deleted.
    pub cleanup_timeout: HumanDuration,
    /// Base URL used to build alert generator links. Must end with `/`.
    pub app_url: String,
    /// Do not attach the folder title as an extra label on evaluation results.
    pub disable_folder_label: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1).into(),
            cleanup_timeout: Duration::from_secs(60).into(),
            app_url: "http://localhost:3000/".to_string(),
            disable_folder_label: false,
        }
    }
}

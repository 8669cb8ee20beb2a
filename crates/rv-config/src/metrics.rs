use serde::Deserialize;

/// Scheduler metrics settings.
///
/// When disabled, no metrics store is built and supervisors skip all
/// counter/histogram updates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
}

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::metrics::MetricsConfig;
use crate::scheduler::SchedulerConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// RulevisorConfig (resolved, validated)
// ---------------------------------------------------------------------------

/// Top-level `rulevisor.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulevisorConfig {
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

impl RulevisorConfig {
    /// Read and parse a `rulevisor.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for RulevisorConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a validated [`RulevisorConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: RulevisorConfig = toml::from_str(toml_str)?;
        validate::validate(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::io::Write;
    use std::time::Duration;

    const FULL_TOML: &str = r#"
[scheduler]
max_attempts = 5
retry_delay = "250ms"
cleanup_timeout = "30s"
app_url = "https://alerts.example.com/"
disable_folder_label = true

[logging]
level = "warn"
format = "json"
file = "logs/rulevisor.log"

[logging.modules]
"rv_runtime::supervisor" = "debug"

[metrics]
enabled = true
"#;

    #[test]
    fn load_full_toml() {
        let cfg: RulevisorConfig = FULL_TOML.parse().unwrap();

        assert_eq!(cfg.scheduler.max_attempts, 5);
        assert_eq!(
            cfg.scheduler.retry_delay.as_duration(),
            Duration::from_millis(250)
        );
        assert_eq!(
            cfg.scheduler.cleanup_timeout.as_duration(),
            Duration::from_secs(30)
        );
        assert_eq!(cfg.scheduler.app_url, "https://alerts.example.com/");
        assert!(cfg.scheduler.disable_folder_label);

        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(
            cfg.logging.directives(),
            "warn,rv_runtime::supervisor=debug"
        );
        assert!(cfg.metrics.enabled);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: RulevisorConfig = "".parse().unwrap();
        assert_eq!(cfg.scheduler.max_attempts, 3);
        assert_eq!(
            cfg.scheduler.retry_delay.as_duration(),
            Duration::from_secs(1)
        );
        assert_eq!(
            cfg.scheduler.cleanup_timeout.as_duration(),
            Duration::from_secs(60)
        );
        assert!(!cfg.scheduler.disable_folder_label);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Plain);
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn partial_scheduler_section_keeps_other_defaults() {
        let cfg: RulevisorConfig = "[scheduler]\nmax_attempts = 1\n".parse().unwrap();
        assert_eq!(cfg.scheduler.max_attempts, 1);
        assert_eq!(cfg.scheduler.app_url, "http://localhost:3000/");
    }

    #[test]
    fn reject_zero_attempts() {
        let toml = FULL_TOML.replace("max_attempts = 5", "max_attempts = 0");
        assert!(toml.parse::<RulevisorConfig>().is_err());
    }

    #[test]
    fn reject_zero_cleanup_timeout() {
        let toml = FULL_TOML.replace("cleanup_timeout = \"30s\"", "cleanup_timeout = \"0s\"");
        assert!(toml.parse::<RulevisorConfig>().is_err());
    }

    #[test]
    fn reject_app_url_without_trailing_slash() {
        let toml = FULL_TOML.replace(
            "https://alerts.example.com/",
            "https://alerts.example.com",
        );
        assert!(toml.parse::<RulevisorConfig>().is_err());
    }

    #[test]
    fn reject_bad_duration() {
        let toml = FULL_TOML.replace("retry_delay = \"250ms\"", "retry_delay = \"soon\"");
        assert!(toml.parse::<RulevisorConfig>().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_TOML.as_bytes()).unwrap();
        let cfg = RulevisorConfig::load(file.path()).unwrap();
        assert_eq!(cfg.scheduler.max_attempts, 5);
    }

    #[test]
    fn load_missing_file_fails() {
        let err = RulevisorConfig::load("/nonexistent/rulevisor.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}

use crate::config::RulevisorConfig;

/// Internal validation, called automatically during `RulevisorConfig::from_str` / `load`.
pub(crate) fn validate(config: &RulevisorConfig) -> anyhow::Result<()> {
    let scheduler = &config.scheduler;

    if scheduler.max_attempts == 0 {
        anyhow::bail!("scheduler.max_attempts must be >= 1");
    }

    // A zero ceiling would abort every cleanup before it starts.
    if scheduler.cleanup_timeout.is_zero() {
        anyhow::bail!("scheduler.cleanup_timeout must be > 0");
    }

    if !scheduler.app_url.ends_with('/') {
        anyhow::bail!(
            "scheduler.app_url must end with \"/\", got {:?}",
            scheduler.app_url,
        );
    }

    if config.logging.level.trim().is_empty() {
        anyhow::bail!("logging.level must not be empty");
    }

    Ok(())
}

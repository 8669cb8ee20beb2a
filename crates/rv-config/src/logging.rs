use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Logging configuration. All fields have defaults so the entire `[logging]`
/// section may be omitted from `rulevisor.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level filter (e.g. `"info"`, `"debug"`).
    pub level: String,
    /// Per-module level overrides, e.g. `{ "rv_runtime::supervisor" = "debug" }`.
    pub modules: HashMap<String, String>,
    /// Optional file path for log output. Relative paths are resolved against
    /// the config file's parent directory.
    pub file: Option<PathBuf>,
    /// Output format: `plain` (human-readable) or `json` (structured).
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Render the level plus module overrides as an `EnvFilter` directive
    /// string, e.g. `info,rv_runtime::supervisor=debug`.
    ///
    /// Module overrides are emitted in sorted order.
    pub fn directives(&self) -> String {
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        let mut out = self.level.clone();
        for (module, level) in modules {
            out.push(',');
            out.push_str(module);
            out.push('=');
            out.push_str(level);
        }
        out
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            modules: HashMap::new(),
            file: None,
            format: LogFormat::Plain,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

pub mod config;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod types;
mod validate;

pub use config::RulevisorConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use metrics::MetricsConfig;
pub use scheduler::SchedulerConfig;
pub use types::HumanDuration;

#[macro_use]
mod log_macros;

pub mod cancel;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod supervisor;
pub mod tracing_init;

pub use cancel::StopReason;
pub use registry::SupervisorRegistry;
pub use supervisor::{SupervisorContext, SupervisorHandle};

pub mod alert;
pub mod contract;
pub mod error;
pub mod eval;
pub mod fingerprint;
pub mod rule;
pub mod state;

pub use fingerprint::{Fingerprint, fingerprint};
pub use rule::{RuleKey, RuleSnapshot};

mod convert;
mod types;

pub use types::{AlertBatch, PostableAlert};

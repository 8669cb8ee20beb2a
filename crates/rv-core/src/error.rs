use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("evaluator build error")]
    EvaluatorBuild,
    #[error("rule evaluation error")]
    Evaluation,
    #[error("state manager error")]
    StateManager,
    #[error("alert send error")]
    AlertSend,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::EvaluatorBuild => 1001,
            Self::Evaluation => 1002,
            Self::StateManager => 1003,
            Self::AlertSend => 1004,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;

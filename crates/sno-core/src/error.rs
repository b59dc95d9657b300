use sno_economics::{AccountAddress, EconomicsError};
use sno_governance::GovernanceError;
use sno_jobs::JobError;
use sno_storage::StorageError;
use sno_types::ErrorKind;
use sno_validators::ValidatorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Caller {caller} may not {action}")]
    Unauthorized {
        caller: AccountAddress,
        action: &'static str,
    },

    #[error(transparent)]
    Economics(#[from] EconomicsError),

    #[error(transparent)]
    Validator(#[from] ValidatorError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error("State store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Unauthorized { .. } => ErrorKind::Unauthorized,
            CoreError::Economics(e) => e.kind(),
            CoreError::Validator(e) => e.kind(),
            CoreError::Job(e) => e.kind(),
            CoreError::Governance(e) => e.kind(),
            CoreError::Storage(e) => e.kind(),
            CoreError::Config(_) => ErrorKind::PolicyViolation,
        }
    }
}

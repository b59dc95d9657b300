use sno_economics::{AccountAddress, EconomicsError, TokenAmount};
use sno_types::{ErrorKind, ValidatorId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ValidatorError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("Owner {owner} already holds active validator {existing}")]
    DuplicateValidator {
        owner: AccountAddress,
        existing: ValidatorId,
    },

    #[error("Insufficient stake: offered {offered}, minimum {min_stake}, available balance {available}")]
    InsufficientStake {
        offered: TokenAmount,
        min_stake: TokenAmount,
        available: TokenAmount,
    },

    #[error("Unlocking {requested} would leave validator {validator_id} at {remaining}, below minimum {min_stake}, with {pending_jobs} pending job(s)")]
    StakeBelowMinimum {
        validator_id: ValidatorId,
        requested: TokenAmount,
        remaining: TokenAmount,
        min_stake: TokenAmount,
        pending_jobs: usize,
    },

    #[error("Validator {validator_id} has {locked} locked, cannot unlock {requested}")]
    InsufficientLocked {
        validator_id: ValidatorId,
        locked: TokenAmount,
        requested: TokenAmount,
    },

    #[error("Unknown validator: {0}")]
    UnknownValidator(ValidatorId),

    #[error("Caller {caller} does not own validator {validator_id}")]
    NotOwner {
        validator_id: ValidatorId,
        caller: AccountAddress,
    },

    #[error("Worker {0} is not an active validator")]
    WorkerNotActiveValidator(AccountAddress),

    #[error("Ledger error: {0}")]
    Ledger(#[from] EconomicsError),
}

impl ValidatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidatorError::DuplicateValidator { .. } => ErrorKind::AlreadyExists,
            ValidatorError::InsufficientStake { .. } | ValidatorError::InsufficientLocked { .. } => {
                ErrorKind::InsufficientFunds
            }
            ValidatorError::StakeBelowMinimum { .. } => ErrorKind::InvalidState,
            ValidatorError::UnknownValidator(_) => ErrorKind::NotFound,
            ValidatorError::NotOwner { .. } | ValidatorError::WorkerNotActiveValidator(_) => {
                ErrorKind::Unauthorized
            }
            ValidatorError::Ledger(e) => e.kind(),
        }
    }
}

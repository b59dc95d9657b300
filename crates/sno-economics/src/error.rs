use crate::types::{AccountAddress, TokenAmount};
use sno_types::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EconomicsError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EconomicsError {
    #[error("Insufficient balance for {address}: has {available}, needs {needed}")]
    InsufficientBalance {
        address: AccountAddress,
        available: TokenAmount,
        needed: TokenAmount,
    },

    #[error("Insufficient allowance from {owner} to {spender}: allowed {allowed}, needs {needed}")]
    InsufficientAllowance {
        owner: AccountAddress,
        spender: AccountAddress,
        allowed: TokenAmount,
        needed: TokenAmount,
    },

    #[error("Emission cap exceeded: minting {requested} on supply {total_supply} exceeds epoch ceiling {ceiling}")]
    EmissionCapExceeded {
        requested: TokenAmount,
        total_supply: TokenAmount,
        ceiling: TokenAmount,
    },

    #[error("Arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl EconomicsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EconomicsError::InsufficientBalance { .. }
            | EconomicsError::InsufficientAllowance { .. } => ErrorKind::InsufficientFunds,
            EconomicsError::EmissionCapExceeded { .. }
            | EconomicsError::Overflow(_)
            | EconomicsError::InvalidAmount(_)
            | EconomicsError::InvalidAddress(_) => ErrorKind::PolicyViolation,
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification shared by every component error.
///
/// Each crate keeps its own detailed error enum and maps it onto one of
/// these kinds, so callers can react to the category of a rejection
/// without matching on component-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller lacks the required role or stake
    Unauthorized,
    /// Unknown id or hash
    NotFound,
    /// Operation not valid for the entity's current state
    InvalidState,
    /// Balance, allowance or stake shortfall
    InsufficientFunds,
    /// Duplicate id or hash
    AlreadyExists,
    /// Quorum, emission cap, arity or payload rule violated
    PolicyViolation,
    /// Failure of an external collaborator such as the state store
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::PolicyViolation => "policy_violation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

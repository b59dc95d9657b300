use sno_economics::AccountAddress;
use sno_types::{ErrorKind, ProposalIndex, Timestamp, ValidatorId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GovernanceError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("Caller {0} is not an active validator")]
    Unauthorized(AccountAddress),

    #[error("Validator {0} is not active")]
    NotActiveValidator(ValidatorId),

    #[error("Arity mismatch: {function_types} function types, {encoded_calls} encoded calls")]
    ArityMismatch {
        function_types: usize,
        encoded_calls: usize,
    },

    #[error("Proposal carries no calls")]
    EmptyProposal,

    #[error("Unknown function type {function_type} at position {position}")]
    UnknownFunctionType { position: usize, function_type: u8 },

    #[error("Malformed call at position {position} (function type {function_type}): {reason}")]
    MalformedCall {
        position: usize,
        function_type: u8,
        reason: String,
    },

    #[error("Unknown proposal: {0}")]
    UnknownProposal(ProposalIndex),

    #[error("Proposal {0} already executed")]
    AlreadyExecuted(ProposalIndex),

    #[error("Proposal {index} expired at {expired_at}")]
    ProposalExpired {
        index: ProposalIndex,
        expired_at: Timestamp,
    },

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::Unauthorized(_) | GovernanceError::NotActiveValidator(_) => {
                ErrorKind::Unauthorized
            }
            GovernanceError::ArityMismatch { .. }
            | GovernanceError::EmptyProposal
            | GovernanceError::UnknownFunctionType { .. }
            | GovernanceError::MalformedCall { .. }
            | GovernanceError::Encoding(_) => ErrorKind::PolicyViolation,
            GovernanceError::UnknownProposal(_) => ErrorKind::NotFound,
            GovernanceError::AlreadyExecuted(_) | GovernanceError::ProposalExpired { .. } => {
                ErrorKind::InvalidState
            }
        }
    }
}

pub mod command;
pub mod error;
pub mod governor;
pub mod proposal;

pub use command::{
    CancelJobCall, Command, CompleteJobCall, FunctionType, MatchJobCall, MintTokensCall,
    RemoveValidatorCall, RequestJobCall,
};
pub use error::{GovernanceError, Result};
pub use governor::{
    ApprovalOutcome, CommandExecutor, GovernanceState, GovernorConfig, MultisigGovernor,
    QuorumPolicy,
};
pub use proposal::{Proposal, ProposalStatus};

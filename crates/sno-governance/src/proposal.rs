use crate::command::Command;
use serde::{Deserialize, Serialize};
use sno_types::{LifecycleState, ProposalIndex, Timestamp, ValidatorId};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Collecting approvals
    Open,
    /// Ran once; inert from now on
    Executed,
    /// Time-to-live elapsed before quorum
    Expired,
}

impl LifecycleState for ProposalStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Expired)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use ProposalStatus::*;
        matches!((self, next), (Open, Executed) | (Open, Expired))
    }
}

/// Batched privileged request, executed atomically once quorum is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub index: ProposalIndex,
    pub proposer: ValidatorId,
    pub function_types: Vec<u8>,
    pub encoded_calls: Vec<Vec<u8>>,
    /// Decoded form of `function_types`/`encoded_calls`
    pub commands: Vec<Command>,
    pub approvals: BTreeSet<ValidatorId>,
    pub executed: bool,
    pub created_at: Timestamp,
    pub executed_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
}

impl Proposal {
    pub fn status(&self, now: Timestamp) -> ProposalStatus {
        if self.executed {
            ProposalStatus::Executed
        } else if self.is_expired(now) {
            ProposalStatus::Expired
        } else {
            ProposalStatus::Open
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        !self.executed && self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn has_approved(&self, validator: ValidatorId) -> bool {
        self.approvals.contains(&validator)
    }
}

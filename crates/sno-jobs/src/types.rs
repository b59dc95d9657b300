use serde::{Deserialize, Serialize};
use sno_economics::AccountAddress;
use sno_types::{JobId, LifecycleState, Timestamp, UserHash};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_hash: UserHash,
    pub address: AccountAddress,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted from a user, waiting for a matching proposal
    Requested,
    /// Worker set recorded by governance
    Matched,
    /// Finalized and paid out
    Completed,
    /// Withdrawn by governance, no payout
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Requested => "Requested",
            JobStatus::Matched => "Matched",
            JobStatus::Completed => "Completed",
            JobStatus::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

impl LifecycleState for JobStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Requested, Matched) | (Matched, Completed) | (Requested, Cancelled) | (Matched, Cancelled)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub requester_hash: UserHash,
    pub status: JobStatus,
    pub capacity_requested: Vec<u128>,
    pub assigned_workers: BTreeSet<AccountAddress>,
    pub created_at: Timestamp,
    pub matched_at: Option<Timestamp>,
    /// Completion or cancellation time
    pub closed_at: Option<Timestamp>,
}

impl Job {
    pub fn total_capacity(&self) -> u128 {
        self.capacity_requested
            .iter()
            .fold(0u128, |acc, c| acc.saturating_add(*c))
    }
}

//! Event records for every mutating operation.
//!
//! Each call to a mutating `SmartnodesCore` operation publishes exactly one
//! [`EventRecord`], applied or rejected, on a broadcast channel. Sequence
//! numbers are assigned under the state write lock, so they follow commit
//! order without gaps.

use serde::{Deserialize, Serialize};
use sno_economics::{AccountAddress, TokenAmount};
use sno_jobs::JobStatus;
use sno_types::{ErrorKind, JobId, ProposalIndex, PublicKeyHash, Timestamp, UserHash, ValidatorId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// A public operation and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args")]
pub enum Operation {
    CreateUser {
        user_hash: UserHash,
    },
    CreateValidator {
        public_key_hash: PublicKeyHash,
        stake: TokenAmount,
    },
    LockTokens {
        validator_id: ValidatorId,
        amount: TokenAmount,
    },
    UnlockTokens {
        validator_id: ValidatorId,
        amount: TokenAmount,
    },
    RequestJob {
        job_id: JobId,
        capacity: Vec<u128>,
    },
    CreateProposal {
        function_types: Vec<u8>,
        encoded_calls: Vec<Vec<u8>>,
    },
    ApproveTransaction {
        proposal_index: ProposalIndex,
    },
    MintTokens {
        to: AccountAddress,
        amount: TokenAmount,
    },
    Approve {
        spender: AccountAddress,
        amount: TokenAmount,
    },
    Transfer {
        to: AccountAddress,
        amount: TokenAmount,
    },
    TransferFrom {
        owner: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    },
    Burn {
        amount: TokenAmount,
    },
    AdvanceEmissionEpoch,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateUser { .. } => "create_user",
            Operation::CreateValidator { .. } => "create_validator",
            Operation::LockTokens { .. } => "lock_tokens",
            Operation::UnlockTokens { .. } => "unlock_tokens",
            Operation::RequestJob { .. } => "request_job",
            Operation::CreateProposal { .. } => "create_proposal",
            Operation::ApproveTransaction { .. } => "approve_transaction",
            Operation::MintTokens { .. } => "mint_tokens",
            Operation::Approve { .. } => "approve",
            Operation::Transfer { .. } => "transfer",
            Operation::TransferFrom { .. } => "transfer_from",
            Operation::Burn { .. } => "burn",
            Operation::AdvanceEmissionEpoch => "advance_emission_epoch",
        }
    }
}

/// One state change caused by an applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Effect {
    UserCreated {
        user_hash: UserHash,
        address: AccountAddress,
    },
    ValidatorCreated {
        validator_id: ValidatorId,
        owner: AccountAddress,
        stake: TokenAmount,
    },
    StakeChanged {
        validator_id: ValidatorId,
        owner: AccountAddress,
        locked_stake: TokenAmount,
        active: bool,
    },
    ValidatorRemoved {
        validator_id: ValidatorId,
        owner: AccountAddress,
        returned_stake: TokenAmount,
    },
    JobStatusChanged {
        job_id: JobId,
        from: Option<JobStatus>,
        to: JobStatus,
    },
    WorkersAssigned {
        job_id: JobId,
        workers: Vec<AccountAddress>,
        validators: Vec<ValidatorId>,
    },
    Minted {
        to: AccountAddress,
        amount: TokenAmount,
    },
    Transferred {
        from: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    },
    Burned {
        from: AccountAddress,
        amount: TokenAmount,
    },
    AllowanceSet {
        owner: AccountAddress,
        spender: AccountAddress,
        amount: TokenAmount,
    },
    ProposalCreated {
        index: ProposalIndex,
        proposer: ValidatorId,
    },
    ApprovalRecorded {
        index: ProposalIndex,
        validator_id: ValidatorId,
        approvals: u64,
        required: u64,
    },
    ProposalExecuted {
        index: ProposalIndex,
    },
    EpochAdvanced {
        epoch: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationStatus {
    Applied { effects: Vec<Effect> },
    Rejected { kind: ErrorKind, reason: String },
}

impl OperationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, OperationStatus::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub caller: AccountAddress,
    pub operation: Operation,
    pub status: OperationStatus,
}

/// Broadcast channel for [`EventRecord`]s.
///
/// Clones share the channel and the sequence counter.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
    next_sequence: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self {
            sender,
            next_sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Assign the next sequence number and publish. With no subscribers the
    /// record is dropped.
    pub fn emit(
        &self,
        caller: AccountAddress,
        timestamp: Timestamp,
        operation: Operation,
        status: OperationStatus,
    ) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let record = EventRecord {
            sequence,
            timestamp,
            caller,
            operation,
            status,
        };

        match self.sender.send(record) {
            Ok(subscribers) => {
                debug!(sequence, subscribers, "Event emitted");
            }
            Err(_) => {
                debug!(sequence, "Event emitted but no subscribers listening");
            }
        }
        sequence
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of records emitted since creation
    pub fn total_events_emitted(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

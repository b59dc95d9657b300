use crate::types::JobStatus;
use sno_economics::{AccountAddress, EconomicsError};
use sno_types::{ErrorKind, JobId, UserHash};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Unknown user: {0}")]
    UnknownUser(UserHash),

    #[error("No user registered for address {0}")]
    UnknownUserAddress(AccountAddress),

    #[error("User already registered: {0}")]
    DuplicateUser(UserHash),

    #[error("Address {address} already registered user {existing}")]
    AddressAlreadyRegistered {
        address: AccountAddress,
        existing: UserHash,
    },

    #[error("Job already exists: {0}")]
    DuplicateJob(JobId),

    #[error("Job not found: {0}")]
    UnknownJob(JobId),

    #[error("Job request must ask for at least one capacity unit")]
    EmptyCapacity,

    #[error("Job {job_id} is not requested (status {actual})")]
    JobNotRequested { job_id: JobId, actual: JobStatus },

    #[error("Job {job_id} is not matched (status {actual})")]
    JobNotMatched { job_id: JobId, actual: JobStatus },

    #[error("Job {job_id} cannot be cancelled (status {actual})")]
    JobNotCancellable { job_id: JobId, actual: JobStatus },

    #[error("Worker set is empty")]
    EmptyWorkerSet,

    #[error("Worker listed twice: {0}")]
    DuplicateWorker(AccountAddress),

    #[error("Worker {0} is not an active validator")]
    WorkerNotValidator(AccountAddress),

    #[error("Worker set for job {job_id} does not match the assigned set ({assigned} assigned, {provided} provided)")]
    WorkerSetMismatch {
        job_id: JobId,
        assigned: usize,
        provided: usize,
    },

    #[error("Match for job {job_id} does not agree with the stored request")]
    RequestMismatch { job_id: JobId },

    #[error("Reward settlement failed: {0}")]
    Settlement(#[from] EconomicsError),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::UnknownUser(_) | JobError::UnknownUserAddress(_) | JobError::UnknownJob(_) => {
                ErrorKind::NotFound
            }
            JobError::DuplicateUser(_)
            | JobError::AddressAlreadyRegistered { .. }
            | JobError::DuplicateJob(_) => ErrorKind::AlreadyExists,
            JobError::JobNotRequested { .. }
            | JobError::JobNotMatched { .. }
            | JobError::JobNotCancellable { .. } => ErrorKind::InvalidState,
            JobError::EmptyCapacity
            | JobError::EmptyWorkerSet
            | JobError::DuplicateWorker(_)
            | JobError::WorkerSetMismatch { .. }
            | JobError::RequestMismatch { .. } => ErrorKind::PolicyViolation,
            JobError::WorkerNotValidator(_) => ErrorKind::Unauthorized,
            JobError::Settlement(e) => e.kind(),
        }
    }
}

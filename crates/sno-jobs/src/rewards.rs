use crate::types::Job;
use sno_economics::{AccountAddress, TokenAmount};

/// Payout owed to one worker when a job completes.
pub trait RewardPolicy: Send + Sync {
    fn reward(&self, job: &Job, worker: &AccountAddress) -> TokenAmount;
}

impl<F> RewardPolicy for F
where
    F: Fn(&Job, &AccountAddress) -> TokenAmount + Send + Sync,
{
    fn reward(&self, job: &Job, worker: &AccountAddress) -> TokenAmount {
        self(job, worker)
    }
}

/// Same amount for every assigned worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatReward {
    pub per_worker: TokenAmount,
}

impl FlatReward {
    pub fn new(per_worker: TokenAmount) -> Self {
        Self { per_worker }
    }
}

impl Default for FlatReward {
    fn default() -> Self {
        Self::new(TokenAmount::from_sno(10))
    }
}

impl RewardPolicy for FlatReward {
    fn reward(&self, _job: &Job, _worker: &AccountAddress) -> TokenAmount {
        self.per_worker
    }
}

use crate::error::{JobError, Result};
use crate::rewards::{FlatReward, RewardPolicy};
use crate::types::{Job, JobStatus, User};
use sno_economics::{AccountAddress, TokenAmount, TokenLedger};
use sno_types::{JobId, LifecycleState, Timestamp, UserHash};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Users and the job lifecycle.
///
/// Direct intake (`create_user`, `request_job`) is open to users; matching,
/// completion and cancellation are invoked only when a governance proposal
/// executes.
#[derive(Clone)]
pub struct JobLedger {
    users: HashMap<UserHash, User>,
    user_by_address: HashMap<AccountAddress, UserHash>,
    jobs: HashMap<JobId, Job>,
    reward_policy: Arc<dyn RewardPolicy>,
}

impl fmt::Debug for JobLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLedger")
            .field("users", &self.users.len())
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

impl Default for JobLedger {
    fn default() -> Self {
        Self::new(Arc::new(FlatReward::default()))
    }
}

impl JobLedger {
    pub fn new(reward_policy: Arc<dyn RewardPolicy>) -> Self {
        Self {
            users: HashMap::new(),
            user_by_address: HashMap::new(),
            jobs: HashMap::new(),
            reward_policy,
        }
    }

    pub fn from_parts(
        reward_policy: Arc<dyn RewardPolicy>,
        users: impl IntoIterator<Item = User>,
        jobs: impl IntoIterator<Item = Job>,
    ) -> Self {
        let mut ledger = Self::new(reward_policy);
        for user in users {
            ledger.user_by_address.insert(user.address, user.user_hash);
            ledger.users.insert(user.user_hash, user);
        }
        ledger.jobs = jobs.into_iter().map(|j| (j.id, j)).collect();
        ledger
    }

    pub fn user(&self, user_hash: &UserHash) -> Option<&User> {
        self.users.get(user_hash)
    }

    pub fn user_by_address(&self, address: &AccountAddress) -> Option<&User> {
        self.user_by_address
            .get(address)
            .and_then(|hash| self.users.get(hash))
    }

    pub fn job(&self, job_id: &JobId) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|j| j.status == status).count()
    }

    pub fn create_user(
        &mut self,
        address: AccountAddress,
        user_hash: UserHash,
        now: Timestamp,
    ) -> Result<()> {
        if self.users.contains_key(&user_hash) {
            return Err(JobError::DuplicateUser(user_hash));
        }
        if let Some(existing) = self.user_by_address.get(&address) {
            return Err(JobError::AddressAlreadyRegistered {
                address,
                existing: *existing,
            });
        }

        self.users.insert(
            user_hash,
            User {
                user_hash,
                address,
                created_at: now,
            },
        );
        self.user_by_address.insert(address, user_hash);

        info!(user_hash = %user_hash, address = %address, "👤 User registered");
        Ok(())
    }

    pub fn request_job(
        &mut self,
        user_hash: UserHash,
        job_id: JobId,
        capacity: Vec<u128>,
        now: Timestamp,
    ) -> Result<()> {
        if !self.users.contains_key(&user_hash) {
            return Err(JobError::UnknownUser(user_hash));
        }
        if self.jobs.contains_key(&job_id) {
            return Err(JobError::DuplicateJob(job_id));
        }
        if capacity.is_empty() {
            return Err(JobError::EmptyCapacity);
        }

        let job = Job {
            id: job_id,
            requester_hash: user_hash,
            status: JobStatus::Requested,
            capacity_requested: capacity,
            assigned_workers: BTreeSet::new(),
            created_at: now,
            matched_at: None,
            closed_at: None,
        };
        info!(
            job_id = %job_id,
            user_hash = %user_hash,
            capacity = ?job.capacity_requested,
            "📥 Job requested"
        );
        self.jobs.insert(job_id, job);
        Ok(())
    }

    /// Request on behalf of the user registered at `address`.
    pub fn request_job_from(
        &mut self,
        address: AccountAddress,
        job_id: JobId,
        capacity: Vec<u128>,
        now: Timestamp,
    ) -> Result<UserHash> {
        let user_hash = *self
            .user_by_address
            .get(&address)
            .ok_or(JobError::UnknownUserAddress(address))?;
        self.request_job(user_hash, job_id, capacity, now)?;
        Ok(user_hash)
    }

    /// Checks that a match names the request as stored.
    pub fn verify_request(
        &self,
        job_id: &JobId,
        user_hash: &UserHash,
        capacity: &[u128],
    ) -> Result<()> {
        let job = self.jobs.get(job_id).ok_or(JobError::UnknownJob(*job_id))?;
        if job.requester_hash != *user_hash || job.capacity_requested != capacity {
            return Err(JobError::RequestMismatch { job_id: *job_id });
        }
        Ok(())
    }

    /// `Requested → Matched`. `is_active_worker` decides whether an address
    /// belongs to an active validator.
    pub fn match_job<F>(
        &mut self,
        job_id: JobId,
        workers: &[AccountAddress],
        is_active_worker: F,
        now: Timestamp,
    ) -> Result<()>
    where
        F: Fn(&AccountAddress) -> bool,
    {
        let job = self.jobs.get(&job_id).ok_or(JobError::UnknownJob(job_id))?;
        if job.status != JobStatus::Requested {
            return Err(JobError::JobNotRequested {
                job_id,
                actual: job.status,
            });
        }
        let assigned = worker_set(workers)?;
        if let Some(outsider) = assigned.iter().find(|w| !is_active_worker(*w)) {
            return Err(JobError::WorkerNotValidator(*outsider));
        }

        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.status = JobStatus::Matched;
            job.assigned_workers = assigned;
            job.matched_at = Some(now);
        }

        info!(job_id = %job_id, workers = workers.len(), "🤝 Job matched");
        Ok(())
    }

    /// `Matched → Completed`, minting each worker's reward. Returns the
    /// payouts in worker order.
    pub fn complete_job(
        &mut self,
        ledger: &mut TokenLedger,
        job_id: JobId,
        workers: &[AccountAddress],
        now: Timestamp,
    ) -> Result<Vec<(AccountAddress, TokenAmount)>> {
        let job = self.jobs.get(&job_id).ok_or(JobError::UnknownJob(job_id))?;
        if job.status != JobStatus::Matched {
            return Err(JobError::JobNotMatched {
                job_id,
                actual: job.status,
            });
        }
        let provided: BTreeSet<AccountAddress> = workers.iter().copied().collect();
        if provided.len() != workers.len() || provided != job.assigned_workers {
            return Err(JobError::WorkerSetMismatch {
                job_id,
                assigned: job.assigned_workers.len(),
                provided: workers.len(),
            });
        }

        let payouts: Vec<(AccountAddress, TokenAmount)> = job
            .assigned_workers
            .iter()
            .map(|w| (*w, self.reward_policy.reward(job, w)))
            .collect();
        let total = ledger.mint_batch(&payouts)?;

        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.status = JobStatus::Completed;
            job.closed_at = Some(now);
        }

        info!(
            job_id = %job_id,
            workers = payouts.len(),
            total_reward = total.to_sno(),
            "✅ Job completed"
        );
        Ok(payouts)
    }

    /// `Requested | Matched → Cancelled`. Returns the status the job left.
    pub fn cancel_job(&mut self, job_id: JobId, now: Timestamp) -> Result<JobStatus> {
        let job = self
            .jobs
            .get_mut(&job_id)
            .ok_or(JobError::UnknownJob(job_id))?;
        let previous = job.status;
        if previous.is_terminal() {
            return Err(JobError::JobNotCancellable {
                job_id,
                actual: previous,
            });
        }

        job.status = JobStatus::Cancelled;
        job.closed_at = Some(now);

        debug!(job_id = %job_id, from = %previous, "Job cancelled");
        Ok(previous)
    }
}

/// Non-empty and duplicate-free.
fn worker_set(workers: &[AccountAddress]) -> Result<BTreeSet<AccountAddress>> {
    if workers.is_empty() {
        return Err(JobError::EmptyWorkerSet);
    }
    let mut set = BTreeSet::new();
    for worker in workers {
        if !set.insert(*worker) {
            return Err(JobError::DuplicateWorker(*worker));
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sno_economics::{EconomicsError, HalvingEmission};
    use sno_types::{ErrorKind, Hash32};

    fn addr(seed: &str) -> AccountAddress {
        AccountAddress::from_seed(seed.as_bytes())
    }

    fn user_hash() -> UserHash {
        Hash32::from_hex("0d976b7e1fd59537000313e274dc6a9d035ebaf95f4b8857740f7c799abd8629").unwrap()
    }

    fn setup() -> (JobLedger, TokenLedger, JobId) {
        let mut jobs = JobLedger::default();
        jobs.create_user(addr("user"), user_hash(), 10).unwrap();
        let job_id = Hash32::digest(b"123");
        jobs.request_job(user_hash(), job_id, vec![1_000_000_000, 1_000_000_000], 11)
            .unwrap();
        let ledger = TokenLedger::new(Arc::new(HalvingEmission::default()));
        (jobs, ledger, job_id)
    }

    #[test]
    fn test_users_are_unique() {
        let (mut jobs, _, _) = setup();
        assert_eq!(
            jobs.create_user(addr("other"), user_hash(), 0),
            Err(JobError::DuplicateUser(user_hash()))
        );
        let err = jobs
            .create_user(addr("user"), Hash32::digest(b"second"), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(jobs.user_by_address(&addr("user")).unwrap().user_hash, user_hash());
    }

    #[test]
    fn test_request_job_rejections() {
        let (mut jobs, _, job_id) = setup();
        assert_eq!(
            jobs.request_job(user_hash(), job_id, vec![1], 0),
            Err(JobError::DuplicateJob(job_id))
        );
        let unknown = Hash32::digest(b"ghost");
        assert_eq!(
            jobs.request_job(unknown, Hash32::digest(b"j2"), vec![1], 0),
            Err(JobError::UnknownUser(unknown))
        );
        assert_eq!(
            jobs.request_job(user_hash(), Hash32::digest(b"j3"), vec![], 0),
            Err(JobError::EmptyCapacity)
        );
        assert_eq!(
            jobs.request_job_from(addr("stranger"), Hash32::digest(b"j4"), vec![1], 0)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(jobs.count_by_status(JobStatus::Requested), 1);
    }

    #[test]
    fn test_full_lifecycle_pays_workers() {
        let (mut jobs, mut ledger, job_id) = setup();
        let workers = [addr("w1"), addr("w2")];

        jobs.match_job(job_id, &workers, |_| true, 12).unwrap();
        let job = jobs.job(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Matched);
        assert_eq!(job.matched_at, Some(12));

        // Order-insensitive completion
        let payouts = jobs
            .complete_job(&mut ledger, job_id, &[addr("w2"), addr("w1")], 13)
            .unwrap();
        assert_eq!(payouts.len(), 2);
        assert_eq!(ledger.total_supply(), TokenAmount::from_sno(20));
        assert_eq!(ledger.balance_of(&addr("w1")), TokenAmount::from_sno(10));
        assert_eq!(jobs.job(&job_id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_out_of_order_transitions() {
        let (mut jobs, mut ledger, job_id) = setup();

        let err = jobs
            .complete_job(&mut ledger, job_id, &[addr("w1")], 0)
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::JobNotMatched { actual: JobStatus::Requested, .. }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        jobs.match_job(job_id, &[addr("w1")], |_| true, 1).unwrap();
        let err = jobs.match_job(job_id, &[addr("w1")], |_| true, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let missing = Hash32::digest(b"missing");
        assert_eq!(
            jobs.match_job(missing, &[addr("w1")], |_| true, 0),
            Err(JobError::UnknownJob(missing))
        );
    }

    #[test]
    fn test_match_validates_workers() {
        let (mut jobs, _, job_id) = setup();

        assert_eq!(
            jobs.match_job(job_id, &[], |_| true, 0),
            Err(JobError::EmptyWorkerSet)
        );
        assert_eq!(
            jobs.match_job(job_id, &[addr("w1"), addr("w1")], |_| true, 0),
            Err(JobError::DuplicateWorker(addr("w1")))
        );
        let only_w1 = addr("w1");
        assert_eq!(
            jobs.match_job(job_id, &[addr("w1"), addr("w2")], |w| *w == only_w1, 0),
            Err(JobError::WorkerNotValidator(addr("w2")))
        );
        assert_eq!(jobs.job(&job_id).unwrap().status, JobStatus::Requested);
    }

    #[test]
    fn test_completion_requires_exact_worker_set() {
        let (mut jobs, mut ledger, job_id) = setup();
        jobs.match_job(job_id, &[addr("w1"), addr("w2")], |_| true, 0)
            .unwrap();

        for attempt in [
            vec![addr("w1")],
            vec![addr("w1"), addr("w3")],
            vec![addr("w1"), addr("w2"), addr("w2")],
        ] {
            let err = jobs
                .complete_job(&mut ledger, job_id, &attempt, 0)
                .unwrap_err();
            assert!(matches!(err, JobError::WorkerSetMismatch { .. }));
        }
        assert_eq!(ledger.total_supply(), TokenAmount::ZERO);
    }

    #[test]
    fn test_completion_rejected_when_emission_cap_hit() {
        let (_, _, job_id) = setup();
        let mut jobs = JobLedger::new(Arc::new(|_: &Job, _: &AccountAddress| {
            TokenAmount::from_sno(2_000_000)
        }));
        jobs.create_user(addr("user"), user_hash(), 0).unwrap();
        jobs.request_job(user_hash(), job_id, vec![1], 0).unwrap();
        jobs.match_job(job_id, &[addr("w1")], |_| true, 0).unwrap();

        let mut ledger = TokenLedger::new(Arc::new(HalvingEmission::default()));
        let err = jobs
            .complete_job(&mut ledger, job_id, &[addr("w1")], 0)
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::Settlement(EconomicsError::EmissionCapExceeded { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
        assert_eq!(jobs.job(&job_id).unwrap().status, JobStatus::Matched);
    }

    #[test]
    fn test_cancel_job() {
        let (mut jobs, mut ledger, job_id) = setup();
        assert_eq!(jobs.cancel_job(job_id, 5), Ok(JobStatus::Requested));
        assert_eq!(jobs.job(&job_id).unwrap().status, JobStatus::Cancelled);

        let err = jobs.cancel_job(job_id, 6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = jobs.match_job(job_id, &[addr("w1")], |_| true, 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(jobs.complete_job(&mut ledger, job_id, &[addr("w1")], 8).is_err());
    }

    #[test]
    fn test_verify_request() {
        let (jobs, _, job_id) = setup();
        jobs.verify_request(&job_id, &user_hash(), &[1_000_000_000, 1_000_000_000])
            .unwrap();
        assert_eq!(
            jobs.verify_request(&job_id, &user_hash(), &[1]),
            Err(JobError::RequestMismatch { job_id })
        );
    }
}

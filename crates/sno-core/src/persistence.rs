//! Mapping between [`CoreState`] and the key-value layout of a
//! [`StateStore`].
//!
//! Layout, one entry per entity, values bincode-encoded:
//!
//! | prefix       | key suffix               | value                 |
//! |--------------|--------------------------|-----------------------|
//! | `validator`  | id (u64, big endian)     | `Validator`           |
//! | `user`       | user hash                | `User`                |
//! | `job`        | job id                   | `Job`                 |
//! | `proposal`   | index (u64, big endian)  | `Proposal`            |
//! | `balance`    | address                  | `TokenAmount`         |
//! | `allowance`  | owner ‖ spender          | `TokenAmount`         |
//! | `assignment` | job id                   | `Vec<ValidatorId>`    |
//! | `scalar`     | `supply`                 | `SupplyState`         |

use crate::error::Result;
use crate::events::Effect;
use crate::state::CoreState;
use serde::Serialize;
use sno_economics::{AccountAddress, EmissionSchedule, SupplyState, TokenAmount, TokenLedger};
use sno_governance::{GovernorConfig, MultisigGovernor, Proposal};
use sno_jobs::{Job, JobLedger, RewardPolicy, User};
use sno_storage::codec::{decode_value, encode_value};
use sno_storage::key_prefix::{
    key, parse_fixed_id, u64_key, PREFIX_ALLOWANCE, PREFIX_ASSIGNMENT, PREFIX_BALANCE, PREFIX_JOB,
    PREFIX_PROPOSAL, PREFIX_SCALAR, PREFIX_USER, PREFIX_VALIDATOR,
};
use sno_storage::{StateStore, WriteOp};
use sno_types::{Hash32, JobId, ProposalIndex, UserHash, ValidatorId};
use sno_validators::{Validator, ValidatorRegistry};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

const SUPPLY_KEY: &[u8] = b"supply";

/// Entities whose persisted value may differ after an operation.
#[derive(Debug, Default)]
pub struct Touched {
    validators: BTreeSet<ValidatorId>,
    users: BTreeSet<UserHash>,
    jobs: BTreeSet<JobId>,
    proposals: BTreeSet<ProposalIndex>,
    balances: BTreeSet<AccountAddress>,
    allowances: BTreeSet<(AccountAddress, AccountAddress)>,
    supply: bool,
}

impl Touched {
    pub fn from_effects(effects: &[Effect]) -> Self {
        let mut touched = Self::default();
        for effect in effects {
            touched.record(effect);
        }
        touched
    }

    fn record(&mut self, effect: &Effect) {
        let escrow = AccountAddress::stake_escrow();
        match effect {
            Effect::UserCreated { user_hash, .. } => {
                self.users.insert(*user_hash);
            }
            Effect::ValidatorCreated {
                validator_id,
                owner,
                ..
            }
            | Effect::StakeChanged {
                validator_id,
                owner,
                ..
            }
            | Effect::ValidatorRemoved {
                validator_id,
                owner,
                ..
            } => {
                self.validators.insert(*validator_id);
                self.balances.insert(*owner);
                self.balances.insert(escrow);
            }
            Effect::JobStatusChanged { job_id, .. } | Effect::WorkersAssigned { job_id, .. } => {
                self.jobs.insert(*job_id);
            }
            Effect::Minted { to: account, .. } | Effect::Burned { from: account, .. } => {
                self.balances.insert(*account);
                self.supply = true;
            }
            Effect::Transferred { from, to, .. } => {
                self.balances.insert(*from);
                self.balances.insert(*to);
            }
            Effect::AllowanceSet { owner, spender, .. } => {
                self.allowances.insert((*owner, *spender));
            }
            Effect::ProposalCreated { index, .. }
            | Effect::ApprovalRecorded { index, .. }
            | Effect::ProposalExecuted { index } => {
                self.proposals.insert(*index);
            }
            Effect::EpochAdvanced { .. } => {
                self.supply = true;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
            && self.users.is_empty()
            && self.jobs.is_empty()
            && self.proposals.is_empty()
            && self.balances.is_empty()
            && self.allowances.is_empty()
            && !self.supply
    }

    /// Write operations bringing the store in line with `state` for every
    /// touched entity.
    pub fn write_ops(&self, state: &CoreState) -> Result<Vec<WriteOp>> {
        let mut ops = Vec::new();

        for id in &self.validators {
            if let Some(validator) = state.registry.get(*id) {
                ops.push(put(u64_key(&PREFIX_VALIDATOR, *id), validator)?);
            }
        }
        for hash in &self.users {
            if let Some(user) = state.jobs.user(hash) {
                ops.push(put(key(&PREFIX_USER, hash.as_bytes()), user)?);
            }
        }
        for job_id in &self.jobs {
            if let Some(job) = state.jobs.job(job_id) {
                ops.push(put(key(&PREFIX_JOB, job_id.as_bytes()), job)?);
            }
            let assignment_key = key(&PREFIX_ASSIGNMENT, job_id.as_bytes());
            match state.registry.assignment(job_id) {
                Some(ids) => ops.push(put(assignment_key, ids)?),
                None => ops.push(WriteOp::Delete {
                    key: assignment_key,
                }),
            }
        }
        for index in &self.proposals {
            if let Some(proposal) = state.governor.proposal(*index) {
                ops.push(put(u64_key(&PREFIX_PROPOSAL, *index), proposal)?);
            }
        }
        for address in &self.balances {
            let balance_key = key(&PREFIX_BALANCE, address.as_bytes());
            let balance = state.ledger.balance_of(address);
            if balance.is_zero() {
                ops.push(WriteOp::Delete { key: balance_key });
            } else {
                ops.push(put(balance_key, &balance)?);
            }
        }
        for (owner, spender) in &self.allowances {
            let allowance_key = key(&PREFIX_ALLOWANCE, &pair_bytes(owner, spender));
            let allowance = state.ledger.allowance(owner, spender);
            if allowance.is_zero() {
                ops.push(WriteOp::Delete { key: allowance_key });
            } else {
                ops.push(put(allowance_key, &allowance)?);
            }
        }
        if self.supply {
            ops.push(put(
                key(&PREFIX_SCALAR, SUPPLY_KEY),
                state.ledger.supply_state(),
            )?);
        }

        Ok(ops)
    }
}

/// Every entity of `state`, for seeding an empty store.
pub fn snapshot_ops(state: &CoreState) -> Result<Vec<WriteOp>> {
    let mut ops = Vec::new();
    for validator in state.registry.validators() {
        ops.push(put(u64_key(&PREFIX_VALIDATOR, validator.id), validator)?);
    }
    for (job_id, ids) in state.registry.assignments() {
        ops.push(put(key(&PREFIX_ASSIGNMENT, job_id.as_bytes()), ids)?);
    }
    for user in state.jobs.users() {
        ops.push(put(key(&PREFIX_USER, user.user_hash.as_bytes()), user)?);
    }
    for job in state.jobs.jobs() {
        ops.push(put(key(&PREFIX_JOB, job.id.as_bytes()), job)?);
    }
    for proposal in state.governor.proposals() {
        ops.push(put(u64_key(&PREFIX_PROPOSAL, proposal.index), proposal)?);
    }
    for (address, balance) in state.ledger.balances() {
        if !balance.is_zero() {
            ops.push(put(key(&PREFIX_BALANCE, address.as_bytes()), balance)?);
        }
    }
    for ((owner, spender), allowance) in state.ledger.allowances() {
        ops.push(put(
            key(&PREFIX_ALLOWANCE, &pair_bytes(owner, spender)),
            allowance,
        )?);
    }
    ops.push(put(
        key(&PREFIX_SCALAR, SUPPLY_KEY),
        state.ledger.supply_state(),
    )?);
    Ok(ops)
}

/// Components that are configuration rather than persisted data.
pub struct RestoreParams {
    pub schedule: Arc<dyn EmissionSchedule>,
    pub reward_policy: Arc<dyn RewardPolicy>,
    pub min_stake: TokenAmount,
    pub governor: GovernorConfig,
}

/// Rebuild the full state from `store`. Returns `None` when the store holds
/// no supply record, i.e. it was never seeded.
pub async fn load_state(
    store: &dyn StateStore,
    params: RestoreParams,
) -> Result<Option<CoreState>> {
    let supply: SupplyState = match store.get(&key(&PREFIX_SCALAR, SUPPLY_KEY)).await? {
        Some(bytes) => decode_value(&bytes)?,
        None => return Ok(None),
    };

    let validators: Vec<Validator> = decode_all(store, &*PREFIX_VALIDATOR).await?;
    let users: Vec<User> = decode_all(store, &*PREFIX_USER).await?;
    let jobs: Vec<Job> = decode_all(store, &*PREFIX_JOB).await?;
    let proposals: Vec<Proposal> = decode_all(store, &*PREFIX_PROPOSAL).await?;

    let mut assignments = Vec::new();
    for (k, v) in store.scan_prefix(&*PREFIX_ASSIGNMENT).await? {
        let job_id = Hash32::from_bytes(parse_fixed_id::<32>(&PREFIX_ASSIGNMENT, &k)?);
        assignments.push((job_id, decode_value::<Vec<ValidatorId>>(&v)?));
    }

    let mut balances = Vec::new();
    for (k, v) in store.scan_prefix(&*PREFIX_BALANCE).await? {
        let address = AccountAddress::from_bytes(parse_fixed_id::<32>(&PREFIX_BALANCE, &k)?);
        balances.push((address, decode_value::<TokenAmount>(&v)?));
    }

    let mut allowances = Vec::new();
    for (k, v) in store.scan_prefix(&*PREFIX_ALLOWANCE).await? {
        let pair = parse_fixed_id::<64>(&PREFIX_ALLOWANCE, &k)?;
        let (owner, spender) = split_pair(&pair);
        allowances.push(((owner, spender), decode_value::<TokenAmount>(&v)?));
    }

    info!(
        validators = validators.len(),
        users = users.len(),
        jobs = jobs.len(),
        proposals = proposals.len(),
        balances = balances.len(),
        total_supply = supply.total_supply.to_sno(),
        "📂 State restored"
    );

    Ok(Some(CoreState {
        ledger: TokenLedger::from_parts(params.schedule, supply, balances, allowances),
        registry: ValidatorRegistry::from_parts(params.min_stake, validators, assignments),
        jobs: JobLedger::from_parts(params.reward_policy, users, jobs),
        governor: MultisigGovernor::from_parts(params.governor, proposals),
    }))
}

async fn decode_all<T: serde::de::DeserializeOwned>(
    store: &dyn StateStore,
    prefix: &[u8],
) -> Result<Vec<T>> {
    let entries = store.scan_prefix(prefix).await?;
    debug!(entries = entries.len(), "Decoding persisted entities");
    entries
        .iter()
        .map(|(_, v)| decode_value(v).map_err(Into::into))
        .collect()
}

fn put<T: Serialize + ?Sized>(key: Vec<u8>, value: &T) -> Result<WriteOp> {
    Ok(WriteOp::Put {
        key,
        value: encode_value(value)?,
    })
}

fn pair_bytes(owner: &AccountAddress, spender: &AccountAddress) -> [u8; 64] {
    let mut bytes = [0u8; 64];
    bytes[..32].copy_from_slice(owner.as_bytes());
    bytes[32..].copy_from_slice(spender.as_bytes());
    bytes
}

fn split_pair(bytes: &[u8; 64]) -> (AccountAddress, AccountAddress) {
    let mut owner = [0u8; 32];
    let mut spender = [0u8; 32];
    owner.copy_from_slice(&bytes[..32]);
    spender.copy_from_slice(&bytes[32..]);
    (
        AccountAddress::from_bytes(owner),
        AccountAddress::from_bytes(spender),
    )
}

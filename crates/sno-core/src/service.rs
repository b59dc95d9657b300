use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::events::{Effect, EventBus, EventRecord, Operation, OperationStatus};
use crate::persistence::{self, RestoreParams, Touched};
use crate::state::{CoreState, Dispatcher};
use sno_economics::{
    AccountAddress, EconomicsError, EmissionSchedule, EmissionStatus, TokenAmount, TokenLedger,
};
use sno_governance::{
    ApprovalOutcome, GovernanceError, GovernanceState, MultisigGovernor, Proposal,
};
use sno_jobs::{Job, JobLedger, JobStatus, RewardPolicy, User};
use sno_storage::StateStore;
use sno_types::{JobId, ProposalIndex, PublicKeyHash, Timestamp, UserHash, ValidatorId};
use sno_validators::{Validator, ValidatorRegistry};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

/// Source of operation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

/// Settable clock for deterministic timestamps.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self(AtomicI64::new(start))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

/// Public operation surface of the validator governance and job ledger.
///
/// Operations are serialized behind one write lock. Each runs against a
/// working copy of [`CoreState`]; the copy is persisted and swapped in only
/// if the whole operation succeeds, and exactly one [`EventRecord`] is
/// published per call.
///
/// The working copy is a full clone of every balance, validator, job and
/// proposal, so each mutating call costs time linear in the size of the
/// ledger. Sized for a validator set and job book that fit comfortably in
/// memory; larger ledgers need per-component undo logs instead.
pub struct SmartnodesCore {
    state: RwLock<CoreState>,
    events: EventBus,
    store: Option<Arc<dyn StateStore>>,
    clock: Arc<dyn Clock>,
    minters: HashSet<AccountAddress>,
    config: CoreConfig,
}

impl SmartnodesCore {
    /// Fresh state from `config`: genesis allocations, halving emission and
    /// flat per-worker rewards.
    pub fn new(config: CoreConfig) -> Result<Self> {
        let schedule = Arc::new(config.economics.emission());
        let reward = Arc::new(config.economics.reward());
        Self::with_policies(config, schedule, reward)
    }

    pub fn with_policies(
        config: CoreConfig,
        schedule: Arc<dyn EmissionSchedule>,
        reward_policy: Arc<dyn RewardPolicy>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        let ledger = TokenLedger::with_genesis(schedule, &config.genesis)?;
        let state = CoreState {
            ledger,
            registry: ValidatorRegistry::new(config.economics.min_stake),
            jobs: JobLedger::new(reward_policy),
            governor: MultisigGovernor::new(config.governance.clone()),
        };

        info!(
            total_supply = state.ledger.total_supply().to_sno(),
            min_stake = config.economics.min_stake.to_sno(),
            quorum_policy = ?config.governance.quorum_policy,
            minters = config.minters.len(),
            "✨ Smartnodes core initialized"
        );
        Ok(Self::from_state(config, state))
    }

    fn from_state(config: CoreConfig, state: CoreState) -> Self {
        Self {
            state: RwLock::new(state),
            events: EventBus::new(config.events.buffer),
            store: None,
            clock: Arc::new(SystemClock),
            minters: config.minters.iter().copied().collect(),
            config,
        }
    }

    /// Rebuild from a seeded store, or start fresh from `config` and seed
    /// the store when it is empty.
    pub async fn restore(config: CoreConfig, store: Arc<dyn StateStore>) -> Result<Self> {
        let schedule: Arc<dyn EmissionSchedule> = Arc::new(config.economics.emission());
        let reward: Arc<dyn RewardPolicy> = Arc::new(config.economics.reward());
        Self::restore_with_policies(config, store, schedule, reward).await
    }

    pub async fn restore_with_policies(
        config: CoreConfig,
        store: Arc<dyn StateStore>,
        schedule: Arc<dyn EmissionSchedule>,
        reward_policy: Arc<dyn RewardPolicy>,
    ) -> Result<Self> {
        let params = RestoreParams {
            schedule: schedule.clone(),
            reward_policy: reward_policy.clone(),
            min_stake: config.economics.min_stake,
            governor: config.governance.clone(),
        };
        match persistence::load_state(store.as_ref(), params).await? {
            Some(state) => {
                config
                    .validate()
                    .map_err(|e| CoreError::Config(e.to_string()))?;
                Ok(Self::from_state(config, state).with_store_unseeded(store))
            }
            None => {
                Self::with_policies(config, schedule, reward_policy)?
                    .with_store(store)
                    .await
            }
        }
    }

    /// Attach a store and write the current state into it.
    pub async fn with_store(self, store: Arc<dyn StateStore>) -> Result<Self> {
        {
            let state = self.state.read().await;
            store.write_batch(persistence::snapshot_ops(&state)?).await?;
        }
        Ok(self.with_store_unseeded(store))
    }

    fn with_store_unseeded(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run `op` on a working copy of the state and commit it on success.
    ///
    /// Clones the whole [`CoreState`] up front; see the type-level note on
    /// cost.
    async fn transact<T, F>(&self, caller: AccountAddress, operation: Operation, op: F) -> Result<T>
    where
        F: FnOnce(&mut CoreState, Timestamp, &mut Vec<Effect>) -> Result<T>,
    {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let mut draft = state.clone();
        let mut effects = Vec::new();

        let outcome = match op(&mut draft, now, &mut effects) {
            Ok(value) => self.persist(&draft, &effects).await.map(|_| value),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => {
                *state = draft;
                self.events
                    .emit(caller, now, operation, OperationStatus::Applied { effects });
                Ok(value)
            }
            Err(e) => {
                warn!(
                    operation = operation.name(),
                    caller = %caller,
                    kind = e.kind().as_str(),
                    error = %e,
                    "❌ Operation rejected"
                );
                self.events.emit(
                    caller,
                    now,
                    operation,
                    OperationStatus::Rejected {
                        kind: e.kind(),
                        reason: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    async fn persist(&self, state: &CoreState, effects: &[Effect]) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let touched = Touched::from_effects(effects);
        if touched.is_empty() {
            return Ok(());
        }
        store.write_batch(touched.write_ops(state)?).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Users and validators
    // ---------------------------------------------------------------------

    pub async fn create_user(&self, caller: AccountAddress, user_hash: UserHash) -> Result<()> {
        self.transact(
            caller,
            Operation::CreateUser { user_hash },
            |state, now, effects| {
                state.jobs.create_user(caller, user_hash, now)?;
                effects.push(Effect::UserCreated {
                    user_hash,
                    address: caller,
                });
                Ok(())
            },
        )
        .await
    }

    pub async fn create_validator(
        &self,
        caller: AccountAddress,
        public_key_hash: PublicKeyHash,
        stake: TokenAmount,
    ) -> Result<ValidatorId> {
        self.transact(
            caller,
            Operation::CreateValidator {
                public_key_hash,
                stake,
            },
            |state, now, effects| {
                let id = state.registry.create_validator(
                    &mut state.ledger,
                    caller,
                    public_key_hash,
                    stake,
                    now,
                )?;
                effects.push(Effect::ValidatorCreated {
                    validator_id: id,
                    owner: caller,
                    stake,
                });
                Ok(id)
            },
        )
        .await
    }

    pub async fn lock_tokens(
        &self,
        caller: AccountAddress,
        validator_id: ValidatorId,
        amount: TokenAmount,
    ) -> Result<TokenAmount> {
        self.transact(
            caller,
            Operation::LockTokens {
                validator_id,
                amount,
            },
            |state, _, effects| {
                let locked =
                    state
                        .registry
                        .lock_tokens(&mut state.ledger, caller, validator_id, amount)?;
                effects.push(stake_changed(&state.registry, validator_id, caller, locked));
                Ok(locked)
            },
        )
        .await
    }

    pub async fn unlock_tokens(
        &self,
        caller: AccountAddress,
        validator_id: ValidatorId,
        amount: TokenAmount,
    ) -> Result<TokenAmount> {
        self.transact(
            caller,
            Operation::UnlockTokens {
                validator_id,
                amount,
            },
            |state, _, effects| {
                let locked =
                    state
                        .registry
                        .unlock_tokens(&mut state.ledger, caller, validator_id, amount)?;
                effects.push(stake_changed(&state.registry, validator_id, caller, locked));
                Ok(locked)
            },
        )
        .await
    }

    // ---------------------------------------------------------------------
    // Jobs
    // ---------------------------------------------------------------------

    /// Direct job intake on behalf of the caller's registered user.
    pub async fn request_job(
        &self,
        caller: AccountAddress,
        job_id: JobId,
        capacity: Vec<u128>,
    ) -> Result<()> {
        self.transact(
            caller,
            Operation::RequestJob {
                job_id,
                capacity: capacity.clone(),
            },
            |state, now, effects| {
                state.jobs.request_job_from(caller, job_id, capacity, now)?;
                effects.push(Effect::JobStatusChanged {
                    job_id,
                    from: None,
                    to: JobStatus::Requested,
                });
                Ok(())
            },
        )
        .await
    }

    // ---------------------------------------------------------------------
    // Governance
    // ---------------------------------------------------------------------

    pub async fn create_proposal(
        &self,
        caller: AccountAddress,
        function_types: Vec<u8>,
        encoded_calls: Vec<Vec<u8>>,
    ) -> Result<ProposalIndex> {
        self.transact(
            caller,
            Operation::CreateProposal {
                function_types: function_types.clone(),
                encoded_calls: encoded_calls.clone(),
            },
            |state, now, effects| {
                let proposer = caller_validator(&state.registry, caller)?;
                let active = state.registry.active_ids();
                let index = state.governor.create_proposal(
                    proposer,
                    &active,
                    function_types,
                    encoded_calls,
                    now,
                )?;
                effects.push(Effect::ProposalCreated { index, proposer });
                Ok(index)
            },
        )
        .await
    }

    /// Approve proposal `index` as the caller's validator; executes the
    /// proposal when quorum is reached.
    pub async fn approve_transaction(
        &self,
        caller: AccountAddress,
        index: ProposalIndex,
    ) -> Result<ApprovalOutcome> {
        self.transact(
            caller,
            Operation::ApproveTransaction {
                proposal_index: index,
            },
            |state, now, effects| {
                let approver = caller_validator(&state.registry, caller)?;
                let active = state.registry.active_ids();

                let CoreState {
                    ledger,
                    registry,
                    jobs,
                    governor,
                } = state;
                let mut dispatcher = Dispatcher::new(ledger, registry, jobs, now);
                let outcome = governor.approve(index, approver, &active, now, &mut dispatcher)?;
                effects.extend(dispatcher.into_effects());

                if outcome.newly_recorded {
                    effects.push(Effect::ApprovalRecorded {
                        index,
                        validator_id: approver,
                        approvals: outcome.approvals,
                        required: outcome.required,
                    });
                }
                if outcome.executed {
                    effects.push(Effect::ProposalExecuted { index });
                }
                Ok(outcome)
            },
        )
        .await
    }

    // ---------------------------------------------------------------------
    // Tokens
    // ---------------------------------------------------------------------

    /// Mint from the allowlisted minter role, within the epoch ceiling.
    pub async fn mint_tokens(
        &self,
        caller: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        self.transact(
            caller,
            Operation::MintTokens { to, amount },
            |state, _, effects| {
                if !self.minters.contains(&caller) {
                    return Err(CoreError::Unauthorized {
                        caller,
                        action: "mint tokens",
                    });
                }
                reject_system_account(to)?;
                state.ledger.mint(to, amount)?;
                effects.push(Effect::Minted { to, amount });
                Ok(())
            },
        )
        .await
    }

    pub async fn approve(
        &self,
        caller: AccountAddress,
        spender: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        self.transact(
            caller,
            Operation::Approve { spender, amount },
            |state, _, effects| {
                state.ledger.approve(caller, spender, amount)?;
                effects.push(Effect::AllowanceSet {
                    owner: caller,
                    spender,
                    amount,
                });
                Ok(())
            },
        )
        .await
    }

    pub async fn transfer(
        &self,
        caller: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        self.transact(
            caller,
            Operation::Transfer { to, amount },
            |state, _, effects| {
                reject_system_account(to)?;
                state.ledger.transfer(caller, to, amount)?;
                effects.push(Effect::Transferred {
                    from: caller,
                    to,
                    amount,
                });
                Ok(())
            },
        )
        .await
    }

    pub async fn transfer_from(
        &self,
        caller: AccountAddress,
        owner: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        self.transact(
            caller,
            Operation::TransferFrom { owner, to, amount },
            |state, _, effects| {
                reject_system_account(to)?;
                state.ledger.transfer_from(caller, owner, to, amount)?;
                effects.push(Effect::Transferred {
                    from: owner,
                    to,
                    amount,
                });
                effects.push(Effect::AllowanceSet {
                    owner,
                    spender: caller,
                    amount: state.ledger.allowance(&owner, &caller),
                });
                Ok(())
            },
        )
        .await
    }

    /// Destroy `amount` of the caller's own balance.
    pub async fn burn(&self, caller: AccountAddress, amount: TokenAmount) -> Result<()> {
        self.transact(
            caller,
            Operation::Burn { amount },
            |state, _, effects| {
                reject_system_account(caller)?;
                state.ledger.burn(caller, amount)?;
                effects.push(Effect::Burned {
                    from: caller,
                    amount,
                });
                Ok(())
            },
        )
        .await
    }

    /// Open the next emission epoch. Any active validator may call this;
    /// governance can do the same through `AdvanceEmissionEpoch`.
    pub async fn advance_emission_epoch(&self, caller: AccountAddress) -> Result<u64> {
        self.transact(
            caller,
            Operation::AdvanceEmissionEpoch,
            |state, _, effects| {
                caller_validator(&state.registry, caller)?;
                let epoch = state.ledger.advance_epoch();
                effects.push(Effect::EpochAdvanced { epoch });
                Ok(epoch)
            },
        )
        .await
    }

    // ---------------------------------------------------------------------
    // Read-only getters
    // ---------------------------------------------------------------------

    pub async fn validator(&self, id: ValidatorId) -> Option<Validator> {
        self.state.read().await.registry.get(id).cloned()
    }

    /// Active validator owned by `owner`.
    pub async fn validator_of(&self, owner: &AccountAddress) -> Option<Validator> {
        let state = self.state.read().await;
        state
            .registry
            .active_validator_of(owner)
            .and_then(|id| state.registry.get(id))
            .cloned()
    }

    pub async fn user(&self, user_hash: &UserHash) -> Option<User> {
        self.state.read().await.jobs.user(user_hash).cloned()
    }

    pub async fn job(&self, job_id: &JobId) -> Option<Job> {
        self.state.read().await.jobs.job(job_id).cloned()
    }

    pub async fn proposal(&self, index: ProposalIndex) -> Option<Proposal> {
        self.state.read().await.governor.proposal(index).cloned()
    }

    pub async fn proposal_count(&self) -> u64 {
        self.state.read().await.governor.proposal_count()
    }

    /// Active validator count, quorum threshold and proposal counters.
    pub async fn get_state(&self) -> GovernanceState {
        let state = self.state.read().await;
        state
            .governor
            .state(state.registry.active_validator_count(), self.clock.now())
    }

    pub async fn total_supply(&self) -> TokenAmount {
        self.state.read().await.ledger.total_supply()
    }

    pub async fn emission_rate(&self) -> TokenAmount {
        self.state.read().await.ledger.emission_rate()
    }

    pub async fn emission_status(&self) -> EmissionStatus {
        self.state.read().await.ledger.emission_status()
    }

    pub async fn balance_of(&self, address: &AccountAddress) -> TokenAmount {
        self.state.read().await.ledger.balance_of(address)
    }

    pub async fn allowance(&self, owner: &AccountAddress, spender: &AccountAddress) -> TokenAmount {
        self.state.read().await.ledger.allowance(owner, spender)
    }

    /// Sum of locked stake over active validators.
    pub async fn total_active_stake(&self) -> TokenAmount {
        self.state.read().await.registry.total_active_stake()
    }

    /// Clone of the committed state.
    pub async fn snapshot(&self) -> CoreState {
        self.state.read().await.clone()
    }
}

fn caller_validator(registry: &ValidatorRegistry, caller: AccountAddress) -> Result<ValidatorId> {
    registry
        .active_validator_of(&caller)
        .ok_or_else(|| GovernanceError::Unauthorized(caller).into())
}

fn reject_system_account(address: AccountAddress) -> Result<()> {
    if address.is_system() {
        return Err(EconomicsError::InvalidAddress(format!(
            "{} is a system account",
            address
        ))
        .into());
    }
    Ok(())
}

fn stake_changed(
    registry: &ValidatorRegistry,
    validator_id: ValidatorId,
    owner: AccountAddress,
    locked_stake: TokenAmount,
) -> Effect {
    Effect::StakeChanged {
        validator_id,
        owner,
        locked_stake,
        active: registry.is_active(validator_id),
    }
}

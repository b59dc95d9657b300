use crate::error::{Result, ValidatorError};
use crate::types::Validator;
use sno_economics::{AccountAddress, TokenAmount, TokenLedger};
use sno_types::{JobId, PublicKeyHash, Timestamp, ValidatorId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Default collateral required for an active validator: 50,000 SNO.
pub const DEFAULT_MIN_STAKE: TokenAmount = TokenAmount::from_sno(50_000);

/// Validator records, stake escrow and job assignments.
///
/// Locked stake lives in the ledger's `stake_escrow` account, so the escrow
/// balance always equals the sum of `locked_stake` over every record.
#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    validators: BTreeMap<ValidatorId, Validator>,
    by_owner: HashMap<AccountAddress, ValidatorId>,
    assignments: HashMap<JobId, Vec<ValidatorId>>,
    next_id: ValidatorId,
    min_stake: TokenAmount,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_STAKE)
    }
}

impl ValidatorRegistry {
    pub fn new(min_stake: TokenAmount) -> Self {
        Self {
            validators: BTreeMap::new(),
            by_owner: HashMap::new(),
            assignments: HashMap::new(),
            next_id: 1,
            min_stake,
        }
    }

    /// Rebuilds the registry from persisted records.
    pub fn from_parts(
        min_stake: TokenAmount,
        validators: impl IntoIterator<Item = Validator>,
        assignments: impl IntoIterator<Item = (JobId, Vec<ValidatorId>)>,
    ) -> Self {
        let mut registry = Self::new(min_stake);
        for validator in validators {
            registry.next_id = registry.next_id.max(validator.id + 1);
            if !validator.removed {
                // Index the owner's active record, else its newest one.
                let replace = match registry
                    .by_owner
                    .get(&validator.owner)
                    .and_then(|id| registry.validators.get(id))
                {
                    None => true,
                    Some(existing) => {
                        validator.is_active() || (!existing.is_active() && existing.id < validator.id)
                    }
                };
                if replace {
                    registry.by_owner.insert(validator.owner, validator.id);
                }
            }
            registry.validators.insert(validator.id, validator);
        }
        registry.assignments = assignments.into_iter().collect();
        registry
    }

    pub fn min_stake(&self) -> TokenAmount {
        self.min_stake
    }

    pub fn get(&self, id: ValidatorId) -> Option<&Validator> {
        self.validators.get(&id)
    }

    pub fn validators(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&JobId, &Vec<ValidatorId>)> {
        self.assignments.iter()
    }

    pub fn assignment(&self, job_id: &JobId) -> Option<&Vec<ValidatorId>> {
        self.assignments.get(job_id)
    }

    pub fn is_active(&self, id: ValidatorId) -> bool {
        self.validators.get(&id).is_some_and(Validator::is_active)
    }

    pub fn active_validator_count(&self) -> u64 {
        self.validators.values().filter(|v| v.is_active()).count() as u64
    }

    pub fn active_ids(&self) -> BTreeSet<ValidatorId> {
        self.validators
            .values()
            .filter(|v| v.is_active())
            .map(|v| v.id)
            .collect()
    }

    /// Active validator held by `owner`, if any.
    pub fn active_validator_of(&self, owner: &AccountAddress) -> Option<ValidatorId> {
        self.by_owner
            .get(owner)
            .copied()
            .filter(|id| self.is_active(*id))
    }

    /// Number of matched jobs the validator is still assigned to.
    pub fn pending_assignments(&self, id: ValidatorId) -> usize {
        self.assignments
            .values()
            .filter(|ids| ids.contains(&id))
            .count()
    }

    /// Sum of locked stake over active validators.
    pub fn total_active_stake(&self) -> TokenAmount {
        self.validators
            .values()
            .filter(|v| v.is_active())
            .fold(TokenAmount::ZERO, |acc, v| acc.saturating_add(v.locked_stake))
    }

    pub fn create_validator(
        &mut self,
        ledger: &mut TokenLedger,
        owner: AccountAddress,
        public_key_hash: PublicKeyHash,
        stake: TokenAmount,
        now: Timestamp,
    ) -> Result<ValidatorId> {
        if let Some(existing) = self.active_validator_of(&owner) {
            return Err(ValidatorError::DuplicateValidator { owner, existing });
        }

        let available = ledger.balance_of(&owner);
        if stake < self.min_stake || stake > available {
            return Err(ValidatorError::InsufficientStake {
                offered: stake,
                min_stake: self.min_stake,
                available,
            });
        }

        ledger.transfer(owner, AccountAddress::stake_escrow(), stake)?;

        let id = self.next_id;
        self.next_id += 1;
        self.validators.insert(
            id,
            Validator {
                id,
                owner,
                public_key_hash,
                locked_stake: stake,
                active: true,
                removed: false,
                created_at: now,
            },
        );
        self.by_owner.insert(owner, id);

        info!(
            validator_id = id,
            owner = %owner,
            stake = stake.to_sno(),
            active_validators = self.active_validator_count(),
            "🛡️ Validator created"
        );
        Ok(id)
    }

    /// Moves `amount` from the owner's balance into escrow. Returns the new
    /// locked stake.
    pub fn lock_tokens(
        &mut self,
        ledger: &mut TokenLedger,
        caller: AccountAddress,
        id: ValidatorId,
        amount: TokenAmount,
    ) -> Result<TokenAmount> {
        let validator = self.owned_record(caller, id)?;
        let locked = validator
            .locked_stake
            .checked_add(amount)
            .ok_or(sno_economics::EconomicsError::Overflow("locked stake"))?;

        // An owner holds at most one active validator.
        if !validator.is_active() && locked >= self.min_stake {
            if let Some(existing) = self.active_validator_of(&caller).filter(|e| *e != id) {
                return Err(ValidatorError::DuplicateValidator {
                    owner: caller,
                    existing,
                });
            }
        }

        ledger.transfer(caller, AccountAddress::stake_escrow(), amount)?;
        self.set_stake(id, locked);

        info!(
            validator_id = id,
            amount = amount.to_sno(),
            locked_stake = locked.to_sno(),
            active = self.is_active(id),
            "🔒 Stake locked"
        );
        Ok(locked)
    }

    /// Returns `amount` of escrowed stake to the owner. Returns the new
    /// locked stake.
    pub fn unlock_tokens(
        &mut self,
        ledger: &mut TokenLedger,
        caller: AccountAddress,
        id: ValidatorId,
        amount: TokenAmount,
    ) -> Result<TokenAmount> {
        let validator = self.owned_record(caller, id)?;
        let remaining =
            validator
                .locked_stake
                .checked_sub(amount)
                .ok_or(ValidatorError::InsufficientLocked {
                    validator_id: id,
                    locked: validator.locked_stake,
                    requested: amount,
                })?;

        if validator.is_active() && remaining < self.min_stake {
            let pending_jobs = self.pending_assignments(id);
            if pending_jobs > 0 {
                warn!(
                    validator_id = id,
                    pending_jobs,
                    remaining = remaining.to_sno(),
                    "Unlock refused while jobs are pending"
                );
                return Err(ValidatorError::StakeBelowMinimum {
                    validator_id: id,
                    requested: amount,
                    remaining,
                    min_stake: self.min_stake,
                    pending_jobs,
                });
            }
        }

        ledger.transfer(AccountAddress::stake_escrow(), caller, amount)?;
        self.set_stake(id, remaining);

        info!(
            validator_id = id,
            amount = amount.to_sno(),
            locked_stake = remaining.to_sno(),
            active = self.is_active(id),
            "🔓 Stake unlocked"
        );
        Ok(remaining)
    }

    /// Deactivates the validator for good and returns its full stake to the
    /// owner. Only reachable through an executed governance proposal.
    pub fn remove_validator(
        &mut self,
        ledger: &mut TokenLedger,
        id: ValidatorId,
    ) -> Result<TokenAmount> {
        let validator = match self.validators.get(&id) {
            Some(v) if v.is_active() => v,
            _ => return Err(ValidatorError::UnknownValidator(id)),
        };
        let owner = validator.owner;
        let returned = validator.locked_stake;

        ledger.transfer(AccountAddress::stake_escrow(), owner, returned)?;

        if let Some(v) = self.validators.get_mut(&id) {
            v.locked_stake = TokenAmount::ZERO;
            v.active = false;
            v.removed = true;
        }
        if self.by_owner.get(&owner) == Some(&id) {
            self.by_owner.remove(&owner);
        }

        info!(
            validator_id = id,
            owner = %owner,
            returned = returned.to_sno(),
            active_validators = self.active_validator_count(),
            "🚫 Validator removed"
        );
        Ok(returned)
    }

    /// Records that `workers` hold `job_id`. Every worker address must own an
    /// active validator.
    pub fn assign_job(&mut self, job_id: JobId, workers: &[AccountAddress]) -> Result<Vec<ValidatorId>> {
        let ids = workers
            .iter()
            .map(|w| {
                self.active_validator_of(w)
                    .ok_or(ValidatorError::WorkerNotActiveValidator(*w))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(job_id = %job_id, validators = ?ids, "Job assigned");
        self.assignments.insert(job_id, ids.clone());
        Ok(ids)
    }

    pub fn release_job(&mut self, job_id: &JobId) -> Option<Vec<ValidatorId>> {
        let released = self.assignments.remove(job_id);
        if released.is_some() {
            debug!(job_id = %job_id, "Job assignment released");
        }
        released
    }

    fn owned_record(&self, caller: AccountAddress, id: ValidatorId) -> Result<&Validator> {
        let validator = self
            .validators
            .get(&id)
            .filter(|v| !v.removed)
            .ok_or(ValidatorError::UnknownValidator(id))?;
        if validator.owner != caller {
            return Err(ValidatorError::NotOwner {
                validator_id: id,
                caller,
            });
        }
        Ok(validator)
    }

    fn set_stake(&mut self, id: ValidatorId, locked: TokenAmount) {
        let min_stake = self.min_stake;
        if let Some(v) = self.validators.get_mut(&id) {
            v.locked_stake = locked;
            v.active = locked >= min_stake;
            if v.active {
                self.by_owner.insert(v.owner, id);
            }
        }
    }
}

use crate::error::{CoreError, Result};
use crate::events::Effect;
use sno_economics::TokenLedger;
use sno_governance::{Command, CommandExecutor, MultisigGovernor};
use sno_jobs::{JobLedger, JobStatus};
use sno_types::{ProposalIndex, Timestamp};
use sno_validators::ValidatorRegistry;
use tracing::debug;

/// Every component of the ledger. Operations run against a clone and the
/// clone replaces the committed state only when the operation succeeds.
#[derive(Debug, Clone)]
pub struct CoreState {
    pub ledger: TokenLedger,
    pub registry: ValidatorRegistry,
    pub jobs: JobLedger,
    pub governor: MultisigGovernor,
}

/// Routes the commands of an executed proposal to their target components.
///
/// Commands apply in order against the working copy; the first failure
/// aborts the proposal and the caller discards the copy.
pub struct Dispatcher<'a> {
    ledger: &'a mut TokenLedger,
    registry: &'a mut ValidatorRegistry,
    jobs: &'a mut JobLedger,
    now: Timestamp,
    effects: Vec<Effect>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        ledger: &'a mut TokenLedger,
        registry: &'a mut ValidatorRegistry,
        jobs: &'a mut JobLedger,
        now: Timestamp,
    ) -> Self {
        Self {
            ledger,
            registry,
            jobs,
            now,
            effects: Vec::new(),
        }
    }

    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }

    fn apply(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::RemoveValidator(call) => {
                let owner = self
                    .registry
                    .get(call.validator_id)
                    .map(|v| v.owner)
                    .ok_or(sno_validators::ValidatorError::UnknownValidator(call.validator_id))?;
                let returned = self.registry.remove_validator(self.ledger, call.validator_id)?;
                self.effects.push(Effect::ValidatorRemoved {
                    validator_id: call.validator_id,
                    owner,
                    returned_stake: returned,
                });
            }
            Command::MatchJob(call) => {
                self.jobs
                    .verify_request(&call.job_id, &call.user_hash, &call.capacity)?;
                let registry = &*self.registry;
                self.jobs.match_job(
                    call.job_id,
                    &call.workers,
                    |worker| registry.active_validator_of(worker).is_some(),
                    self.now,
                )?;
                let validators = self.registry.assign_job(call.job_id, &call.workers)?;
                self.effects.push(Effect::JobStatusChanged {
                    job_id: call.job_id,
                    from: Some(JobStatus::Requested),
                    to: JobStatus::Matched,
                });
                self.effects.push(Effect::WorkersAssigned {
                    job_id: call.job_id,
                    workers: call.workers.clone(),
                    validators,
                });
            }
            Command::CompleteJob(call) => {
                let payouts =
                    self.jobs
                        .complete_job(self.ledger, call.job_id, &call.workers, self.now)?;
                self.registry.release_job(&call.job_id);
                self.effects.extend(
                    payouts
                        .into_iter()
                        .map(|(to, amount)| Effect::Minted { to, amount }),
                );
                self.effects.push(Effect::JobStatusChanged {
                    job_id: call.job_id,
                    from: Some(JobStatus::Matched),
                    to: JobStatus::Completed,
                });
            }
            Command::CancelJob(call) => {
                let previous = self.jobs.cancel_job(call.job_id, self.now)?;
                self.registry.release_job(&call.job_id);
                self.effects.push(Effect::JobStatusChanged {
                    job_id: call.job_id,
                    from: Some(previous),
                    to: JobStatus::Cancelled,
                });
            }
            Command::RequestJob(call) => {
                self.jobs.request_job(
                    call.user_hash,
                    call.job_id,
                    call.capacity.clone(),
                    self.now,
                )?;
                self.effects.push(Effect::JobStatusChanged {
                    job_id: call.job_id,
                    from: None,
                    to: JobStatus::Requested,
                });
            }
            Command::MintTokens(call) => {
                self.ledger.mint(call.to, call.amount)?;
                self.effects.push(Effect::Minted {
                    to: call.to,
                    amount: call.amount,
                });
            }
            Command::AdvanceEmissionEpoch => {
                let epoch = self.ledger.advance_epoch();
                self.effects.push(Effect::EpochAdvanced { epoch });
            }
        }
        Ok(())
    }
}

impl CommandExecutor for Dispatcher<'_> {
    type Error = CoreError;

    fn execute(&mut self, index: ProposalIndex, commands: &[Command]) -> Result<()> {
        for (position, command) in commands.iter().enumerate() {
            debug!(
                index,
                position,
                function_type = ?command.function_type(),
                "Dispatching governed call"
            );
            self.apply(command)?;
        }
        Ok(())
    }
}

use crate::command::{decode_all, Command};
use crate::error::{GovernanceError, Result};
use crate::proposal::Proposal;
use serde::{Deserialize, Serialize};
use sno_types::{ProposalIndex, Timestamp, ValidatorId};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Which recorded approvals count toward quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumPolicy {
    /// Every recorded approval counts, even if its validator has since been
    /// removed
    #[default]
    RecordedApprovals,
    /// Only approvals from currently active validators count
    LiveApprovals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub quorum_policy: QuorumPolicy,
    /// Open proposals stop accepting approvals after this many seconds
    pub proposal_ttl_secs: Option<i64>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            quorum_policy: QuorumPolicy::RecordedApprovals,
            proposal_ttl_secs: None,
        }
    }
}

/// Applies the commands of a proposal that reached quorum.
///
/// The call must be all-or-nothing: on `Err` no target state may have
/// changed. The governor records the triggering approval and the executed
/// flag only after `execute` returns `Ok`.
pub trait CommandExecutor {
    type Error: From<GovernanceError> + fmt::Display;

    fn execute(
        &mut self,
        index: ProposalIndex,
        commands: &[Command],
    ) -> std::result::Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub index: ProposalIndex,
    /// Approvals counted toward quorum after this call
    pub approvals: u64,
    pub required: u64,
    /// False when the caller had already approved
    pub newly_recorded: bool,
    pub executed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceState {
    pub active_validators: u64,
    pub required_approvals: u64,
    pub proposal_count: u64,
    pub latest_proposal_index: Option<ProposalIndex>,
    pub open_proposals: u64,
    pub executed_proposals: u64,
}

/// Strict majority of the live active set.
pub fn required_approvals(active_validators: u64) -> u64 {
    active_validators / 2 + 1
}

/// N-of-M proposal book over the active validator set.
///
/// Proposals are kept in an append-only arena; the index of a proposal is
/// its position and is never reused.
#[derive(Debug, Clone, Default)]
pub struct MultisigGovernor {
    proposals: Vec<Proposal>,
    config: GovernorConfig,
}

impl MultisigGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            proposals: Vec::new(),
            config,
        }
    }

    /// Rebuilds the arena from persisted proposals.
    pub fn from_parts(config: GovernorConfig, proposals: impl IntoIterator<Item = Proposal>) -> Self {
        let mut proposals: Vec<Proposal> = proposals.into_iter().collect();
        proposals.sort_by_key(|p| p.index);
        Self { proposals, config }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn proposal(&self, index: ProposalIndex) -> Option<&Proposal> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.proposals.get(i))
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    pub fn proposal_count(&self) -> u64 {
        self.proposals.len() as u64
    }

    pub fn latest_index(&self) -> Option<ProposalIndex> {
        self.proposals.last().map(|p| p.index)
    }

    pub fn state(&self, active_validators: u64, now: Timestamp) -> GovernanceState {
        let executed = self.proposals.iter().filter(|p| p.executed).count() as u64;
        let open = self
            .proposals
            .iter()
            .filter(|p| !p.executed && !p.is_expired(now))
            .count() as u64;
        GovernanceState {
            active_validators,
            required_approvals: required_approvals(active_validators),
            proposal_count: self.proposal_count(),
            latest_proposal_index: self.latest_index(),
            open_proposals: open,
            executed_proposals: executed,
        }
    }

    /// Decodes and stores a proposal. The proposer's approval is recorded
    /// but never triggers execution here.
    pub fn create_proposal(
        &mut self,
        proposer: ValidatorId,
        active: &BTreeSet<ValidatorId>,
        function_types: Vec<u8>,
        encoded_calls: Vec<Vec<u8>>,
        now: Timestamp,
    ) -> Result<ProposalIndex> {
        if !active.contains(&proposer) {
            return Err(GovernanceError::NotActiveValidator(proposer));
        }
        let commands = decode_all(&function_types, &encoded_calls)?;

        let index = self.proposal_count();
        let proposal = Proposal {
            index,
            proposer,
            function_types,
            encoded_calls,
            commands,
            approvals: BTreeSet::from([proposer]),
            executed: false,
            created_at: now,
            executed_at: None,
            expires_at: self.config.proposal_ttl_secs.map(|ttl| now.saturating_add(ttl)),
        };

        info!(
            index,
            proposer,
            calls = proposal.commands.len(),
            function_types = ?proposal.function_types,
            required = required_approvals(active.len() as u64),
            "📜 Proposal created"
        );
        self.proposals.push(proposal);
        Ok(index)
    }

    /// Records `approver`'s approval and, once quorum is reached against the
    /// live active set, hands the decoded commands to `executor`.
    ///
    /// When the executor fails the proposal is left exactly as it was: still
    /// open, approval not recorded.
    pub fn approve<X: CommandExecutor>(
        &mut self,
        index: ProposalIndex,
        approver: ValidatorId,
        active: &BTreeSet<ValidatorId>,
        now: Timestamp,
        executor: &mut X,
    ) -> std::result::Result<ApprovalOutcome, X::Error> {
        if !active.contains(&approver) {
            return Err(GovernanceError::NotActiveValidator(approver).into());
        }
        let slot = usize::try_from(index)
            .ok()
            .filter(|i| *i < self.proposals.len())
            .ok_or(GovernanceError::UnknownProposal(index))?;

        let policy = self.config.quorum_policy;
        let proposal = &self.proposals[slot];
        if proposal.executed {
            return Err(GovernanceError::AlreadyExecuted(index).into());
        }
        if let Some(expired_at) = proposal.expires_at.filter(|_| proposal.is_expired(now)) {
            return Err(GovernanceError::ProposalExpired { index, expired_at }.into());
        }

        let newly_recorded = !proposal.has_approved(approver);
        let counted = proposal
            .approvals
            .iter()
            .chain(newly_recorded.then_some(&approver))
            .filter(|id| match policy {
                QuorumPolicy::RecordedApprovals => true,
                QuorumPolicy::LiveApprovals => active.contains(*id),
            })
            .count() as u64;
        let required = required_approvals(active.len() as u64);

        let executed = counted >= required;
        if executed {
            debug!(index, approvals = counted, required, "Quorum reached, executing");
            if let Err(e) = executor.execute(index, &proposal.commands) {
                warn!(index, approver, error = %e, "Proposal execution rejected");
                return Err(e);
            }
        }

        let proposal = &mut self.proposals[slot];
        proposal.approvals.insert(approver);
        if executed {
            proposal.executed = true;
            proposal.executed_at = Some(now);
            info!(
                index,
                approvals = counted,
                required,
                calls = proposal.commands.len(),
                "⚡ Proposal executed"
            );
        } else {
            info!(
                index,
                approver,
                approvals = counted,
                required,
                newly_recorded,
                "✍️ Approval recorded"
            );
        }

        Ok(ApprovalOutcome {
            index,
            approvals: counted,
            required,
            newly_recorded,
            executed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{encode_all, CancelJobCall, RemoveValidatorCall};
    use sno_types::{ErrorKind, Hash32};

    #[derive(Debug)]
    enum MockError {
        Governance(GovernanceError),
        Rejected,
    }

    impl From<GovernanceError> for MockError {
        fn from(e: GovernanceError) -> Self {
            MockError::Governance(e)
        }
    }

    impl fmt::Display for MockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        runs: Vec<(ProposalIndex, Vec<Command>)>,
        fail: bool,
    }

    impl CommandExecutor for RecordingExecutor {
        type Error = MockError;

        fn execute(
            &mut self,
            index: ProposalIndex,
            commands: &[Command],
        ) -> std::result::Result<(), MockError> {
            if self.fail {
                return Err(MockError::Rejected);
            }
            self.runs.push((index, commands.to_vec()));
            Ok(())
        }
    }

    fn remove_payload(id: ValidatorId) -> (Vec<u8>, Vec<Vec<u8>>) {
        encode_all(&[Command::RemoveValidator(RemoveValidatorCall { validator_id: id })]).unwrap()
    }

    fn active(ids: &[ValidatorId]) -> BTreeSet<ValidatorId> {
        ids.iter().copied().collect()
    }

    fn governor_with_proposal(proposer: ValidatorId, set: &BTreeSet<ValidatorId>) -> MultisigGovernor {
        let mut governor = MultisigGovernor::default();
        let (types, calls) = remove_payload(2);
        governor.create_proposal(proposer, set, types, calls, 0).unwrap();
        governor
    }

    #[test]
    fn test_required_approvals_is_strict_majority() {
        assert_eq!(required_approvals(1), 1);
        assert_eq!(required_approvals(2), 2);
        assert_eq!(required_approvals(3), 2);
        assert_eq!(required_approvals(4), 3);
        assert_eq!(required_approvals(5), 3);
    }

    #[test]
    fn test_create_proposal() {
        let set = active(&[1, 2, 3]);
        let mut governor = MultisigGovernor::default();
        let (types, calls) = remove_payload(2);

        let err = governor
            .create_proposal(9, &set, types.clone(), calls.clone(), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = governor
            .create_proposal(1, &set, vec![0, 3], calls.clone(), 0)
            .unwrap_err();
        assert!(matches!(err, GovernanceError::ArityMismatch { .. }));
        assert_eq!(governor.proposal_count(), 0);

        assert_eq!(governor.create_proposal(1, &set, types.clone(), calls.clone(), 0), Ok(0));
        assert_eq!(governor.create_proposal(2, &set, types, calls, 0), Ok(1));

        let proposal = governor.proposal(0).unwrap();
        assert_eq!(proposal.approvals, BTreeSet::from([1]));
        assert!(!proposal.executed);
        assert_eq!(governor.latest_index(), Some(1));
    }

    #[test]
    fn test_one_of_three_pending_two_of_three_executes() {
        let set = active(&[1, 2, 3]);
        let mut governor = governor_with_proposal(1, &set);
        let mut executor = RecordingExecutor::default();

        // Proposer re-approving does not double count
        let outcome = governor.approve(0, 1, &set, 1, &mut executor).unwrap();
        assert!(!outcome.newly_recorded);
        assert!(!outcome.executed);
        assert_eq!(outcome.approvals, 1);
        assert!(executor.runs.is_empty());

        let outcome = governor.approve(0, 3, &set, 2, &mut executor).unwrap();
        assert!(outcome.executed);
        assert_eq!((outcome.approvals, outcome.required), (2, 2));
        assert_eq!(executor.runs.len(), 1);

        let proposal = governor.proposal(0).unwrap();
        assert!(proposal.executed);
        assert_eq!(proposal.executed_at, Some(2));
    }

    #[test]
    fn test_two_active_needs_both() {
        let set = active(&[1, 2]);
        let mut governor = governor_with_proposal(1, &set);
        let mut executor = RecordingExecutor::default();

        let outcome = governor.approve(0, 1, &set, 1, &mut executor).unwrap();
        assert!(!outcome.executed);

        let outcome = governor.approve(0, 2, &set, 1, &mut executor).unwrap();
        assert!(outcome.executed);
    }

    #[test]
    fn test_executed_proposal_is_inert() {
        let set = active(&[1, 2, 3]);
        let mut governor = governor_with_proposal(1, &set);
        let mut executor = RecordingExecutor::default();
        governor.approve(0, 2, &set, 1, &mut executor).unwrap();

        for approver in [1, 2, 3] {
            let err = governor.approve(0, approver, &set, 2, &mut executor).unwrap_err();
            match err {
                MockError::Governance(e) => {
                    assert_eq!(e, GovernanceError::AlreadyExecuted(0));
                    assert_eq!(e.kind(), ErrorKind::InvalidState);
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
        assert_eq!(executor.runs.len(), 1);
    }

    #[test]
    fn test_failed_execution_leaves_proposal_open() {
        let set = active(&[1, 2, 3]);
        let mut governor = governor_with_proposal(1, &set);
        let mut executor = RecordingExecutor {
            fail: true,
            ..Default::default()
        };

        assert!(matches!(
            governor.approve(0, 2, &set, 1, &mut executor),
            Err(MockError::Rejected)
        ));
        let proposal = governor.proposal(0).unwrap();
        assert!(!proposal.executed);
        assert_eq!(proposal.approvals, BTreeSet::from([1]));

        // Re-approval after the blocking condition clears
        executor.fail = false;
        let outcome = governor.approve(0, 2, &set, 2, &mut executor).unwrap();
        assert!(outcome.executed);
    }

    #[test]
    fn test_unknown_and_unauthorized() {
        let set = active(&[1, 2, 3]);
        let mut governor = governor_with_proposal(1, &set);
        let mut executor = RecordingExecutor::default();

        assert!(matches!(
            governor.approve(5, 2, &set, 0, &mut executor),
            Err(MockError::Governance(GovernanceError::UnknownProposal(5)))
        ));
        assert!(matches!(
            governor.approve(0, 4, &set, 0, &mut executor),
            Err(MockError::Governance(GovernanceError::NotActiveValidator(4)))
        ));
    }

    #[test]
    fn test_quorum_uses_live_active_count() {
        let mut governor = governor_with_proposal(1, &active(&[1, 2, 3, 4, 5]));
        let mut executor = RecordingExecutor::default();

        // 2 of 5 is not enough
        let outcome = governor
            .approve(0, 2, &active(&[1, 2, 3, 4, 5]), 1, &mut executor)
            .unwrap();
        assert!(!outcome.executed);

        // After two validators leave, 2 of 3 executes on the next approval
        let shrunk = active(&[1, 2, 3]);
        let outcome = governor.approve(0, 2, &shrunk, 2, &mut executor).unwrap();
        assert!(!outcome.newly_recorded);
        assert!(outcome.executed);
    }

    #[test]
    fn test_recorded_vs_live_policy() {
        let original = active(&[1, 2, 3, 4]);
        let after_removal = active(&[2, 3, 4]);

        // Recorded: validator 1's approval still counts after removal
        let mut governor = governor_with_proposal(1, &original);
        let mut executor = RecordingExecutor::default();
        let outcome = governor.approve(0, 2, &after_removal, 1, &mut executor).unwrap();
        assert_eq!(outcome.approvals, 2);
        assert!(outcome.executed);

        // Live: it does not
        let mut governor = MultisigGovernor::new(GovernorConfig {
            quorum_policy: QuorumPolicy::LiveApprovals,
            proposal_ttl_secs: None,
        });
        let (types, calls) = remove_payload(2);
        governor.create_proposal(1, &original, types, calls, 0).unwrap();
        let outcome = governor.approve(0, 2, &after_removal, 1, &mut executor).unwrap();
        assert_eq!(outcome.approvals, 1);
        assert!(!outcome.executed);
    }

    #[test]
    fn test_proposal_ttl() {
        let set = active(&[1, 2, 3]);
        let mut governor = MultisigGovernor::new(GovernorConfig {
            quorum_policy: QuorumPolicy::RecordedApprovals,
            proposal_ttl_secs: Some(60),
        });
        let (types, calls) = encode_all(&[Command::CancelJob(CancelJobCall {
            job_id: Hash32::digest(b"job"),
        })])
        .unwrap();
        governor.create_proposal(1, &set, types, calls, 1_000).unwrap();
        let mut executor = RecordingExecutor::default();

        let err = governor.approve(0, 2, &set, 1_060, &mut executor).unwrap_err();
        assert!(matches!(
            err,
            MockError::Governance(GovernanceError::ProposalExpired { index: 0, expired_at: 1_060 })
        ));
        assert_eq!(governor.state(3, 1_060).open_proposals, 0);
        assert!(executor.runs.is_empty());
    }

    #[test]
    fn test_state_introspection() {
        let set = active(&[1, 2, 3]);
        let mut governor = governor_with_proposal(1, &set);
        let (types, calls) = remove_payload(3);
        governor.create_proposal(2, &set, types, calls, 0).unwrap();
        governor
            .approve(0, 2, &set, 1, &mut RecordingExecutor::default())
            .unwrap();

        let state = governor.state(3, 1);
        assert_eq!(state.active_validators, 3);
        assert_eq!(state.required_approvals, 2);
        assert_eq!(state.proposal_count, 2);
        assert_eq!(state.latest_proposal_index, Some(1));
        assert_eq!(state.open_proposals, 1);
        assert_eq!(state.executed_proposals, 1);

        let restored = MultisigGovernor::from_parts(
            governor.config().clone(),
            governor.proposals().iter().rev().cloned(),
        );
        assert_eq!(restored.proposals(), governor.proposals());
    }

    #[test]
    fn test_json_representation() {
        let set = active(&[1, 2, 3]);
        let mut governor = MultisigGovernor::new(GovernorConfig {
            quorum_policy: QuorumPolicy::LiveApprovals,
            proposal_ttl_secs: Some(3_600),
        });
        let (types, calls) = encode_all(&[
            Command::CancelJob(CancelJobCall {
                job_id: Hash32::digest(b"job"),
            }),
            Command::AdvanceEmissionEpoch,
        ])
        .unwrap();
        governor.create_proposal(1, &set, types, calls, 100).unwrap();

        let proposal = governor.proposal(0).unwrap();
        let json = serde_json::to_value(proposal).unwrap();
        assert_eq!(json["expires_at"], 3_700);
        assert_eq!(json["approvals"], serde_json::json!([1]));
        let back: Proposal = serde_json::from_value(json).unwrap();
        assert_eq!(&back, proposal);

        let state = governor.state(3, 100);
        let back: GovernanceState =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(back, state);

        let config: GovernorConfig =
            serde_json::from_str(r#"{"quorum_policy":"live_approvals"}"#).unwrap();
        assert_eq!(config.quorum_policy, QuorumPolicy::LiveApprovals);
        assert_eq!(config.proposal_ttl_secs, None);
    }
}

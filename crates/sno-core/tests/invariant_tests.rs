mod common;

use common::*;
use proptest::prelude::*;
use sno_core::{SmartnodesCore, TokenAmount};
use sno_economics::AccountAddress;
use sno_governance::command::encode_all;
use sno_governance::{Command, MintTokensCall, RemoveValidatorCall};
use sno_types::Hash32;

const OWNERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

#[derive(Debug, Clone)]
enum Action {
    Lock { slot: usize, amount: u64 },
    Unlock { slot: usize, amount: u64 },
    Register { who: usize },
    Transfer { from: usize, to: usize, amount: u64 },
    ProposeRemove { proposer: usize, target: usize },
    ProposeMint { proposer: usize, amount: u64 },
    Approve { who: usize, index: u64 },
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..8usize, 1..30_000u64).prop_map(|(slot, amount)| Action::Lock { slot, amount }),
        (0..8usize, 1..30_000u64).prop_map(|(slot, amount)| Action::Unlock { slot, amount }),
        (0..4usize).prop_map(|who| Action::Register { who }),
        (0..4usize, 0..4usize, 1..60_000u64)
            .prop_map(|(from, to, amount)| Action::Transfer { from, to, amount }),
        (0..4usize, 0..4usize)
            .prop_map(|(proposer, target)| Action::ProposeRemove { proposer, target }),
        (0..4usize, 1..2_000_000u64)
            .prop_map(|(proposer, amount)| Action::ProposeMint { proposer, amount }),
        (0..4usize, 0..8u64).prop_map(|(who, index)| Action::Approve { who, index }),
    ]
}

async fn apply(core: &SmartnodesCore, action: &Action) {
    let owner = |i: usize| addr(OWNERS[i]);
    let records: Vec<(u64, AccountAddress)> = core
        .snapshot()
        .await
        .registry
        .validators()
        .map(|v| (v.id, v.owner))
        .collect();
    let record = |slot: usize| records[slot % records.len()];

    // Rejections are expected; only the invariants matter.
    let _ = match action {
        Action::Lock { slot, amount } => {
            let (id, holder) = record(*slot);
            core.lock_tokens(holder, id, sno(*amount)).await.map(|_| ())
        }
        Action::Unlock { slot, amount } => {
            let (id, holder) = record(*slot);
            core.unlock_tokens(holder, id, sno(*amount)).await.map(|_| ())
        }
        Action::Register { who } => core
            .create_validator(
                owner(*who),
                Hash32::digest(format!("pk-{}-{}", who, records.len()).as_bytes()),
                sno(50_000),
            )
            .await
            .map(|_| ()),
        Action::Transfer { from, to, amount } => {
            core.transfer(owner(*from), owner(*to), sno(*amount)).await
        }
        Action::ProposeRemove { proposer, target } => {
            let (ft, calls) = encode_all(&[Command::RemoveValidator(RemoveValidatorCall {
                validator_id: record(*target).0,
            })])
            .unwrap();
            core.create_proposal(owner(*proposer), ft, calls)
                .await
                .map(|_| ())
        }
        Action::ProposeMint { proposer, amount } => {
            let (ft, calls) = encode_all(&[Command::MintTokens(MintTokensCall {
                to: owner(*proposer),
                amount: sno(*amount),
            })])
            .unwrap();
            core.create_proposal(owner(*proposer), ft, calls)
                .await
                .map(|_| ())
        }
        Action::Approve { who, index } => core
            .approve_transaction(owner(*who), *index)
            .await
            .map(|_| ()),
    };
}

async fn check_invariants(core: &SmartnodesCore, executed_before: &mut Vec<bool>) {
    let state = core.snapshot().await;

    let locked = state
        .registry
        .validators()
        .filter(|v| !v.removed)
        .fold(TokenAmount::ZERO, |acc, v| acc.checked_add(v.locked_stake).unwrap());
    assert_eq!(
        state.ledger.balance_of(&AccountAddress::stake_escrow()),
        locked
    );
    assert!(state.registry.total_active_stake() <= state.ledger.total_supply());

    let balances = state
        .ledger
        .balances()
        .fold(TokenAmount::ZERO, |acc, (_, b)| acc.checked_add(*b).unwrap());
    assert_eq!(balances, state.ledger.total_supply());
    assert!(state.ledger.total_supply() <= state.ledger.epoch_ceiling());

    for validator in state.registry.validators() {
        assert_eq!(
            validator.is_active(),
            !validator.removed && validator.locked_stake >= state.registry.min_stake()
        );
    }
    for name in OWNERS {
        let active = state
            .registry
            .validators()
            .filter(|v| v.is_active() && v.owner == addr(name))
            .count();
        assert!(active <= 1, "{} holds {} active validators", name, active);
        if active == 1 {
            assert!(state.registry.active_validator_of(&addr(name)).is_some());
        }
    }

    let executed: Vec<bool> = state
        .governor
        .proposals()
        .iter()
        .map(|p| p.executed)
        .collect();
    for (before, now) in executed_before.iter().zip(&executed) {
        assert!(!*before || *now, "executed flag reverted");
    }
    *executed_before = executed;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_stake_and_supply_invariants(actions in prop::collection::vec(action(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let core = SmartnodesCore::new(config_for(&OWNERS)).unwrap();
            for name in OWNERS {
                core.create_validator(addr(name), Hash32::digest(name.as_bytes()), sno(50_000))
                    .await
                    .unwrap();
            }

            let mut executed = Vec::new();
            for action in &actions {
                apply(&core, action).await;
                check_invariants(&core, &mut executed).await;
            }
        });
    }
}

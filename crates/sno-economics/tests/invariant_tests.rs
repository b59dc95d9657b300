use proptest::prelude::*;
use sno_economics::{
    AccountAddress, EmissionSchedule, GenesisAllocation, HalvingEmission, TokenAmount,
    TokenLedger,
};
use std::sync::Arc;

prop_compose! {
    fn arb_token_amount()
        (units in 0u128..=2_000_000_000u128 * sno_economics::SNO_BASE_UNIT) -> TokenAmount {
        TokenAmount::from_base_units(units)
    }
}

prop_compose! {
    fn arb_small_amount()
        (sno in 0u64..=5_000u64) -> TokenAmount {
        TokenAmount::from_sno(sno)
    }
}

prop_compose! {
    fn arb_schedule()
        (initial in 1u64..=1_000_000u64,
         interval in 0u64..=100_000_000u64,
         max in 1u64..=1_000_000_000u64) -> HalvingEmission {
        HalvingEmission::new(
            TokenAmount::from_sno(initial),
            TokenAmount::from_sno(interval),
            TokenAmount::from_sno(max),
        )
    }
}

fn test_ledger() -> TokenLedger {
    TokenLedger::with_genesis(
        Arc::new(HalvingEmission::new(
            TokenAmount::from_sno(10_000),
            TokenAmount::from_sno(20_000),
            TokenAmount::from_sno(100_000),
        )),
        &[GenesisAllocation::new(
            AccountAddress::from_seed(b"genesis"),
            TokenAmount::from_sno(5_000),
        )],
    )
    .unwrap()
}

// Property: emission rate never increases as supply grows
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_emission_rate_non_increasing(
        schedule in arb_schedule(),
        supplies in prop::collection::vec(arb_token_amount(), 2..40)
    ) {
        let mut supplies = supplies;
        supplies.sort();
        let mut prev = schedule.current_rate(supplies[0]);
        for supply in supplies.iter().skip(1) {
            let rate = schedule.current_rate(*supply);
            prop_assert!(rate <= prev, "rate rose from {} to {} at {}", prev, rate, supply);
            prev = rate;
        }
    }
}

// Property: the rate never lets supply pass the hard cap
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_rate_bounded_by_max_supply(
        schedule in arb_schedule(),
        supply in arb_token_amount()
    ) {
        let rate = schedule.current_rate(supply);
        let reachable = supply.saturating_add(rate);
        prop_assert!(reachable <= schedule.max_supply().max(supply));
    }
}

// Property: mint then read adds exactly N, and the rate does not go up
proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_mint_round_trip(amounts in prop::collection::vec(arb_small_amount(), 1..30)) {
        let mut ledger = test_ledger();
        let recipient = AccountAddress::from_seed(b"recipient");

        for (i, amount) in amounts.into_iter().enumerate() {
            if i % 5 == 4 {
                ledger.advance_epoch();
            }
            let before = ledger.total_supply();
            let rate_before = ledger.emission_rate();

            match ledger.mint(recipient, amount) {
                Ok(()) => {
                    prop_assert_eq!(ledger.total_supply(), before.saturating_add(amount));
                    prop_assert!(ledger.emission_rate() <= rate_before);
                }
                Err(_) => prop_assert_eq!(ledger.total_supply(), before),
            }
            prop_assert!(ledger.total_supply() <= ledger.epoch_ceiling());
        }
    }
}

// Property: transfers conserve the sum of balances
proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_transfers_conserve_balances(
        moves in prop::collection::vec((0usize..4, 0usize..4, arb_small_amount()), 1..50)
    ) {
        let mut ledger = test_ledger();
        let genesis = AccountAddress::from_seed(b"genesis");
        let accounts: Vec<AccountAddress> = (0..4u8)
            .map(|i| AccountAddress::from_seed(&[i]))
            .collect();
        for account in &accounts {
            ledger.transfer(genesis, *account, TokenAmount::from_sno(1_000)).unwrap();
        }

        for (from, to, amount) in moves {
            let _ = ledger.transfer(accounts[from], accounts[to], amount);
            let sum = accounts
                .iter()
                .chain(std::iter::once(&genesis))
                .map(|a| ledger.balance_of(a))
                .fold(TokenAmount::ZERO, |acc, b| acc.saturating_add(b));
            prop_assert_eq!(sum, ledger.total_supply());
        }
    }
}

//! Property-based tests for staking
//!
//! - Accrued reward grows with principal and lock length
//! - Stake creation never locks more than the unstaked balance

use ledger_core::{AccountId, EntryKind, ErrorKind, Ledger};
use proptest::prelude::*;
use rust_decimal::Decimal;
use staking_engine::{accrued_reward, Config, StakingEngine};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn tier_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(30u32), Just(90u32), Just(180u32), Just(365u32)]
}

fn create_engine() -> (Arc<Ledger>, StakingEngine, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(
        Ledger::open(ledger_core::Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..ledger_core::Config::default()
        })
        .unwrap(),
    );
    let engine = StakingEngine::new(ledger.clone(), Config::default()).unwrap();
    (ledger, engine, temp_dir)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: reward is non-negative and monotonic in days and principal
    #[test]
    fn prop_reward_monotonic(
        a in amount_strategy(),
        b in amount_strategy(),
        bps in 0u32..5_000,
        d1 in 1u32..1_000,
        d2 in 1u32..1_000,
    ) {
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        let (short, long) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };

        prop_assert!(accrued_reward(small, bps, short) >= Decimal::ZERO);
        prop_assert!(accrued_reward(small, bps, short) <= accrued_reward(small, bps, long));
        prop_assert!(accrued_reward(small, bps, short) <= accrued_reward(large, bps, short));
        prop_assert!(accrued_reward(small, bps, short).scale() <= 2);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: principal never exceeds the unstaked balance at creation
    #[test]
    fn prop_stake_bounded_by_available(
        funds in amount_strategy(),
        stakes in prop::collection::vec((amount_strategy(), tier_strategy()), 1..12),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, engine, _temp) = create_engine();
            let account = AccountId::new("prop-staker");
            ledger.credit(&account, EntryKind::Earn, funds, Uuid::now_v7()).await.unwrap();

            let mut locked = Decimal::ZERO;
            for (amount, days) in stakes {
                let available = funds - locked;
                match engine.create_stake(&account, amount, days).await {
                    Ok(position) => {
                        assert!(amount <= available);
                        locked += position.principal;
                    }
                    Err(e) => {
                        assert!(amount > available);
                        assert_eq!(e.kind(), ErrorKind::InsufficientBalance);
                    }
                }

                let snapshot = ledger.snapshot(&account).await.unwrap();
                assert!(snapshot.balance >= Decimal::ZERO);
                assert_eq!(snapshot.staked, locked);
                assert_eq!(snapshot.balance + snapshot.staked, funds);
            }
        });
    }
}

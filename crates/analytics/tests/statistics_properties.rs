//! Property tests for the statistics engine.
//!
//! 1. Every counted trade is either a win or a loss.
//! 2. Recomputation is idempotent.
//! 3. Net profit is total profit minus total loss.
//! 4. Drawdown stays within [0, 100] for non-negative curves.

use analytics::StatisticsEngine;
use chrono::{Duration, TimeZone, Utc};
use core_types::{EquityPoint, OrderSide, Trade};
use proptest::prelude::*;
use rust_decimal::Decimal;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = Decimal> {
    (1u32..1_000_000).prop_map(|p| Decimal::new(i64::from(p), 4))
}

/// (side, entry, exit, quantity, state) where state 0 = open, 1 = closed, 2 = cancelled.
fn arb_trade() -> impl Strategy<Value = Trade> {
    (any::<bool>(), arb_price(), arb_price(), 1u32..1000, 0u8..3).prop_map(
        |(buy, entry, exit, qty, state)| {
            let side = if buy { OrderSide::Buy } else { OrderSide::Sell };
            let opened = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let mut trade = Trade::open("EURUSD", side, entry, Decimal::from(qty), opened, "prop");
            match state {
                1 => trade.close(exit, opened + Duration::minutes(1)).unwrap(),
                2 => trade.cancel().unwrap(),
                _ => {}
            }
            trade
        },
    )
}

fn arb_curve() -> impl Strategy<Value = Vec<EquityPoint>> {
    prop::collection::vec(0u32..100_000, 0..50).prop_map(|values| {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| EquityPoint {
                timestamp: start + Duration::hours(i as i64 * 7),
                value: Decimal::from(v),
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn wins_plus_losses_equal_total(
        trades in prop::collection::vec(arb_trade(), 0..40),
        mark in prop::option::of(arb_price()),
    ) {
        let stats = StatisticsEngine::new().compute(&trades, &[], mark);
        prop_assert_eq!(stats.winning_trades + stats.losing_trades, stats.total_trades);
        prop_assert!(stats.win_rate >= Decimal::ZERO && stats.win_rate <= Decimal::ONE_HUNDRED);
    }

    #[test]
    fn recomputation_is_idempotent(
        trades in prop::collection::vec(arb_trade(), 0..40),
        curve in arb_curve(),
        mark in prop::option::of(arb_price()),
    ) {
        let engine = StatisticsEngine::new();
        prop_assert_eq!(engine.compute(&trades, &curve, mark), engine.compute(&trades, &curve, mark));
    }

    #[test]
    fn net_profit_is_consistent(
        trades in prop::collection::vec(arb_trade(), 0..40),
        mark in prop::option::of(arb_price()),
    ) {
        let engine = StatisticsEngine::new();
        let stats = engine.compute(&trades, &[], mark);
        prop_assert_eq!(stats.net_profit, stats.total_profit - stats.total_loss);
        prop_assert_eq!(stats.net_profit, engine.net_profit(&trades, mark));
    }

    #[test]
    fn drawdown_is_a_percentage(curve in arb_curve()) {
        let dd = StatisticsEngine::new().max_drawdown_pct(curve.iter().map(|p| p.value));
        prop_assert!(dd >= Decimal::ZERO && dd <= Decimal::ONE_HUNDRED);
    }
}

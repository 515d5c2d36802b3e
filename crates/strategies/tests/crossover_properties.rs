//! Property tests for the incremental crossover detector.

use proptest::prelude::*;
use rust_decimal::Decimal;
use strategies::{Crossover, CrossoverDetector};

fn mean(window: &[Decimal]) -> Decimal {
    window.iter().copied().sum::<Decimal>() / Decimal::from(window.len())
}

/// Full re-sum of both windows ending at `end` (exclusive).
fn brute_force_averages(prices: &[Decimal], end: usize, fast: usize, slow: usize) -> Option<(Decimal, Decimal)> {
    (end >= slow).then(|| (mean(&prices[end - fast..end]), mean(&prices[end - slow..end])))
}

fn arb_prices(max_len: usize) -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((1u32..100_000).prop_map(|p| Decimal::new(i64::from(p), 2)), 0..max_len)
}

proptest! {
    /// Fewer than `slow + 1` prices can never produce a crossover.
    #[test]
    fn no_signal_before_history_is_complete(
        (fast, slow) in (1usize..20).prop_flat_map(|f| (Just(f), (f + 1)..40)),
        prices in arb_prices(40),
    ) {
        let mut detector = CrossoverDetector::new(fast, slow).unwrap();
        for price in prices.into_iter().take(slow) {
            prop_assert_eq!(detector.push(price), None);
        }
    }

    #[test]
    fn buffer_never_exceeds_capacity(prices in arb_prices(600)) {
        let mut detector = CrossoverDetector::new(3, 10).unwrap();
        for price in prices {
            detector.push(price);
            prop_assert!(detector.len() <= detector.capacity());
        }
    }

    #[test]
    fn constant_prices_never_cross(price in 1u32..10_000, n in 0usize..100) {
        let mut detector = CrossoverDetector::new(2, 5).unwrap();
        for _ in 0..n {
            prop_assert_eq!(detector.push(Decimal::from(price)), None);
        }
    }

    /// Running window sums agree with a full re-sum on every step, including
    /// after the ring buffer starts evicting.
    #[test]
    fn running_sums_match_brute_force(
        (fast, slow) in (1usize..10).prop_flat_map(|f| (Just(f), (f + 1)..60)),
        prices in arb_prices(300),
    ) {
        let mut detector = CrossoverDetector::new(fast, slow).unwrap();
        for i in 0..prices.len() {
            let signal = detector.push(prices[i]);
            let current = brute_force_averages(&prices, i + 1, fast, slow);
            prop_assert_eq!(detector.averages(), current);

            let expected = match (brute_force_averages(&prices, i, fast, slow), current) {
                (Some((pf, ps)), Some((f, s))) if pf <= ps && f > s => Some(Crossover::Bullish),
                (Some((pf, ps)), Some((f, s))) if pf >= ps && f < s => Some(Crossover::Bearish),
                _ => None,
            };
            prop_assert_eq!(signal, expected);
        }
    }
}

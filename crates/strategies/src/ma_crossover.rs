use crate::{error::StrategyError, Strategy};
use core_types::{PriceTick, SignalIntent, SignalKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use tracing::debug;

/// The direction of a moving-average crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    /// The fast average moved from at-or-below the slow average to above it.
    Bullish,
    /// The fast average moved from at-or-above the slow average to below it.
    Bearish,
}

/// Incremental fast/slow simple moving average crossover detector.
///
/// Prices are kept in a bounded ring buffer of `max(4 * slow, 200)` entries.
/// Both averages are undefined until `slow` prices have been seen, and a
/// crossover additionally needs the previous step's averages, so the first
/// possible signal comes on price number `slow + 1`.
///
/// The window sums are maintained as prices enter and leave each window, so a
/// push costs the same regardless of the periods. Decimal addition is exact,
/// so the running sums never drift from a full re-sum.
#[derive(Debug, Clone)]
pub struct CrossoverDetector {
    fast_period: usize,
    slow_period: usize,
    capacity: usize,
    prices: VecDeque<Decimal>,
    fast_sum: Decimal,
    slow_sum: Decimal,
    prev_fast_sum: Decimal,
    prev_slow_sum: Decimal,
}

impl CrossoverDetector {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, StrategyError> {
        if fast_period == 0 || slow_period == 0 {
            return Err(StrategyError::InvalidParameters(
                "Moving average periods cannot be zero.".to_string(),
            ));
        }
        if fast_period >= slow_period {
            return Err(StrategyError::InvalidParameters(format!(
                "Fast period ({fast_period}) must be less than slow period ({slow_period})."
            )));
        }
        let capacity = (slow_period * 4).max(200);
        Ok(Self {
            fast_period,
            slow_period,
            capacity,
            prices: VecDeque::with_capacity(capacity + 1),
            fast_sum: Decimal::ZERO,
            slow_sum: Decimal::ZERO,
            prev_fast_sum: Decimal::ZERO,
            prev_slow_sum: Decimal::ZERO,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Current `(fast, slow)` averages, once enough prices have been seen.
    pub fn averages(&self) -> Option<(Decimal, Decimal)> {
        (self.prices.len() >= self.slow_period).then(|| self.means(self.fast_sum, self.slow_sum))
    }

    /// Averages over the windows that end one price before the newest.
    fn previous_averages(&self) -> Option<(Decimal, Decimal)> {
        (self.prices.len() > self.slow_period).then(|| self.means(self.prev_fast_sum, self.prev_slow_sum))
    }

    /// Feeds the next price and reports a crossover if one just happened.
    pub fn push(&mut self, price: Decimal) -> Option<Crossover> {
        self.prev_fast_sum = self.fast_sum;
        self.prev_slow_sum = self.slow_sum;

        self.prices.push_back(price);
        let newest = self.prices.len() - 1;
        self.fast_sum += price;
        if let Some(leaving) = newest.checked_sub(self.fast_period).and_then(|i| self.prices.get(i)) {
            self.fast_sum -= *leaving;
        }
        self.slow_sum += price;
        if let Some(leaving) = newest.checked_sub(self.slow_period).and_then(|i| self.prices.get(i)) {
            self.slow_sum -= *leaving;
        }
        // The capacity exceeds `slow + 1`, so evicted prices are outside every window.
        while self.prices.len() > self.capacity {
            self.prices.pop_front();
        }

        let (fast, slow) = self.averages()?;
        let (prev_fast, prev_slow) = self.previous_averages()?;

        if prev_fast <= prev_slow && fast > slow {
            debug!(%fast, %slow, "Bullish crossover");
            Some(Crossover::Bullish)
        } else if prev_fast >= prev_slow && fast < slow {
            debug!(%fast, %slow, "Bearish crossover");
            Some(Crossover::Bearish)
        } else {
            None
        }
    }

    fn means(&self, fast_sum: Decimal, slow_sum: Decimal) -> (Decimal, Decimal) {
        (
            fast_sum / Decimal::from(self.fast_period),
            slow_sum / Decimal::from(self.slow_period),
        )
    }
}

/// Trend strategy emitting BUY on a bullish and SELL on a bearish crossover.
pub struct MovingAverageCrossover {
    detector: CrossoverDetector,
}

impl MovingAverageCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, StrategyError> {
        Ok(Self {
            detector: CrossoverDetector::new(fast_period, slow_period)?,
        })
    }

    /// 60 plus the separation of the averages in basis points, capped at 100.
    fn confidence(fast: Decimal, slow: Decimal) -> Decimal {
        if slow.is_zero() {
            return dec!(60);
        }
        let separation_bps = ((fast - slow) / slow).abs() * dec!(10000);
        dec!(60) + separation_bps.min(dec!(40))
    }
}

impl Strategy for MovingAverageCrossover {
    fn evaluate(&mut self, tick: &PriceTick) -> Result<Option<SignalIntent>, StrategyError> {
        let Some(crossover) = self.detector.push(tick.price) else {
            return Ok(None);
        };
        let Some((fast, slow)) = self.detector.averages() else {
            return Ok(None);
        };

        let (kind, direction) = match crossover {
            Crossover::Bullish => (SignalKind::Buy, "above"),
            Crossover::Bearish => (SignalKind::Sell, "below"),
        };
        let reason = format!(
            "Fast SMA({}) crossed {direction} slow SMA({})",
            self.detector.fast_period, self.detector.slow_period
        );
        Ok(Some(SignalIntent::new(
            kind,
            tick.price,
            Self::confidence(fast, slow),
            reason,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tick(price: Decimal) -> PriceTick {
        PriceTick::new("EURUSD", price, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn rejects_invalid_periods() {
        assert!(CrossoverDetector::new(0, 3).is_err());
        assert!(CrossoverDetector::new(3, 3).is_err());
        assert!(CrossoverDetector::new(5, 3).is_err());
        assert_eq!(CrossoverDetector::new(9, 21).unwrap().capacity(), 200);
        assert_eq!(CrossoverDetector::new(20, 100).unwrap().capacity(), 400);
    }

    #[test]
    fn detects_single_bullish_crossover() {
        let mut detector = CrossoverDetector::new(2, 3).unwrap();
        let outputs: Vec<_> = [dec!(1), dec!(1), dec!(1), dec!(2), dec!(1)]
            .into_iter()
            .map(|p| detector.push(p))
            .collect();
        assert_eq!(outputs, vec![None, None, None, Some(Crossover::Bullish), None]);
    }

    #[test]
    fn detects_bearish_crossover() {
        let mut detector = CrossoverDetector::new(2, 3).unwrap();
        let outputs: Vec<_> = [dec!(5), dec!(5), dec!(5), dec!(4)]
            .into_iter()
            .map(|p| detector.push(p))
            .collect();
        assert_eq!(outputs.last(), Some(&Some(Crossover::Bearish)));
    }

    #[test]
    fn strategy_maps_crossover_to_buy_signal() {
        let mut strategy = MovingAverageCrossover::new(2, 3).unwrap();
        let mut signals = Vec::new();
        for price in [dec!(1), dec!(1), dec!(1), dec!(2)] {
            signals.extend(strategy.evaluate(&tick(price)).unwrap());
        }
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Buy);
        assert_eq!(signals[0].price, dec!(2));
        // fast 1.5 vs slow 4/3 is far more than 40bps apart.
        assert_eq!(signals[0].confidence, dec!(100));
    }

    #[test]
    fn confidence_grows_with_separation() {
        assert_eq!(MovingAverageCrossover::confidence(dec!(1.0005), dec!(1)), dec!(65.0000));
        assert_eq!(MovingAverageCrossover::confidence(dec!(1), dec!(0)), dec!(60));
    }
}

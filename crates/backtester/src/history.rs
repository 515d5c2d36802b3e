//! Sources of historical prices for backtests.

use crate::error::BacktestError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use configuration::BacktestSettings;
use core_types::PriceTick;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Where a backtest gets its price history from.
#[async_trait]
pub trait HistoricalData: Send + Sync {
    /// Price ticks for `symbol` in `[start, end]`, oldest first.
    async fn load(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceTick>, BacktestError>;
}

/// Deterministic random-walk history.
///
/// The same seed, symbol and range always produce the same ticks. Bars are
/// `bar_interval` apart unless that would exceed `max_bars`, in which case the
/// stride is widened to fit.
#[derive(Debug, Clone)]
pub struct SyntheticHistory {
    bar_interval: Duration,
    max_bars: usize,
    volatility: f64,
    seed: u64,
}

impl SyntheticHistory {
    pub const DEFAULT_SEED: u64 = 42;

    pub fn new(settings: &BacktestSettings) -> Self {
        Self::with_seed(settings, Self::DEFAULT_SEED)
    }

    pub fn with_seed(settings: &BacktestSettings, seed: u64) -> Self {
        let bar_interval = Duration::from_std(settings.bar_interval).unwrap_or_else(|_| Duration::hours(1));
        Self {
            bar_interval: bar_interval.max(Duration::seconds(1)),
            max_bars: settings.max_bars.max(2),
            volatility: settings.volatility.max(0.0),
            seed,
        }
    }

    /// Starting price of the walk for well-known symbols.
    pub fn reference_price(symbol: &str) -> Decimal {
        match symbol {
            "EURUSD" => dec!(1.085),
            "GBPUSD" => dec!(1.27),
            "USDJPY" => dec!(150),
            "BTCUSD" => dec!(60000),
            _ => dec!(100),
        }
    }

    fn stride(&self, span: Duration) -> Duration {
        let bars = span.num_seconds() / self.bar_interval.num_seconds() + 1;
        if bars as usize <= self.max_bars {
            return self.bar_interval;
        }
        let slots = (self.max_bars - 1) as i64;
        Duration::seconds((span.num_seconds() + slots - 1) / slots)
    }

    fn symbol_seed(&self, symbol: &str) -> u64 {
        symbol
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
    }
}

#[async_trait]
impl HistoricalData for SyntheticHistory {
    async fn load(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceTick>, BacktestError> {
        if start >= end {
            return Err(BacktestError::EmptyPeriod { start, end });
        }
        let stride = self.stride(end - start);
        let mut rng = StdRng::seed_from_u64(self.symbol_seed(symbol));
        let mut price = Self::reference_price(symbol);

        let mut ticks = Vec::new();
        let mut at = start;
        while at <= end && ticks.len() < self.max_bars {
            ticks.push(PriceTick::new(symbol, price, at));
            let step = if self.volatility > 0.0 {
                rng.gen_range(-self.volatility..self.volatility)
            } else {
                0.0
            };
            if let Some(factor) = Decimal::from_f64(1.0 + step) {
                price = (price * factor).round_dp(6);
            }
            at += stride;
        }
        debug!(%symbol, bars = ticks.len(), stride = %stride, "Synthetic history generated");
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings(max_bars: usize) -> BacktestSettings {
        BacktestSettings {
            max_bars,
            ..BacktestSettings::default()
        }
    }

    fn range(days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (start, start + Duration::days(days))
    }

    #[tokio::test]
    async fn same_seed_same_history() {
        let (start, end) = range(3);
        let a = SyntheticHistory::with_seed(&settings(1000), 7).load("EURUSD", start, end).await.unwrap();
        let b = SyntheticHistory::with_seed(&settings(1000), 7).load("EURUSD", start, end).await.unwrap();
        assert_eq!(a, b);
        // Hourly bars over three days, both ends included.
        assert_eq!(a.len(), 73);
        assert_eq!(a[0].price, dec!(1.085));
        assert_eq!(a.last().unwrap().timestamp, end);
    }

    #[tokio::test]
    async fn stride_widens_to_fit_max_bars() {
        let (start, end) = range(365);
        let ticks = SyntheticHistory::new(&settings(100)).load("BTCUSD", start, end).await.unwrap();
        assert!(ticks.len() <= 100);
        assert!(ticks.len() >= 99);
        assert!(ticks.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn rejects_empty_period() {
        let (start, _) = range(1);
        let err = SyntheticHistory::new(&settings(100)).load("EURUSD", start, start).await.unwrap_err();
        assert!(matches!(err, BacktestError::EmptyPeriod { .. }));
    }
}

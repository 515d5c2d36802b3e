use crate::error::AnalyticsError;
use crate::report::PerformanceSummary;
use crate::statistics::StatisticsEngine;
use chrono::Duration;
use core_types::{EquityPoint, Trade};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tracing::debug;

/// A stateless calculator for the headline figures of a simulated run.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {
    statistics: StatisticsEngine,
}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for summarising a backtest.
    ///
    /// # Arguments
    ///
    /// * `trades` - The trades of the run. Open trades count at zero profit.
    /// * `equity_curve` - Account value over time, starting from `initial_capital`.
    /// * `initial_capital` - The starting capital of the run.
    /// * `period` - Length of the simulated period, used for annualising.
    pub fn summarize(
        &self,
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: Decimal,
        period: Duration,
    ) -> Result<PerformanceSummary, AnalyticsError> {
        if initial_capital <= Decimal::ZERO {
            return Err(AnalyticsError::InvalidInput(format!(
                "initial capital must be positive, got {initial_capital}"
            )));
        }

        let stats = self.statistics.compute(trades, &[], None);
        let final_equity = equity_curve.last().map_or(initial_capital, |p| p.value);
        let total_return_pct = (final_equity - initial_capital) / initial_capital * Decimal::ONE_HUNDRED;

        let summary = PerformanceSummary {
            total_return_pct,
            annualized_return_pct: self.annualized_return(final_equity / initial_capital, period),
            sharpe_ratio: self.sharpe_ratio(equity_curve)?,
            max_drawdown_pct: self
                .statistics
                .max_drawdown_pct(equity_curve.iter().map(|p| p.value)),
            win_rate: stats.win_rate,
            total_trades: stats.total_trades,
            profit_factor: stats.profit_factor,
        };
        debug!(?summary, "Performance summary calculated");
        Ok(summary)
    }

    /// Compounds the growth ratio over a 365-day year.
    fn annualized_return(&self, growth: Decimal, period: Duration) -> Option<Decimal> {
        let days = period.num_seconds() as f64 / 86_400.0;
        if days <= 0.0 {
            return None;
        }
        let growth = growth.to_f64()?;
        if growth <= 0.0 {
            return Some(Decimal::from(-100));
        }
        let annualized = (growth.powf(365.0 / days) - 1.0) * 100.0;
        if !annualized.is_finite() {
            return None;
        }
        Decimal::from_f64(annualized).map(|d| d.round_dp(4))
    }

    /// Mean over population standard deviation of sample-to-sample returns.
    fn sharpe_ratio(&self, equity_curve: &[EquityPoint]) -> Result<Option<Decimal>, AnalyticsError> {
        let returns: Vec<Decimal> = equity_curve
            .windows(2)
            .filter(|w| !w[0].value.is_zero())
            .map(|w| (w[1].value - w[0].value) / w[0].value)
            .collect();

        if returns.len() < 2 {
            return Ok(None);
        }

        let count = Decimal::from(returns.len());
        let mean = returns.iter().sum::<Decimal>() / count;
        let variance = returns
            .iter()
            .map(|r| (*r - mean) * (*r - mean))
            .sum::<Decimal>()
            / count;

        if variance <= Decimal::ZERO {
            return Ok(None);
        }

        let std_dev = variance
            .sqrt()
            .ok_or_else(|| AnalyticsError::Calculation("Failed to calculate square root for variance".to_string()))?;
        if std_dev.is_zero() {
            return Ok(None);
        }
        Ok(Some((mean / std_dev).round_dp(6)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::OrderSide;
    use rust_decimal_macros::dec;

    fn curve(values: &[Decimal]) -> Vec<EquityPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| EquityPoint {
                timestamp: start + Duration::days(i as i64),
                value: *v,
            })
            .collect()
    }

    #[test]
    fn rejects_non_positive_capital() {
        let err = AnalyticsEngine::new()
            .summarize(&[], &[], Decimal::ZERO, Duration::days(1))
            .unwrap_err();
        assert_eq!(err.kind(), core_types::ErrorKind::ValidationFailed);
    }

    #[test]
    fn flat_run_has_no_return_and_no_sharpe() {
        let summary = AnalyticsEngine::new()
            .summarize(&[], &curve(&[dec!(10000); 5]), dec!(10000), Duration::days(30))
            .unwrap();
        assert_eq!(summary.total_return_pct, Decimal::ZERO);
        assert_eq!(summary.annualized_return_pct, Some(Decimal::ZERO));
        assert_eq!(summary.sharpe_ratio, None);
        assert_eq!(summary.max_drawdown_pct, Decimal::ZERO);
        assert_eq!(summary.total_trades, 0);
    }

    #[test]
    fn a_year_long_gain_annualises_to_itself() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut win = Trade::open("BTCUSD", OrderSide::Buy, dec!(100), dec!(10), start, "test");
        win.close(dec!(200), start + Duration::days(10)).unwrap();

        let summary = AnalyticsEngine::new()
            .summarize(
                &[win],
                &curve(&[dec!(10000), dec!(10500), dec!(10200), dec!(11000)]),
                dec!(10000),
                Duration::days(365),
            )
            .unwrap();

        assert_eq!(summary.total_return_pct, dec!(10));
        assert_eq!(summary.annualized_return_pct, Some(dec!(10)));
        assert_eq!(summary.win_rate, dec!(100));
        assert_eq!(summary.total_trades, 1);
        assert!(summary.sharpe_ratio.is_some());
        assert!(summary.max_drawdown_pct > dec!(2.8) && summary.max_drawdown_pct < dec!(2.9));
    }
}

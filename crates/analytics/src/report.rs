use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Headline performance figures of a backtest.
///
/// Percentages are expressed in percent (12.5 means 12.5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_return_pct: Decimal,
    /// `None` when the compounded figure does not fit a `Decimal` (very short periods).
    pub annualized_return_pct: Option<Decimal>,
    /// Mean over standard deviation of per-sample equity returns, not annualised.
    pub sharpe_ratio: Option<Decimal>,
    pub max_drawdown_pct: Decimal,
    pub win_rate: Decimal,
    pub total_trades: usize,
    pub profit_factor: Option<Decimal>,
}

impl Default for PerformanceSummary {
    fn default() -> Self {
        Self {
            total_return_pct: Decimal::ZERO,
            annualized_return_pct: Some(Decimal::ZERO),
            sharpe_ratio: None,
            max_drawdown_pct: Decimal::ZERO,
            win_rate: Decimal::ZERO,
            total_trades: 0,
            profit_factor: None,
        }
    }
}

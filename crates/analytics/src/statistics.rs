use chrono::NaiveDate;
use core_types::{BotStatistics, DailyReturn, EquityPoint, Trade, TradeStatus};
use rust_decimal::Decimal;

/// A stateless calculator for a bot's running statistics.
///
/// Every non-cancelled trade counts: closed trades by realised profit, open trades
/// marked to market at `mark` (zero profit when no price has been observed yet).
/// A trade with profit > 0 is a win, anything else a loss.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatisticsEngine {}

impl StatisticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profit of a single trade, `None` for cancelled trades.
    pub fn trade_profit(&self, trade: &Trade, mark: Option<Decimal>) -> Option<Decimal> {
        match trade.status {
            TradeStatus::Cancelled => None,
            TradeStatus::Closed => trade.realized_profit(),
            TradeStatus::Open => Some(mark.map_or(Decimal::ZERO, |price| trade.profit_at(price))),
        }
    }

    /// Realised plus unrealised profit over all trades.
    pub fn net_profit(&self, trades: &[Trade], mark: Option<Decimal>) -> Decimal {
        trades
            .iter()
            .filter_map(|t| self.trade_profit(t, mark))
            .sum()
    }

    /// Recomputes the full statistics snapshot.
    pub fn compute(&self, trades: &[Trade], equity: &[EquityPoint], mark: Option<Decimal>) -> BotStatistics {
        let mut stats = BotStatistics::default();

        for profit in trades.iter().filter_map(|t| self.trade_profit(t, mark)) {
            stats.total_trades += 1;
            if profit > Decimal::ZERO {
                stats.winning_trades += 1;
                stats.total_profit += profit;
            } else {
                stats.losing_trades += 1;
                stats.total_loss += profit.abs();
            }
        }

        stats.net_profit = stats.total_profit - stats.total_loss;
        if stats.total_trades > 0 {
            stats.win_rate =
                Decimal::from(stats.winning_trades) / Decimal::from(stats.total_trades) * Decimal::ONE_HUNDRED;
        }
        if stats.total_loss > Decimal::ZERO {
            stats.profit_factor = Some(stats.total_profit / stats.total_loss);
        }
        if stats.winning_trades > 0 {
            stats.average_win = stats.total_profit / Decimal::from(stats.winning_trades);
        }
        if stats.losing_trades > 0 {
            stats.average_loss = stats.total_loss / Decimal::from(stats.losing_trades);
        }
        stats.max_drawdown = self.max_drawdown_pct(equity.iter().map(|p| p.value));

        stats
    }

    /// Largest peak-to-trough decline as a percentage of the peak.
    ///
    /// Only declines from a positive peak count; a curve that never rose above
    /// zero has no drawdown.
    pub fn max_drawdown_pct(&self, values: impl IntoIterator<Item = Decimal>) -> Decimal {
        let mut peak: Option<Decimal> = None;
        let mut max_drawdown = Decimal::ZERO;

        for value in values {
            let current_peak = match peak {
                Some(p) if p >= value => p,
                _ => {
                    peak = Some(value);
                    value
                }
            };
            if current_peak > Decimal::ZERO {
                let drawdown = (current_peak - value) / current_peak * Decimal::ONE_HUNDRED;
                if drawdown > max_drawdown {
                    max_drawdown = drawdown;
                }
            }
        }

        max_drawdown
    }

    /// Per-UTC-day change of the equity curve.
    ///
    /// Each day's value is its last equity point minus the previous day's last
    /// point (the first point of the curve for the first day).
    pub fn daily_returns(&self, equity: &[EquityPoint]) -> Vec<DailyReturn> {
        let Some(first) = equity.first() else {
            return Vec::new();
        };

        let mut closes: Vec<(NaiveDate, Decimal)> = Vec::new();
        for point in equity {
            let date = point.timestamp.date_naive();
            match closes.last_mut() {
                Some((last_date, value)) if *last_date == date => *value = point.value,
                _ => closes.push((date, point.value)),
            }
        }

        let mut previous = first.value;
        closes
            .into_iter()
            .map(|(date, close)| {
                let value = close - previous;
                previous = close;
                DailyReturn { date, value }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use core_types::OrderSide;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    fn closed(side: OrderSide, entry: Decimal, exit: Decimal) -> Trade {
        let mut trade = Trade::open("EURUSD", side, entry, dec!(100), t0(), "test");
        trade.close(exit, t0() + Duration::minutes(5)).unwrap();
        trade
    }

    fn point(offset_hours: i64, value: Decimal) -> EquityPoint {
        EquityPoint {
            timestamp: t0() + Duration::hours(offset_hours),
            value,
        }
    }

    #[test]
    fn empty_trade_list_is_all_zero() {
        let stats = StatisticsEngine::new().compute(&[], &[], None);
        assert_eq!(stats, BotStatistics::default());
        assert_eq!(stats.profit_factor, None);
    }

    #[test]
    fn mixed_trades() {
        let trades = vec![
            closed(OrderSide::Buy, dec!(1.0), dec!(1.2)),  // +20
            closed(OrderSide::Sell, dec!(1.0), dec!(0.9)), // +10
            closed(OrderSide::Buy, dec!(1.0), dec!(0.85)), // -15
        ];
        let stats = StatisticsEngine::new().compute(&trades, &[], None);

        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.winning_trades, 2);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.total_profit, dec!(30));
        assert_eq!(stats.total_loss, dec!(15));
        assert_eq!(stats.net_profit, dec!(15));
        assert_eq!(stats.profit_factor, Some(dec!(2)));
        assert_eq!(stats.average_win, dec!(15));
        assert_eq!(stats.average_loss, dec!(15));
        assert_eq!(stats.win_rate.round_dp(4), dec!(66.6667));
    }

    #[test]
    fn open_trades_are_marked_to_market() {
        let engine = StatisticsEngine::new();
        let open = Trade::open("EURUSD", OrderSide::Buy, dec!(1.0850), dec!(100), t0(), "test");

        let unmarked = engine.compute(std::slice::from_ref(&open), &[], None);
        assert_eq!((unmarked.total_trades, unmarked.losing_trades), (1, 1));

        let marked = engine.compute(std::slice::from_ref(&open), &[], Some(dec!(1.0870)));
        assert_eq!(marked.winning_trades, 1);
        assert_eq!(marked.net_profit, dec!(0.2));
    }

    #[test]
    fn cancelled_trades_are_ignored() {
        let mut trade = Trade::open("EURUSD", OrderSide::Buy, dec!(1), dec!(1), t0(), "test");
        trade.cancel().unwrap();
        assert_eq!(StatisticsEngine::new().compute(&[trade], &[], Some(dec!(2))).total_trades, 0);
    }

    #[test]
    fn drawdown_ignores_non_positive_peaks() {
        let engine = StatisticsEngine::new();
        assert_eq!(engine.max_drawdown_pct([dec!(0), dec!(-5), dec!(-10)]), Decimal::ZERO);
        assert_eq!(
            engine.max_drawdown_pct([dec!(0), dec!(100), dec!(80), dec!(120), dec!(60), dec!(90)]),
            dec!(50)
        );
    }

    #[test]
    fn daily_returns_use_the_last_point_of_each_day() {
        let equity = vec![
            point(0, dec!(0)),
            point(2, dec!(10)),
            point(5, dec!(25)),
            point(24, dec!(20)),
            point(49, dec!(40)),
        ];
        let returns = StatisticsEngine::new().daily_returns(&equity);
        let values: Vec<_> = returns.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![dec!(25), dec!(-5), dec!(20)]);
        assert_eq!(returns[0].date, t0().date_naive());
    }
}

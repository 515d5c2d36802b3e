use crate::{error::StrategyError, Strategy};
use chrono::Duration;
use core_types::{OrderSide, PriceTick, SignalIntent, SignalKind};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ta::indicators::RelativeStrengthIndex;
use ta::Next;

const OVERSOLD: f64 = 30.0;
const OVERBOUGHT: f64 = 70.0;

/// RSI mean-reversion scalper.
///
/// The RSI is fed with the first price of every `timeframe` bucket. While flat,
/// RSI dropping below 30 is a BUY and rising above 70 a SELL. Once the strategy
/// has proposed an entry it tracks it and emits CLOSE as soon as the relative
/// move reaches the profit target or the stop loss.
pub struct RsiScalper {
    rsi: RelativeStrengthIndex,
    period: usize,
    timeframe: Duration,
    profit_target: Decimal,
    stop_loss: Decimal,
    bucket: Option<i64>,
    samples: usize,
    last_rsi: Option<f64>,
    position: Option<(OrderSide, Decimal)>,
}

impl RsiScalper {
    pub fn new(
        timeframe: &str,
        period: usize,
        profit_target: Decimal,
        stop_loss: Decimal,
    ) -> Result<Self, StrategyError> {
        let timeframe = match timeframe {
            "30s" => Duration::seconds(30),
            "1m" => Duration::minutes(1),
            "5m" => Duration::minutes(5),
            other => {
                return Err(StrategyError::InvalidParameters(format!(
                    "Unsupported timeframe '{other}'."
                )));
            }
        };
        if profit_target <= Decimal::ZERO || stop_loss <= Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(
                "Profit target and stop loss must be positive.".to_string(),
            ));
        }
        let rsi = RelativeStrengthIndex::new(period)
            .map_err(|e| StrategyError::InvalidParameters(format!("Failed to initialize RSI: {e:?}")))?;
        Ok(Self {
            rsi,
            period,
            timeframe,
            profit_target,
            stop_loss,
            bucket: None,
            samples: 0,
            last_rsi: None,
            position: None,
        })
    }

    pub fn last_rsi(&self) -> Option<f64> {
        self.last_rsi
    }

    fn check_exit(&mut self, tick: &PriceTick) -> Option<SignalIntent> {
        let (side, entry) = self.position?;
        if entry.is_zero() {
            self.position = None;
            return None;
        }
        let change = (tick.price - entry) / entry;
        let favourable = match side {
            OrderSide::Buy => change,
            OrderSide::Sell => -change,
        };
        let reason = if favourable >= self.profit_target {
            "Profit target reached"
        } else if favourable <= -self.stop_loss {
            "Stop loss hit"
        } else {
            return None;
        };
        self.position = None;
        Some(SignalIntent::new(SignalKind::Close, tick.price, dec!(90), reason))
    }

    /// Feeds the RSI once per bucket; returns the fresh reading, if any.
    fn sample(&mut self, tick: &PriceTick) -> Result<Option<(Option<f64>, f64)>, StrategyError> {
        let seconds = self.timeframe.num_seconds().max(1);
        let bucket = tick.timestamp.timestamp().div_euclid(seconds);
        if self.bucket == Some(bucket) {
            return Ok(None);
        }
        self.bucket = Some(bucket);

        let price = tick
            .price
            .to_f64()
            .ok_or_else(|| StrategyError::IndicatorError(format!("Price {} is not representable", tick.price)))?;
        let value = self.rsi.next(price);
        let previous = self.last_rsi.replace(value);
        self.samples += 1;
        Ok(Some((previous, value)))
    }
}

impl Strategy for RsiScalper {
    fn evaluate(&mut self, tick: &PriceTick) -> Result<Option<SignalIntent>, StrategyError> {
        if let Some(exit) = self.check_exit(tick) {
            return Ok(Some(exit));
        }

        let Some((previous, value)) = self.sample(tick)? else {
            return Ok(None);
        };
        if self.samples <= self.period || self.position.is_some() {
            return Ok(None);
        }
        let Some(previous) = previous else {
            return Ok(None);
        };

        let (kind, side, extremity) = if previous >= OVERSOLD && value < OVERSOLD {
            (SignalKind::Buy, OrderSide::Buy, OVERSOLD - value)
        } else if previous <= OVERBOUGHT && value > OVERBOUGHT {
            (SignalKind::Sell, OrderSide::Sell, value - OVERBOUGHT)
        } else {
            return Ok(None);
        };

        self.position = Some((side, tick.price));
        let confidence = dec!(60) + Decimal::from_f64_retain(extremity.min(40.0)).unwrap_or_default();
        Ok(Some(SignalIntent::new(
            kind,
            tick.price,
            confidence.round_dp(2),
            format!("RSI({}) at {value:.1}", self.period),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn feed(scalper: &mut RsiScalper, prices: &[(i64, Decimal)]) -> Vec<SignalIntent> {
        prices
            .iter()
            .filter_map(|(m, p)| scalper.evaluate(&PriceTick::new("EURUSD", *p, at(*m))).unwrap())
            .collect()
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(RsiScalper::new("2h", 14, dec!(0.0005), dec!(0.0003)).is_err());
        assert!(RsiScalper::new("1m", 0, dec!(0.0005), dec!(0.0003)).is_err());
        assert!(RsiScalper::new("1m", 14, Decimal::ZERO, dec!(0.0003)).is_err());
    }

    #[test]
    fn samples_once_per_bucket() {
        let mut scalper = RsiScalper::new("5m", 5, dec!(0.0005), dec!(0.0003)).unwrap();
        feed(&mut scalper, &[(0, dec!(1.0)), (1, dec!(2.0)), (2, dec!(3.0))]);
        assert_eq!(scalper.samples, 1);
        feed(&mut scalper, &[(5, dec!(1.1))]);
        assert_eq!(scalper.samples, 2);
    }

    #[test]
    fn sell_off_triggers_buy_then_profit_target_closes() {
        let mut scalper = RsiScalper::new("1m", 5, dec!(0.001), dec!(0.001)).unwrap();

        // Choppy warm-up keeps RSI near the middle of the band.
        let mut prices: Vec<(i64, Decimal)> = (0..8)
            .map(|m| (m, if m % 2 == 0 { dec!(100) } else { dec!(100.1) }))
            .collect();
        // A sharp drop pushes RSI into oversold territory.
        prices.push((8, dec!(99)));
        let signals = feed(&mut scalper, &prices);

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Buy);
        let entry = signals[0].price;

        let exit = scalper
            .evaluate(&PriceTick::new("EURUSD", entry * dec!(1.002), at(9)))
            .unwrap()
            .unwrap();
        assert_eq!(exit.kind, SignalKind::Close);
        assert_eq!(exit.reason, "Profit target reached");
    }
}

use crate::{error::StrategyError, Strategy};
use chrono::{DateTime, Duration, Utc};
use core_types::{PriceTick, SignalIntent, SignalKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Accumulation strategy: buys on the first tick, then whenever the purchase
/// interval has elapsed or the price has dropped `deviation_pct` percent below
/// the last purchase. It never sells.
#[derive(Debug, Clone)]
pub struct DollarCostAveraging {
    interval: Duration,
    interval_label: String,
    amount: Decimal,
    deviation_pct: Decimal,
    last_purchase: Option<(DateTime<Utc>, Decimal)>,
}

impl DollarCostAveraging {
    pub fn new(interval: &str, amount: Decimal, deviation_pct: Decimal) -> Result<Self, StrategyError> {
        let duration = match interval {
            "hourly" => Duration::hours(1),
            "daily" => Duration::days(1),
            "weekly" => Duration::weeks(1),
            "monthly" => Duration::days(30),
            other => {
                return Err(StrategyError::InvalidParameters(format!(
                    "Unsupported purchase interval '{other}'."
                )));
            }
        };
        if amount <= Decimal::ZERO || deviation_pct <= Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(
                "Purchase amount and price deviation must be positive.".to_string(),
            ));
        }
        Ok(Self {
            interval: duration,
            interval_label: interval.to_string(),
            amount,
            deviation_pct,
            last_purchase: None,
        })
    }

    fn buy(&mut self, tick: &PriceTick, confidence: Decimal, reason: String) -> Option<SignalIntent> {
        self.last_purchase = Some((tick.timestamp, tick.price));
        Some(SignalIntent::new(SignalKind::Buy, tick.price, confidence, reason))
    }
}

impl Strategy for DollarCostAveraging {
    fn evaluate(&mut self, tick: &PriceTick) -> Result<Option<SignalIntent>, StrategyError> {
        let Some((last_time, last_price)) = self.last_purchase else {
            let reason = format!("Initial purchase of {}", self.amount);
            return Ok(self.buy(tick, dec!(60), reason));
        };

        if tick.timestamp - last_time >= self.interval {
            let reason = format!("Scheduled {} purchase of {}", self.interval_label, self.amount);
            return Ok(self.buy(tick, dec!(70), reason));
        }

        let threshold = last_price * (Decimal::ONE - self.deviation_pct / dec!(100));
        if tick.price <= threshold {
            let reason = format!(
                "Price dropped {}% below last purchase at {last_price}",
                self.deviation_pct
            );
            return Ok(self.buy(tick, dec!(85), reason));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::hours(i64::from(hour))
    }

    #[test]
    fn buys_on_schedule_and_on_dips() {
        let mut dca = DollarCostAveraging::new("daily", dec!(100), dec!(5)).unwrap();

        let first = dca.evaluate(&PriceTick::new("BTCUSD", dec!(100), at(0))).unwrap();
        assert_eq!(first.map(|s| s.kind), Some(SignalKind::Buy));

        // Small move, interval not elapsed.
        assert!(dca.evaluate(&PriceTick::new("BTCUSD", dec!(97), at(2))).unwrap().is_none());

        // 5% below the last purchase.
        let dip = dca.evaluate(&PriceTick::new("BTCUSD", dec!(95), at(3))).unwrap();
        assert_eq!(dip.map(|s| s.confidence), Some(dec!(85)));

        // The dip reset the reference; a day after it a scheduled buy fires.
        assert!(dca.evaluate(&PriceTick::new("BTCUSD", dec!(96), at(26))).unwrap().is_none());
        let scheduled = dca.evaluate(&PriceTick::new("BTCUSD", dec!(96), at(27))).unwrap();
        assert_eq!(scheduled.map(|s| s.confidence), Some(dec!(70)));
    }

    #[test]
    fn rejects_unknown_interval() {
        assert!(DollarCostAveraging::new("yearly", dec!(100), dec!(5)).is_err());
    }
}

use crate::{error::StrategyError, Strategy};
use core_types::{PriceTick, SignalIntent, SignalKind};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Grid strategy anchored at the first observed price.
///
/// Levels are `floor((price - anchor) / (anchor * spacing))`, clamped to
/// `[-levels, levels]`. Dropping into a lower level is a BUY, rising into a
/// higher one a SELL. Staying inside the current level emits nothing.
#[derive(Debug, Clone)]
pub struct GridTrading {
    spacing: Decimal,
    levels: i64,
    anchor: Option<Decimal>,
    current_level: i64,
}

impl GridTrading {
    pub fn new(spacing: Decimal, levels: usize) -> Result<Self, StrategyError> {
        if spacing <= Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(
                "Grid spacing must be positive.".to_string(),
            ));
        }
        let levels = i64::try_from(levels)
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| StrategyError::InvalidParameters("Grid levels must be positive.".to_string()))?;
        Ok(Self {
            spacing,
            levels,
            anchor: None,
            current_level: 0,
        })
    }

    pub fn anchor(&self) -> Option<Decimal> {
        self.anchor
    }

    pub fn current_level(&self) -> i64 {
        self.current_level
    }

    fn level_of(&self, anchor: Decimal, price: Decimal) -> Result<i64, StrategyError> {
        let width = anchor * self.spacing;
        if width <= Decimal::ZERO {
            return Err(StrategyError::IndicatorError(format!(
                "Grid width is not positive for anchor {anchor}"
            )));
        }
        let raw = ((price - anchor) / width).floor();
        let level = raw.to_i64().ok_or_else(|| {
            StrategyError::IndicatorError(format!("Grid level {raw} is out of range"))
        })?;
        Ok(level.clamp(-self.levels, self.levels))
    }
}

impl Strategy for GridTrading {
    fn evaluate(&mut self, tick: &PriceTick) -> Result<Option<SignalIntent>, StrategyError> {
        let Some(anchor) = self.anchor else {
            self.anchor = Some(tick.price);
            self.current_level = 0;
            debug!(symbol = %tick.symbol, anchor = %tick.price, "Grid anchored");
            return Ok(None);
        };

        let level = self.level_of(anchor, tick.price)?;
        if level == self.current_level {
            return Ok(None);
        }

        let kind = if level < self.current_level {
            SignalKind::Buy
        } else {
            SignalKind::Sell
        };
        debug!(symbol = %tick.symbol, from = self.current_level, to = level, price = %tick.price, "Grid level changed");
        self.current_level = level;

        let depth = Decimal::from(level.abs()) / Decimal::from(self.levels);
        let confidence = dec!(60) + dec!(40) * depth.min(Decimal::ONE);
        Ok(Some(SignalIntent::new(
            kind,
            tick.price,
            confidence,
            format!("Grid level {level} triggered"),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn run(strategy: &mut GridTrading, prices: &[Decimal]) -> Vec<SignalIntent> {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        prices
            .iter()
            .filter_map(|p| strategy.evaluate(&PriceTick::new("EURUSD", *p, at)).unwrap())
            .collect()
    }

    #[test]
    fn first_tick_only_anchors() {
        let mut grid = GridTrading::new(dec!(0.001), 15).unwrap();
        assert!(run(&mut grid, &[dec!(1.0850)]).is_empty());
        assert_eq!(grid.anchor(), Some(dec!(1.0850)));
    }

    #[test]
    fn rising_through_a_level_sells_once() {
        let mut grid = GridTrading::new(dec!(0.001), 15).unwrap();
        let signals = run(&mut grid, &[dec!(1.0850), dec!(1.0855), dec!(1.0870)]);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Sell);
        assert_eq!(signals[0].price, dec!(1.0870));
        assert_eq!(grid.current_level(), 1);
    }

    #[test]
    fn falling_back_buys() {
        let mut grid = GridTrading::new(dec!(0.001), 15).unwrap();
        let signals = run(&mut grid, &[dec!(1.0850), dec!(1.0870), dec!(1.0840)]);
        let kinds: Vec<_> = signals.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SignalKind::Sell, SignalKind::Buy]);
        assert_eq!(grid.current_level(), -1);
    }

    #[test]
    fn levels_are_clamped() {
        let mut grid = GridTrading::new(dec!(0.001), 3).unwrap();
        let signals = run(&mut grid, &[dec!(100), dec!(200), dec!(300)]);
        assert_eq!(signals.len(), 1);
        assert_eq!(grid.current_level(), 3);
        assert_eq!(signals[0].confidence, dec!(100));
    }

    #[test]
    fn rejects_non_positive_spacing() {
        assert!(GridTrading::new(Decimal::ZERO, 10).is_err());
        assert!(GridTrading::new(dec!(0.001), 0).is_err());
    }
}

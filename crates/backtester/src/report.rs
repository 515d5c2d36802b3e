use analytics::PerformanceSummary;
use chrono::{DateTime, Utc};
use core_types::{EquityPoint, ParameterMap, Trade};
use serde::{Deserialize, Serialize};

/// What to backtest. Omitted parameters take their catalog defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub strategy_id: String,
    pub symbol: String,
    pub parameters: ParameterMap,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The published result of a completed backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy_id: String,
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The parameters actually used, defaults included.
    pub parameters: ParameterMap,
    pub summary: PerformanceSummary,
    /// Account value over the period, sampled down to a fixed number of points.
    pub equity_curve: Vec<EquityPoint>,
    /// Every simulated trade, all closed.
    pub trades: Vec<Trade>,
}

/// Picks `samples` evenly spaced points, always keeping the first and last.
pub(crate) fn sample_curve(curve: &[EquityPoint], samples: usize) -> Vec<EquityPoint> {
    let samples = samples.max(2);
    if curve.len() <= samples {
        return curve.to_vec();
    }
    let last = curve.len() - 1;
    (0..samples)
        .map(|i| curve[(i * last + (samples - 1) / 2) / (samples - 1)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn curve(n: usize) -> Vec<EquityPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| EquityPoint {
                timestamp: start + Duration::hours(i as i64),
                value: Decimal::from(i),
            })
            .collect()
    }

    #[test]
    fn sampling_keeps_both_ends() {
        let sampled = sample_curve(&curve(1000), 100);
        assert_eq!(sampled.len(), 100);
        assert_eq!(sampled[0].value, Decimal::ZERO);
        assert_eq!(sampled[99].value, Decimal::from(999));
        assert!(sampled.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn short_curves_are_untouched() {
        assert_eq!(sample_curve(&curve(5), 100), curve(5));
    }
}

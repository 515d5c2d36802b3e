use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every section falls back to its defaults, so an absent or partial
/// `config.toml` is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSettings,
    pub simulation: Simulation,
    pub backtest: BacktestSettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Checks the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.signal_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "engine.signal_capacity must be greater than 0".to_string(),
            ));
        }
        if engine.default_lot_size <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "engine.default_lot_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&engine.auto_execute_ratio) {
            return Err(ConfigError::ValidationError(
                "engine.auto_execute_ratio must be within [0, 1]".to_string(),
            ));
        }
        if engine.feed_buffer == 0 || engine.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "engine.feed_buffer and engine.event_buffer must be greater than 0".to_string(),
            ));
        }
        if self.simulation.slippage_pct < Decimal::ZERO || self.simulation.slippage_pct >= Decimal::ONE {
            return Err(ConfigError::ValidationError(
                "simulation.slippage_pct must be within [0, 1)".to_string(),
            ));
        }

        let backtest = &self.backtest;
        if backtest.initial_capital <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "backtest.initial_capital must be positive".to_string(),
            ));
        }
        if backtest.lot_size <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "backtest.lot_size must be positive".to_string(),
            ));
        }
        if backtest.bar_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "backtest.bar_interval must be non-zero".to_string(),
            ));
        }
        if backtest.equity_samples < 2 || backtest.max_bars < 2 {
            return Err(ConfigError::ValidationError(
                "backtest.equity_samples and backtest.max_bars must be at least 2".to_string(),
            ));
        }
        if !(backtest.volatility > 0.0 && backtest.volatility < 1.0) {
            return Err(ConfigError::ValidationError(
                "backtest.volatility must be within (0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the bot supervisor and its evaluation loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// How many signals the ledger retains.
    pub signal_capacity: usize,
    /// Quantity of every trade synthesized from an executed signal.
    pub default_lot_size: Decimal,
    /// Base pause between two evaluations of the same bot.
    #[serde(with = "humantime_serde")]
    pub evaluation_interval: Duration,
    /// Upper bound of the random jitter added to `evaluation_interval`.
    #[serde(with = "humantime_serde")]
    pub evaluation_jitter: Duration,
    /// Base deferral before a signal is auto-executed.
    #[serde(with = "humantime_serde")]
    pub execution_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub execution_jitter: Duration,
    pub auto_execute: bool,
    /// Probability that a generated signal is auto-executed.
    pub auto_execute_ratio: f64,
    /// Capacity of each market-data subscription channel.
    pub feed_buffer: usize,
    /// Capacity of the engine event broadcast.
    pub event_buffer: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            signal_capacity: 100,
            default_lot_size: dec!(100),
            evaluation_interval: Duration::from_millis(250),
            evaluation_jitter: Duration::from_millis(250),
            execution_delay: Duration::from_secs(1),
            execution_jitter: Duration::from_secs(3),
            auto_execute: true,
            auto_execute_ratio: 0.7,
            feed_buffer: 1024,
            event_buffer: 1024,
        }
    }
}

/// Contains parameters for the simulated execution venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Simulation {
    /// The assumed adverse price move on every fill, as a fraction of the price.
    /// 0.0001 corresponds to 1 basis point.
    pub slippage_pct: Decimal,
    /// Time the simulated venue takes to acknowledge a fill.
    #[serde(with = "humantime_serde")]
    pub latency: Duration,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            slippage_pct: Decimal::ZERO,
            latency: Duration::from_millis(50),
        }
    }
}

/// Contains parameters for a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    /// The initial starting capital for the simulation.
    pub initial_capital: Decimal,
    /// Quantity traded per simulated position.
    pub lot_size: Decimal,
    /// Spacing of the historical price samples.
    #[serde(with = "humantime_serde")]
    pub bar_interval: Duration,
    /// Number of points the published equity curve is sampled down to.
    pub equity_samples: usize,
    /// Upper bound on the number of bars replayed for one backtest.
    pub max_bars: usize,
    /// Per-bar volatility of the synthetic price history.
    pub volatility: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            lot_size: Decimal::ONE,
            bar_interval: Duration::from_secs(3600),
            equity_samples: 100,
            max_bars: 50_000,
            volatility: 0.002,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub format: LogFormat,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            directory: None,
        }
    }
}

//! The static strategy catalog.
//!
//! A `StrategyDefinition` describes a strategy to the outside world: what it is
//! called, how risky it is, which parameters it accepts and the bounds those
//! parameters must respect. The catalog is read-only after construction and is
//! shared by the supervisor, the backtester and the CLI.

use crate::error::StrategyError;
use core_types::{BotConfiguration, ParamValue, ParameterMap, RiskLevel, StrategyCategory};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const GRID_TRADING: &str = "grid-trading";
pub const DCA_BOT: &str = "dca-bot";
pub const SCALPING_BOT: &str = "scalping-bot";
pub const TREND_FOLLOWING: &str = "trend-following";
pub const SMA_CROSSOVER: &str = "sma-crossover";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ParameterKind {
    Number,
    Text,
    Boolean,
    Select { options: Vec<String> },
    Range,
}

/// Schema for a single strategy parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub key: String,
    pub name: String,
    pub kind: ParameterKind,
    pub default: ParamValue,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub step: Option<Decimal>,
    pub description: String,
    pub required: bool,
}

impl ParameterSpec {
    /// A required numeric parameter bounded by `[min, max]` on a `step` grid.
    pub fn number(
        key: &str,
        name: &str,
        default: Decimal,
        (min, max, step): (Decimal, Decimal, Decimal),
        description: &str,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            kind: ParameterKind::Number,
            default: ParamValue::Number(default),
            min: Some(min),
            max: Some(max),
            step: Some(step),
            description: description.to_string(),
            required: true,
        }
    }

    pub fn select(key: &str, name: &str, default: &str, options: &[&str], description: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            kind: ParameterKind::Select {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            default: ParamValue::Text(default.to_string()),
            min: None,
            max: None,
            step: None,
            description: description.to_string(),
            required: true,
        }
    }

    /// Checks a single value against this schema.
    pub fn validate(&self, value: &ParamValue) -> Result<(), StrategyError> {
        match &self.kind {
            ParameterKind::Number | ParameterKind::Range => {
                let number = value.as_number().ok_or_else(|| self.type_mismatch("number", value))?;
                self.check_bounds(number)
            }
            ParameterKind::Text => value
                .as_text()
                .map(|_| ())
                .ok_or_else(|| self.type_mismatch("text", value)),
            ParameterKind::Boolean => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| self.type_mismatch("boolean", value)),
            ParameterKind::Select { options } => {
                let text = value.as_text().ok_or_else(|| self.type_mismatch("text", value))?;
                if options.iter().any(|o| o == text) {
                    Ok(())
                } else {
                    Err(StrategyError::validation(
                        &self.key,
                        format!("'{}' is not one of [{}]", text, options.join(", ")),
                    ))
                }
            }
        }
    }

    fn check_bounds(&self, number: Decimal) -> Result<(), StrategyError> {
        if let Some(min) = self.min {
            if number < min {
                return Err(StrategyError::validation(
                    &self.key,
                    format!("{number} is below the minimum of {min}"),
                ));
            }
        }
        if let Some(max) = self.max {
            if number > max {
                return Err(StrategyError::validation(
                    &self.key,
                    format!("{number} is above the maximum of {max}"),
                ));
            }
        }
        if let Some(step) = self.step {
            let base = self.min.unwrap_or(Decimal::ZERO);
            if step > Decimal::ZERO && !((number - base) % step).is_zero() {
                return Err(StrategyError::validation(
                    &self.key,
                    format!("{number} is not on the {step} step grid starting at {base}"),
                ));
            }
        }
        Ok(())
    }

    fn type_mismatch(&self, expected: &str, value: &ParamValue) -> StrategyError {
        StrategyError::validation(
            &self.key,
            format!("expected a {expected} value, got {}", value.type_name()),
        )
    }
}

/// A rule spanning more than one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum ParameterConstraint {
    /// `lesser` must be strictly below `greater`.
    LessThan { lesser: String, greater: String },
}

/// Historical figures shown next to a strategy. Display data only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPerformance {
    pub average_return: Decimal,
    pub win_rate: Decimal,
    pub max_drawdown: Decimal,
    pub total_trades: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: StrategyCategory,
    pub risk_level: RiskLevel,
    pub min_balance: Decimal,
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub constraints: Vec<ParameterConstraint>,
    pub performance: Option<PublishedPerformance>,
}

impl StrategyDefinition {
    pub fn parameter(&self, key: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.key == key)
    }

    /// Validates a user-supplied parameter map.
    ///
    /// Every supplied key must be known, every required key must be present,
    /// and every value must satisfy its schema and the cross-parameter rules.
    pub fn validate_parameters(&self, parameters: &ParameterMap) -> Result<(), StrategyError> {
        for key in parameters.keys() {
            if self.parameter(key).is_none() {
                return Err(StrategyError::validation(key, "unknown parameter"));
            }
        }
        for spec in &self.parameters {
            match parameters.get(&spec.key) {
                Some(value) => spec.validate(value)?,
                None if spec.required => {
                    return Err(StrategyError::validation(&spec.key, "required parameter is missing"));
                }
                None => {}
            }
        }
        self.check_constraints(&self.with_defaults(parameters))
    }

    /// Validates the supplied values and fills every omitted key with its default.
    ///
    /// Unlike `validate_parameters`, a missing required key is not an error here.
    pub fn resolve_parameters(&self, parameters: &ParameterMap) -> Result<ResolvedParameters, StrategyError> {
        for (key, value) in parameters {
            let spec = self
                .parameter(key)
                .ok_or_else(|| StrategyError::validation(key, "unknown parameter"))?;
            spec.validate(value)?;
        }
        let merged = self.with_defaults(parameters);
        self.check_constraints(&merged)?;
        Ok(ResolvedParameters { values: merged })
    }

    fn with_defaults(&self, parameters: &ParameterMap) -> ParameterMap {
        let mut merged = parameters.clone();
        for spec in &self.parameters {
            merged
                .entry(spec.key.clone())
                .or_insert_with(|| spec.default.clone());
        }
        merged
    }

    fn check_constraints(&self, merged: &ParameterMap) -> Result<(), StrategyError> {
        for constraint in &self.constraints {
            match constraint {
                ParameterConstraint::LessThan { lesser, greater } => {
                    let low = merged.get(lesser).and_then(ParamValue::as_number);
                    let high = merged.get(greater).and_then(ParamValue::as_number);
                    if let (Some(low), Some(high)) = (low, high) {
                        if low >= high {
                            return Err(StrategyError::validation(
                                lesser,
                                format!("must be less than {greater} ({low} >= {high})"),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// A complete, validated parameter set with typed accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameters {
    values: ParameterMap,
}

impl ResolvedParameters {
    pub fn values(&self) -> &ParameterMap {
        &self.values
    }

    pub fn number(&self, key: &str) -> Result<Decimal, StrategyError> {
        self.values
            .get(key)
            .and_then(ParamValue::as_number)
            .ok_or_else(|| StrategyError::InvalidParameters(format!("'{key}' is not a number")))
    }

    /// A strictly positive whole number, e.g. a period or a level count.
    pub fn count(&self, key: &str) -> Result<usize, StrategyError> {
        let number = self.number(key)?;
        if number.fract().is_zero() && number > Decimal::ZERO {
            number
                .to_usize()
                .ok_or_else(|| StrategyError::InvalidParameters(format!("'{key}' is out of range")))
        } else {
            Err(StrategyError::InvalidParameters(format!(
                "'{key}' must be a positive whole number, got {number}"
            )))
        }
    }

    pub fn text(&self, key: &str) -> Result<&str, StrategyError> {
        self.values
            .get(key)
            .and_then(ParamValue::as_text)
            .ok_or_else(|| StrategyError::InvalidParameters(format!("'{key}' is not text")))
    }
}

/// The read-only registry of strategy definitions.
#[derive(Debug, Clone)]
pub struct StrategyCatalog {
    strategies: Vec<StrategyDefinition>,
}

impl StrategyCatalog {
    /// Builds a catalog from custom definitions. Ids must be unique.
    pub fn new(strategies: Vec<StrategyDefinition>) -> Result<Self, StrategyError> {
        let mut seen = HashSet::new();
        for definition in &strategies {
            if !seen.insert(definition.id.as_str()) {
                return Err(StrategyError::DuplicateStrategy(definition.id.clone()));
            }
        }
        Ok(Self { strategies })
    }

    /// The built-in strategies shipped with the engine.
    pub fn builtin() -> Self {
        Self {
            strategies: vec![
                grid_trading(),
                dca_bot(),
                scalping_bot(),
                trend_following(),
                sma_crossover(),
            ],
        }
    }

    pub fn list(&self) -> &[StrategyDefinition] {
        &self.strategies
    }

    pub fn get(&self, id: &str) -> Result<&StrategyDefinition, StrategyError> {
        self.strategies
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| StrategyError::NotFound(id.to_string()))
    }

    pub fn resolve_parameters(&self, id: &str, parameters: &ParameterMap) -> Result<ResolvedParameters, StrategyError> {
        self.get(id)?.resolve_parameters(parameters)
    }

    /// Validates a complete bot configuration: the strategy reference, the
    /// identity fields, risk limits, the schedule and the parameter map.
    pub fn validate(&self, config: &BotConfiguration) -> Result<(), StrategyError> {
        let definition = self.get(&config.strategy_id)?;

        if config.name.trim().is_empty() {
            return Err(StrategyError::validation("name", "must not be empty"));
        }
        if config.symbol.trim().is_empty() {
            return Err(StrategyError::validation("symbol", "must not be empty"));
        }

        let risk = &config.risk_management;
        if risk.max_position_size <= Decimal::ZERO {
            return Err(StrategyError::validation(
                "risk_management.max_position_size",
                "must be positive",
            ));
        }
        if risk.max_daily_loss <= Decimal::ZERO {
            return Err(StrategyError::validation("risk_management.max_daily_loss", "must be positive"));
        }
        if risk.max_concurrent_trades == 0 {
            return Err(StrategyError::validation(
                "risk_management.max_concurrent_trades",
                "must be at least 1",
            ));
        }
        for (key, limit) in [
            ("risk_management.stop_loss", risk.stop_loss),
            ("risk_management.take_profit", risk.take_profit),
        ] {
            if matches!(limit, Some(value) if value <= Decimal::ZERO) {
                return Err(StrategyError::validation(key, "must be positive when set"));
            }
        }

        let schedule = &config.schedule;
        if let (Some(start), Some(end)) = (schedule.start_time, schedule.end_time) {
            if start == end {
                return Err(StrategyError::validation(
                    "schedule.end_time",
                    "start and end of the trading window must differ",
                ));
            }
        }
        if schedule.enabled && schedule.trading_days.is_empty() {
            return Err(StrategyError::validation(
                "schedule.trading_days",
                "an enabled schedule needs at least one trading day",
            ));
        }

        definition.validate_parameters(&config.parameters)
    }
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn grid_trading() -> StrategyDefinition {
    StrategyDefinition {
        id: GRID_TRADING.to_string(),
        name: "Grid Trading".to_string(),
        description: "Places buy and sell orders at fixed price intervals around the opening price".to_string(),
        category: StrategyCategory::Grid,
        risk_level: RiskLevel::Medium,
        min_balance: dec!(1000),
        parameters: vec![
            ParameterSpec::number(
                "gridSpacing",
                "Grid Spacing",
                dec!(0.001),
                (dec!(0.0001), dec!(0.01), dec!(0.0001)),
                "Distance between grid levels as a fraction of the anchor price",
            ),
            ParameterSpec::number(
                "gridLevels",
                "Grid Levels",
                dec!(10),
                (dec!(3), dec!(50), dec!(1)),
                "Number of levels on each side of the anchor",
            ),
            ParameterSpec::number(
                "positionSize",
                "Position Size",
                dec!(100),
                (dec!(10), dec!(10000), dec!(10)),
                "Size of each grid order",
            ),
        ],
        constraints: Vec::new(),
        performance: Some(PublishedPerformance {
            average_return: dec!(12.5),
            win_rate: dec!(75),
            max_drawdown: dec!(8.2),
            total_trades: 1250,
        }),
    }
}

fn dca_bot() -> StrategyDefinition {
    StrategyDefinition {
        id: DCA_BOT.to_string(),
        name: "DCA Bot".to_string(),
        description: "Accumulates a position with fixed-size purchases on a schedule and on dips".to_string(),
        category: StrategyCategory::DollarCostAveraging,
        risk_level: RiskLevel::Low,
        min_balance: dec!(500),
        parameters: vec![
            ParameterSpec::select(
                "interval",
                "Purchase Interval",
                "daily",
                &["hourly", "daily", "weekly", "monthly"],
                "How often a scheduled purchase is made",
            ),
            ParameterSpec::number(
                "amount",
                "Purchase Amount",
                dec!(100),
                (dec!(10), dec!(1000), dec!(10)),
                "Amount spent on each purchase",
            ),
            ParameterSpec::number(
                "priceDeviation",
                "Price Deviation %",
                dec!(5),
                (dec!(1), dec!(20), dec!(0.5)),
                "Drop below the last purchase price that triggers an extra buy",
            ),
        ],
        constraints: Vec::new(),
        performance: Some(PublishedPerformance {
            average_return: dec!(18.3),
            win_rate: dec!(85),
            max_drawdown: dec!(15.1),
            total_trades: 365,
        }),
    }
}

fn scalping_bot() -> StrategyDefinition {
    StrategyDefinition {
        id: SCALPING_BOT.to_string(),
        name: "Scalping Bot".to_string(),
        description: "Trades short RSI extremes and exits quickly on small profit targets".to_string(),
        category: StrategyCategory::Scalping,
        risk_level: RiskLevel::High,
        min_balance: dec!(2000),
        parameters: vec![
            ParameterSpec::select("timeframe", "Timeframe", "1m", &["30s", "1m", "5m"], "Sampling bar size"),
            ParameterSpec::number(
                "rsiPeriod",
                "RSI Period",
                dec!(14),
                (dec!(5), dec!(50), dec!(1)),
                "Lookback of the relative strength index",
            ),
            ParameterSpec::number(
                "profitTarget",
                "Profit Target",
                dec!(0.0005),
                (dec!(0.0001), dec!(0.01), dec!(0.0001)),
                "Relative gain at which a position is closed",
            ),
            ParameterSpec::number(
                "stopLoss",
                "Stop Loss",
                dec!(0.0003),
                (dec!(0.0001), dec!(0.01), dec!(0.0001)),
                "Relative loss at which a position is closed",
            ),
        ],
        constraints: Vec::new(),
        performance: Some(PublishedPerformance {
            average_return: dec!(25.7),
            win_rate: dec!(62),
            max_drawdown: dec!(12.8),
            total_trades: 2840,
        }),
    }
}

fn trend_following() -> StrategyDefinition {
    StrategyDefinition {
        id: TREND_FOLLOWING.to_string(),
        name: "Trend Following".to_string(),
        description: "Follows established trends using a fast and a slow moving average".to_string(),
        category: StrategyCategory::Trend,
        risk_level: RiskLevel::Medium,
        min_balance: dec!(1500),
        parameters: vec![
            ParameterSpec::number("fastMA", "Fast MA", dec!(20), (dec!(5), dec!(100), dec!(1)), "Fast moving average period"),
            ParameterSpec::number("slowMA", "Slow MA", dec!(50), (dec!(20), dec!(200), dec!(1)), "Slow moving average period"),
            ParameterSpec::number(
                "riskPercent",
                "Risk %",
                dec!(2),
                (dec!(0.5), dec!(10), dec!(0.5)),
                "Share of the balance risked per trade",
            ),
        ],
        constraints: vec![ParameterConstraint::LessThan {
            lesser: "fastMA".to_string(),
            greater: "slowMA".to_string(),
        }],
        performance: Some(PublishedPerformance {
            average_return: dec!(22.1),
            win_rate: dec!(58),
            max_drawdown: dec!(18.5),
            total_trades: 145,
        }),
    }
}

fn sma_crossover() -> StrategyDefinition {
    StrategyDefinition {
        id: SMA_CROSSOVER.to_string(),
        name: "SMA Crossover".to_string(),
        description: "Classic simple moving average crossover".to_string(),
        category: StrategyCategory::Trend,
        risk_level: RiskLevel::Medium,
        min_balance: Decimal::ZERO,
        parameters: vec![
            ParameterSpec::number("fastPeriod", "Fast Period", dec!(9), (dec!(2), dec!(500), dec!(1)), "Fast SMA period"),
            ParameterSpec::number("slowPeriod", "Slow Period", dec!(21), (dec!(3), dec!(500), dec!(1)), "Slow SMA period"),
        ],
        constraints: vec![ParameterConstraint::LessThan {
            lesser: "fastPeriod".to_string(),
            greater: "slowPeriod".to_string(),
        }],
        performance: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{RiskManagement, TradingSchedule};

    fn config(strategy_id: &str, parameters: &[(&str, ParamValue)]) -> BotConfiguration {
        BotConfiguration {
            strategy_id: strategy_id.to_string(),
            name: "EURUSD Grid".to_string(),
            symbol: "EURUSD".to_string(),
            parameters: parameters.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            risk_management: RiskManagement {
                max_position_size: dec!(1000),
                stop_loss: Some(dec!(50)),
                take_profit: Some(dec!(100)),
                max_daily_loss: dec!(200),
                max_concurrent_trades: 5,
            },
            schedule: TradingSchedule::always(),
        }
    }

    fn grid_params() -> Vec<(&'static str, ParamValue)> {
        vec![
            ("gridSpacing", dec!(0.001).into()),
            ("gridLevels", ParamValue::from(15)),
            ("positionSize", dec!(500).into()),
        ]
    }

    #[test]
    fn builtin_catalog_has_unique_ids() {
        let catalog = StrategyCatalog::builtin();
        assert_eq!(catalog.list().len(), 5);
        assert!(StrategyCatalog::new(catalog.list().to_vec()).is_ok());

        let mut duplicated = catalog.list().to_vec();
        duplicated.push(grid_trading());
        assert_eq!(
            StrategyCatalog::new(duplicated).unwrap_err(),
            StrategyError::DuplicateStrategy(GRID_TRADING.to_string())
        );
    }

    #[test]
    fn unknown_strategy_is_not_found() {
        let err = StrategyCatalog::builtin().get("martingale").unwrap_err();
        assert_eq!(err.kind(), core_types::ErrorKind::NotFound);
    }

    #[test]
    fn valid_grid_configuration_passes() {
        let catalog = StrategyCatalog::builtin();
        assert!(catalog.validate(&config(GRID_TRADING, &grid_params())).is_ok());
    }

    #[test]
    fn out_of_range_parameter_names_the_key() {
        let mut params = grid_params();
        params[1] = ("gridLevels", ParamValue::from(60));
        let err = StrategyCatalog::builtin()
            .validate(&config(GRID_TRADING, &params))
            .unwrap_err();
        match err {
            StrategyError::ValidationFailed { key, .. } => assert_eq!(key, "gridLevels"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn off_grid_step_is_rejected() {
        let mut params = grid_params();
        params[0] = ("gridSpacing", dec!(0.00015).into());
        let err = StrategyCatalog::builtin()
            .validate(&config(GRID_TRADING, &params))
            .unwrap_err();
        assert!(matches!(err, StrategyError::ValidationFailed { ref key, .. } if key == "gridSpacing"));
    }

    #[test]
    fn missing_unknown_and_mistyped_parameters_are_rejected() {
        let catalog = StrategyCatalog::builtin();

        let missing = &grid_params()[..2];
        assert!(catalog.validate(&config(GRID_TRADING, missing)).is_err());

        let mut unknown = grid_params();
        unknown.push(("leverage", ParamValue::from(10)));
        assert!(catalog.validate(&config(GRID_TRADING, &unknown)).is_err());

        let mut mistyped = grid_params();
        mistyped[1] = ("gridLevels", ParamValue::from("fifteen"));
        assert!(catalog.validate(&config(GRID_TRADING, &mistyped)).is_err());
    }

    #[test]
    fn select_options_are_enforced() {
        let catalog = StrategyCatalog::builtin();
        let ok = [
            ("interval", ParamValue::from("weekly")),
            ("amount", ParamValue::from(50)),
            ("priceDeviation", dec!(2.5).into()),
        ];
        assert!(catalog.validate(&config(DCA_BOT, &ok)).is_ok());

        let mut bad = ok.to_vec();
        bad[0] = ("interval", ParamValue::from("yearly"));
        assert!(catalog.validate(&config(DCA_BOT, &bad)).is_err());
    }

    #[test]
    fn fast_period_must_be_below_slow_period() {
        let catalog = StrategyCatalog::builtin();
        let params = [("fastPeriod", ParamValue::from(30)), ("slowPeriod", ParamValue::from(21))];
        let err = catalog.validate(&config(SMA_CROSSOVER, &params)).unwrap_err();
        assert!(matches!(err, StrategyError::ValidationFailed { ref key, .. } if key == "fastPeriod"));
    }

    #[test]
    fn configuration_level_rules() {
        let catalog = StrategyCatalog::builtin();

        let mut blank = config(GRID_TRADING, &grid_params());
        blank.symbol = "  ".to_string();
        assert!(catalog.validate(&blank).is_err());

        let mut no_risk = config(GRID_TRADING, &grid_params());
        no_risk.risk_management.max_position_size = Decimal::ZERO;
        assert!(catalog.validate(&no_risk).is_err());

        let mut empty_window = config(GRID_TRADING, &grid_params());
        let nine = chrono::NaiveTime::from_hms_opt(9, 0, 0);
        empty_window.schedule.start_time = nine;
        empty_window.schedule.end_time = nine;
        assert!(catalog.validate(&empty_window).is_err());
    }

    #[test]
    fn resolve_fills_defaults() {
        let catalog = StrategyCatalog::builtin();
        let mut supplied = ParameterMap::new();
        supplied.insert("gridLevels".to_string(), ParamValue::from(20));

        let resolved = catalog.resolve_parameters(GRID_TRADING, &supplied).unwrap();
        assert_eq!(resolved.count("gridLevels").unwrap(), 20);
        assert_eq!(resolved.number("gridSpacing").unwrap(), dec!(0.001));
        assert_eq!(resolved.number("positionSize").unwrap(), dec!(100));
        assert_eq!(resolved.values().len(), 3);
    }
}

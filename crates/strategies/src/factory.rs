use crate::catalog::{
    ResolvedParameters, StrategyDefinition, DCA_BOT, GRID_TRADING, SCALPING_BOT, SMA_CROSSOVER,
    TREND_FOLLOWING,
};
use crate::dca::DollarCostAveraging;
use crate::error::StrategyError;
use crate::grid::GridTrading;
use crate::ma_crossover::MovingAverageCrossover;
use crate::scalper::RsiScalper;
use crate::Strategy;
use core_types::ParameterMap;

/// Builds strategy instances for catalog definitions.
///
/// The supervisor and the backtester hold a factory rather than calling
/// `create_strategy` directly so tests can inject scripted strategies.
pub trait StrategyFactory: Send + Sync {
    fn build(
        &self,
        definition: &StrategyDefinition,
        parameters: &ParameterMap,
    ) -> Result<Box<dyn Strategy>, StrategyError>;
}

/// The production factory covering every built-in strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogStrategyFactory;

impl StrategyFactory for CatalogStrategyFactory {
    fn build(
        &self,
        definition: &StrategyDefinition,
        parameters: &ParameterMap,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        create_strategy(definition, parameters)
    }
}

/// Creates a new strategy instance for the definition, with omitted
/// parameters filled from their defaults.
pub fn create_strategy(
    definition: &StrategyDefinition,
    parameters: &ParameterMap,
) -> Result<Box<dyn Strategy>, StrategyError> {
    let params = definition.resolve_parameters(parameters)?;
    build_resolved(&definition.id, &params)
}

fn build_resolved(id: &str, params: &ResolvedParameters) -> Result<Box<dyn Strategy>, StrategyError> {
    match id {
        SMA_CROSSOVER => Ok(Box::new(MovingAverageCrossover::new(
            params.count("fastPeriod")?,
            params.count("slowPeriod")?,
        )?)),
        TREND_FOLLOWING => Ok(Box::new(MovingAverageCrossover::new(
            params.count("fastMA")?,
            params.count("slowMA")?,
        )?)),
        GRID_TRADING => Ok(Box::new(GridTrading::new(
            params.number("gridSpacing")?,
            params.count("gridLevels")?,
        )?)),
        DCA_BOT => Ok(Box::new(DollarCostAveraging::new(
            params.text("interval")?,
            params.number("amount")?,
            params.number("priceDeviation")?,
        )?)),
        SCALPING_BOT => Ok(Box::new(RsiScalper::new(
            params.text("timeframe")?,
            params.count("rsiPeriod")?,
            params.number("profitTarget")?,
            params.number("stopLoss")?,
        )?)),
        other => Err(StrategyError::NotImplemented(other.to_string())),
    }
}

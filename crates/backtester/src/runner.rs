use crate::error::BacktestError;
use crate::history::HistoricalData;
use crate::report::{sample_curve, BacktestReport, BacktestRequest};
use analytics::AnalyticsEngine;
use configuration::BacktestSettings;
use core_types::{EquityPoint, PriceTick, SignalIntent, Trade};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strategies::{CatalogStrategyFactory, Strategy, StrategyCatalog, StrategyFactory};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bars replayed between two cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 512;

struct Shared {
    catalog: Arc<StrategyCatalog>,
    factory: Arc<dyn StrategyFactory>,
    history: Arc<dyn HistoricalData>,
    settings: BacktestSettings,
    analytics: AnalyticsEngine,
    show_progress: bool,
    in_flight: AtomicBool,
    last_report: Mutex<Option<BacktestReport>>,
}

/// Marks the runner busy for as long as it lives.
struct InFlight {
    shared: Arc<Shared>,
}

impl InFlight {
    fn acquire(shared: &Arc<Shared>) -> Result<Self, BacktestError> {
        shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BacktestError::AlreadyRunning)?;
        Ok(Self {
            shared: shared.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
    }
}

/// A backtest running in the background.
pub struct BacktestJob {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<Result<BacktestReport, BacktestError>>,
}

impl BacktestJob {
    /// Asks the job to stop. It fails with `Cancelled` at its next check.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub async fn join(self) -> Result<BacktestReport, BacktestError> {
        self.handle
            .await
            .map_err(|e| BacktestError::Join(e.to_string()))?
    }
}

/// Replays historical prices through a freshly built strategy.
///
/// A runner executes at most one backtest at a time; a request made while one
/// is in flight is rejected with `AlreadyRunning`. Only successful runs replace
/// `last_report`.
#[derive(Clone)]
pub struct BacktestRunner {
    inner: Arc<Shared>,
}

impl BacktestRunner {
    pub fn new(
        catalog: Arc<StrategyCatalog>,
        history: Arc<dyn HistoricalData>,
        settings: BacktestSettings,
    ) -> Self {
        Self::with_factory(catalog, Arc::new(CatalogStrategyFactory), history, settings)
    }

    pub fn with_factory(
        catalog: Arc<StrategyCatalog>,
        factory: Arc<dyn StrategyFactory>,
        history: Arc<dyn HistoricalData>,
        settings: BacktestSettings,
    ) -> Self {
        Self::build(catalog, factory, history, settings, false)
    }

    /// Rebuilds the runner so it draws a progress bar on stderr while replaying.
    pub fn with_progress(self, show_progress: bool) -> Self {
        let shared = &self.inner;
        Self::build(
            shared.catalog.clone(),
            shared.factory.clone(),
            shared.history.clone(),
            shared.settings.clone(),
            show_progress,
        )
    }

    fn build(
        catalog: Arc<StrategyCatalog>,
        factory: Arc<dyn StrategyFactory>,
        history: Arc<dyn HistoricalData>,
        settings: BacktestSettings,
        show_progress: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                catalog,
                factory,
                history,
                settings,
                analytics: AnalyticsEngine::new(),
                show_progress,
                in_flight: AtomicBool::new(false),
                last_report: Mutex::new(None),
            }),
        }
    }

    pub fn is_backtesting(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// The report of the last successful backtest.
    pub fn last_report(&self) -> Option<BacktestReport> {
        self.inner.last_report.lock().clone()
    }

    /// Runs a backtest to completion.
    pub async fn run(&self, request: BacktestRequest) -> Result<BacktestReport, BacktestError> {
        let (_keep_open, cancel) = watch::channel(false);
        self.run_until_cancelled(request, cancel).await
    }

    /// Runs a backtest that fails with `Cancelled` once `cancel` turns true.
    pub async fn run_until_cancelled(
        &self,
        request: BacktestRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<BacktestReport, BacktestError> {
        let flight = InFlight::acquire(&self.inner)?;
        self.run_acquired(flight, request, cancel).await
    }

    /// Starts a backtest in the background. The runner is busy from the moment
    /// this returns.
    pub fn spawn(&self, request: BacktestRequest) -> Result<BacktestJob, BacktestError> {
        let flight = InFlight::acquire(&self.inner)?;
        let (cancel, cancel_rx) = watch::channel(false);
        let runner = self.clone();
        let handle = tokio::spawn(async move { runner.run_acquired(flight, request, cancel_rx).await });
        Ok(BacktestJob { cancel, handle })
    }

    async fn run_acquired(
        &self,
        _flight: InFlight,
        request: BacktestRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<BacktestReport, BacktestError> {
        info!(strategy = %request.strategy_id, symbol = %request.symbol, start = %request.start, end = %request.end, "Backtest started");
        match self.execute(request, cancel).await {
            Ok(report) => {
                info!(
                    trades = report.summary.total_trades,
                    total_return_pct = %report.summary.total_return_pct,
                    "Backtest complete"
                );
                *self.inner.last_report.lock() = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Backtest failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: BacktestRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<BacktestReport, BacktestError> {
        let shared = &self.inner;
        let definition = shared
            .catalog
            .get(&request.strategy_id)
            .map_err(|_| BacktestError::UnknownStrategy(request.strategy_id.clone()))?;
        if request.start >= request.end {
            return Err(BacktestError::EmptyPeriod {
                start: request.start,
                end: request.end,
            });
        }
        let parameters = definition.resolve_parameters(&request.parameters)?;
        let strategy = shared.factory.build(definition, parameters.values())?;

        let ticks = shared
            .history
            .load(&request.symbol, request.start, request.end)
            .await?;
        if ticks.is_empty() {
            return Err(BacktestError::DataUnavailable {
                symbol: request.symbol,
            });
        }

        let progress = if shared.show_progress {
            let bar = ProgressBar::new(ticks.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                    .progress_chars("=>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut simulation = Simulation::new(shared.settings.initial_capital, shared.settings.lot_size, strategy);
        let outcome = simulation.replay(&ticks, &cancel, &progress).await;
        progress.finish_and_clear();
        outcome?;
        let (trades, equity) = simulation.finish();

        let summary = shared.analytics.summarize(
            &trades,
            &equity,
            shared.settings.initial_capital,
            request.end - request.start,
        )?;

        Ok(BacktestReport {
            strategy_id: request.strategy_id,
            symbol: request.symbol,
            start: request.start,
            end: request.end,
            parameters: parameters.values().clone(),
            summary,
            equity_curve: sample_curve(&equity, shared.settings.equity_samples),
            trades,
        })
    }
}

/// The single-position book of one backtest.
struct Simulation {
    strategy: Box<dyn Strategy>,
    initial_capital: Decimal,
    lot_size: Decimal,
    position: Option<Trade>,
    realised: Decimal,
    trades: Vec<Trade>,
    equity: Vec<EquityPoint>,
    last_tick: Option<PriceTick>,
}

impl Simulation {
    fn new(initial_capital: Decimal, lot_size: Decimal, strategy: Box<dyn Strategy>) -> Self {
        Self {
            strategy,
            initial_capital,
            lot_size,
            position: None,
            realised: Decimal::ZERO,
            trades: Vec::new(),
            equity: Vec::new(),
            last_tick: None,
        }
    }

    async fn replay(
        &mut self,
        ticks: &[PriceTick],
        cancel: &watch::Receiver<bool>,
        progress: &ProgressBar,
    ) -> Result<(), BacktestError> {
        for (i, tick) in ticks.iter().enumerate() {
            if i % CANCEL_CHECK_INTERVAL == 0 {
                if *cancel.borrow() {
                    return Err(BacktestError::Cancelled);
                }
                progress.set_position(i as u64);
                tokio::task::yield_now().await;
            }

            if let Some(intent) = self.strategy.evaluate(tick)? {
                self.apply(intent, tick)?;
            }
            self.mark(tick);
        }
        progress.set_position(ticks.len() as u64);
        Ok(())
    }

    /// BUY opens a long or closes a short, SELL the reverse, CLOSE flattens.
    fn apply(&mut self, intent: SignalIntent, tick: &PriceTick) -> Result<(), BacktestError> {
        let held = self.position.as_ref().map(|t| t.side);
        match (intent.kind.entry_side(), held) {
            (Some(side), None) => {
                debug!(?side, price = %tick.price, reason = %intent.reason, "Position opened");
                self.position = Some(Trade::open(&tick.symbol, side, tick.price, self.lot_size, tick.timestamp, intent.reason));
            }
            (Some(side), Some(held)) if side == held.opposite() => self.flatten(tick)?,
            (None, Some(_)) => self.flatten(tick)?,
            _ => {}
        }
        Ok(())
    }

    fn flatten(&mut self, tick: &PriceTick) -> Result<(), BacktestError> {
        if let Some(mut trade) = self.position.take() {
            trade.close(tick.price, tick.timestamp)?;
            self.realised += trade.realized_profit().unwrap_or_default();
            debug!(price = %tick.price, profit = ?trade.realized_profit(), "Position closed");
            self.trades.push(trade);
        }
        Ok(())
    }

    fn mark(&mut self, tick: &PriceTick) {
        let unrealised = self
            .position
            .as_ref()
            .map_or(Decimal::ZERO, |t| t.profit_at(tick.price));
        self.equity.push(EquityPoint {
            timestamp: tick.timestamp,
            value: self.initial_capital + self.realised + unrealised,
        });
        self.last_tick = Some(tick.clone());
    }

    /// Force-closes any open position at the last tick.
    fn finish(mut self) -> (Vec<Trade>, Vec<EquityPoint>) {
        if let Some(tick) = self.last_tick.take() {
            // Marking already valued the position at this price, so equity is unchanged.
            if let Err(e) = self.flatten(&tick) {
                warn!(error = %e, "Could not close the final position");
            }
        }
        (self.trades, self.equity)
    }
}

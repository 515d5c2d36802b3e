use crate::activity::{ActivityPolicy, JitteredActivity};
use crate::error::EngineError;
use crate::feed::{MarketFeed, SubscriptionHandle};
use crate::ledger::SignalLedger;
use analytics::StatisticsEngine;
use configuration::EngineSettings;
use core_types::{BotConfiguration, BotId, BotInstance, BotStatus, Clock, Signal, SystemClock};
use events::EngineEvent;
use executor::OrderExecutor;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use strategies::{CatalogStrategyFactory, Strategy, StrategyCatalog, StrategyFactory};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The evaluation task of a running bot.
pub(crate) struct Worker {
    pub(crate) cancel: watch::Sender<bool>,
    pub(crate) join: JoinHandle<()>,
    pub(crate) subscription: SubscriptionHandle,
}

pub(crate) struct BotEntry {
    pub(crate) instance: BotInstance,
    /// Kept across pause/resume, dropped on stop or error.
    pub(crate) strategy: Option<Box<dyn Strategy>>,
    pub(crate) worker: Option<Worker>,
    /// Bumped on every lifecycle change; a loop holding an older value exits.
    pub(crate) epoch: u64,
    pub(crate) last_price: Option<Decimal>,
}

#[derive(Default)]
pub(crate) struct BotTable {
    pub(crate) order: Vec<BotId>,
    pub(crate) entries: HashMap<BotId, BotEntry>,
}

pub(crate) struct Shared {
    pub(crate) catalog: Arc<StrategyCatalog>,
    pub(crate) factory: Arc<dyn StrategyFactory>,
    pub(crate) settings: EngineSettings,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) activity: Arc<dyn ActivityPolicy>,
    pub(crate) executor: Arc<dyn OrderExecutor>,
    pub(crate) feed: Arc<dyn MarketFeed>,
    pub(crate) ledger: SignalLedger,
    pub(crate) statistics: StatisticsEngine,
    pub(crate) bots: RwLock<BotTable>,
    pub(crate) events: broadcast::Sender<EngineEvent>,
}

/// Owns every bot instance and drives their lifecycles.
///
/// Cheap to clone; all clones share the same state. Each running bot has one
/// evaluation task consuming its market-data subscription. The bot table lock is
/// never held across an await point.
#[derive(Clone)]
pub struct BotSupervisor {
    pub(crate) inner: Arc<Shared>,
}

pub struct SupervisorBuilder {
    settings: EngineSettings,
    catalog: Arc<StrategyCatalog>,
    executor: Arc<dyn OrderExecutor>,
    feed: Arc<dyn MarketFeed>,
    factory: Option<Arc<dyn StrategyFactory>>,
    clock: Option<Arc<dyn Clock>>,
    activity: Option<Arc<dyn ActivityPolicy>>,
}

impl SupervisorBuilder {
    pub fn factory(mut self, factory: Arc<dyn StrategyFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn activity(mut self, activity: Arc<dyn ActivityPolicy>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn build(self) -> BotSupervisor {
        let activity: Arc<dyn ActivityPolicy> = match self.activity {
            Some(activity) => activity,
            None => Arc::new(JitteredActivity::from_settings(&self.settings)),
        };
        let factory: Arc<dyn StrategyFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(CatalogStrategyFactory),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let (events, _) = broadcast::channel(self.settings.event_buffer.max(1));
        let shared = Shared {
            catalog: self.catalog,
            factory,
            ledger: SignalLedger::new(self.settings.signal_capacity),
            settings: self.settings,
            clock,
            activity,
            executor: self.executor,
            feed: self.feed,
            statistics: StatisticsEngine::new(),
            bots: RwLock::new(BotTable::default()),
            events,
        };
        BotSupervisor {
            inner: Arc::new(shared),
        }
    }
}

impl BotSupervisor {
    /// Starts a builder with the production defaults: system clock, jittered
    /// activity and the catalog strategy factory.
    pub fn builder(
        settings: EngineSettings,
        catalog: Arc<StrategyCatalog>,
        executor: Arc<dyn OrderExecutor>,
        feed: Arc<dyn MarketFeed>,
    ) -> SupervisorBuilder {
        SupervisorBuilder {
            settings,
            catalog,
            executor,
            feed,
            factory: None,
            clock: None,
            activity: None,
        }
    }

    // --- Lifecycle ---

    /// Validates the configuration and registers a new, stopped bot.
    pub fn create(&self, configuration: BotConfiguration) -> Result<BotInstance, EngineError> {
        let shared = &self.inner;
        shared.catalog.validate(&configuration)?;
        let definition = shared.catalog.get(&configuration.strategy_id)?;
        // Trial build so an unimplemented or misconfigured strategy fails here, not at start.
        shared.factory.build(definition, &configuration.parameters)?;

        let instance = BotInstance::new(configuration, shared.clock.now());
        let snapshot = instance.clone();
        {
            let mut table = shared.bots.write();
            table.order.push(instance.id);
            table.entries.insert(
                instance.id,
                BotEntry {
                    instance,
                    strategy: None,
                    worker: None,
                    epoch: 0,
                    last_price: None,
                },
            );
        }

        info!(bot_id = %snapshot.id, name = %snapshot.name(), strategy = %snapshot.strategy_id(), symbol = %snapshot.symbol(), "Bot created");
        self.emit(EngineEvent::BotCreated {
            bot_id: snapshot.id,
            name: snapshot.name().to_string(),
            strategy_id: snapshot.strategy_id().to_string(),
            symbol: snapshot.symbol().to_string(),
        });
        Ok(snapshot)
    }

    /// Starts (or resumes, or restarts from error) a bot's evaluation loop.
    ///
    /// Starting a running bot is a no-op. Must be called from within a Tokio runtime.
    pub fn start(&self, id: BotId) -> Result<BotInstance, EngineError> {
        let shared = &self.inner;
        let mut table = shared.bots.write();
        let entry = table.entries.get_mut(&id).ok_or(EngineError::BotNotFound(id))?;
        let from = entry.instance.status;

        if from == BotStatus::Running {
            debug!(bot_id = %id, "Start requested for a running bot, ignoring");
            return Ok(entry.instance.clone());
        }

        if from != BotStatus::Paused || entry.strategy.is_none() {
            let definition = shared.catalog.get(entry.instance.strategy_id())?;
            entry.strategy = Some(
                shared
                    .factory
                    .build(definition, &entry.instance.configuration.parameters)?,
            );
        }

        // Release any leftover worker before subscribing again.
        if let Some(stale) = entry.worker.take() {
            self.release_worker(stale);
        }

        let subscription = shared.feed.subscribe(entry.instance.symbol())?;
        let now = shared.clock.now();
        entry.epoch += 1;
        entry.instance.status = BotStatus::Running;
        entry.instance.started_at.get_or_insert(now);
        entry.instance.error_message = None;
        entry.instance.last_activity = now;

        let (cancel, cancel_rx) = watch::channel(false);
        let worker = self.clone();
        let epoch = entry.epoch;
        let join = tokio::spawn(async move {
            worker.run_bot(id, epoch, subscription.receiver, cancel_rx).await;
        });
        entry.worker = Some(Worker {
            cancel,
            join,
            subscription: subscription.handle,
        });

        let snapshot = entry.instance.clone();
        drop(table);

        info!(bot_id = %id, %from, "Bot started");
        self.emit(EngineEvent::BotStatusChanged {
            bot_id: id,
            from,
            to: BotStatus::Running,
            error_message: None,
        });
        Ok(snapshot)
    }

    /// Stops a running or paused bot and waits for its loop to exit.
    pub async fn stop(&self, id: BotId) -> Result<BotInstance, EngineError> {
        let (snapshot, from, worker) = {
            let mut table = self.inner.bots.write();
            let entry = table.entries.get_mut(&id).ok_or(EngineError::BotNotFound(id))?;
            let from = entry.instance.status;
            match from {
                BotStatus::Stopped => return Ok(entry.instance.clone()),
                BotStatus::Error => {
                    return Err(EngineError::InvalidTransition {
                        action: "stop",
                        bot_id: id,
                        status: from,
                    });
                }
                BotStatus::Running | BotStatus::Paused => {}
            }
            entry.epoch += 1;
            entry.instance.status = BotStatus::Stopped;
            entry.instance.stopped_at = Some(self.inner.clock.now());
            entry.strategy = None;
            (entry.instance.clone(), from, entry.worker.take())
        };

        self.quiesce(worker).await;
        info!(bot_id = %id, %from, "Bot stopped");
        self.emit(EngineEvent::BotStatusChanged {
            bot_id: id,
            from,
            to: BotStatus::Stopped,
            error_message: None,
        });
        Ok(snapshot)
    }

    /// Suspends a running bot. Its strategy state is kept for `start`.
    pub async fn pause(&self, id: BotId) -> Result<BotInstance, EngineError> {
        let (snapshot, worker) = {
            let mut table = self.inner.bots.write();
            let entry = table.entries.get_mut(&id).ok_or(EngineError::BotNotFound(id))?;
            match entry.instance.status {
                BotStatus::Paused => return Ok(entry.instance.clone()),
                BotStatus::Running => {}
                status @ (BotStatus::Stopped | BotStatus::Error) => {
                    return Err(EngineError::InvalidTransition {
                        action: "pause",
                        bot_id: id,
                        status,
                    });
                }
            }
            entry.epoch += 1;
            entry.instance.status = BotStatus::Paused;
            (entry.instance.clone(), entry.worker.take())
        };

        self.quiesce(worker).await;
        info!(bot_id = %id, "Bot paused");
        self.emit(EngineEvent::BotStatusChanged {
            bot_id: id,
            from: BotStatus::Running,
            to: BotStatus::Paused,
            error_message: None,
        });
        Ok(snapshot)
    }

    /// Removes a stopped or failed bot. Its signals stay in the ledger.
    pub fn delete(&self, id: BotId) -> Result<BotInstance, EngineError> {
        let entry = {
            let mut table = self.inner.bots.write();
            let entry = table.entries.get(&id).ok_or(EngineError::BotNotFound(id))?;
            if matches!(entry.instance.status, BotStatus::Running | BotStatus::Paused) {
                return Err(EngineError::InvalidTransition {
                    action: "delete",
                    bot_id: id,
                    status: entry.instance.status,
                });
            }
            table.order.retain(|bot| *bot != id);
            table.entries.remove(&id).ok_or(EngineError::BotNotFound(id))?
        };

        if let Some(worker) = entry.worker {
            self.release_worker(worker);
        }
        info!(bot_id = %id, "Bot deleted");
        self.emit(EngineEvent::BotDeleted { bot_id: id });
        Ok(entry.instance)
    }

    /// Stops every running or paused bot.
    pub async fn shutdown(&self) {
        let active: Vec<BotId> = {
            let table = self.inner.bots.read();
            table
                .order
                .iter()
                .filter(|id| {
                    table.entries.get(*id).is_some_and(|e| {
                        matches!(e.instance.status, BotStatus::Running | BotStatus::Paused)
                    })
                })
                .copied()
                .collect()
        };
        for id in active {
            if let Err(e) = self.stop(id).await {
                warn!(bot_id = %id, error = %e, "Failed to stop bot during shutdown");
            }
        }
    }

    // --- Read model ---

    /// All bots, in creation order.
    pub fn bots(&self) -> Vec<BotInstance> {
        let table = self.inner.bots.read();
        table
            .order
            .iter()
            .filter_map(|id| table.entries.get(id))
            .map(|e| e.instance.clone())
            .collect()
    }

    pub fn bot(&self, id: BotId) -> Result<BotInstance, EngineError> {
        self.inner
            .bots
            .read()
            .entries
            .get(&id)
            .map(|e| e.instance.clone())
            .ok_or(EngineError::BotNotFound(id))
    }

    pub fn running_bots(&self) -> Vec<BotInstance> {
        self.bots_with_status(BotStatus::Running)
    }

    pub fn stopped_bots(&self) -> Vec<BotInstance> {
        self.bots_with_status(BotStatus::Stopped)
    }

    pub fn total_bots(&self) -> usize {
        self.inner.bots.read().entries.len()
    }

    /// Sum of every bot's net profit.
    pub fn total_net_profit(&self) -> Decimal {
        self.inner
            .bots
            .read()
            .entries
            .values()
            .map(|e| e.instance.statistics.net_profit)
            .sum()
    }

    /// Last price a bot observed, if any.
    pub fn last_price(&self, id: BotId) -> Result<Option<Decimal>, EngineError> {
        self.inner
            .bots
            .read()
            .entries
            .get(&id)
            .map(|e| e.last_price)
            .ok_or(EngineError::BotNotFound(id))
    }

    /// The last `k` signals across all bots, most recent first.
    pub fn recent_signals(&self, k: usize) -> Vec<Signal> {
        self.inner.ledger.recent(k)
    }

    pub fn signals_for(&self, bot_id: BotId) -> Vec<Signal> {
        self.inner.ledger.signals_for(bot_id)
    }

    pub fn ledger(&self) -> &SignalLedger {
        &self.inner.ledger
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.inner.catalog
    }

    /// Number of evaluation loops still alive.
    pub fn active_workers(&self) -> usize {
        self.inner
            .bots
            .read()
            .entries
            .values()
            .filter(|e| e.worker.as_ref().is_some_and(|w| !w.join.is_finished()))
            .count()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    // --- Internals ---

    fn bots_with_status(&self, status: BotStatus) -> Vec<BotInstance> {
        self.bots()
            .into_iter()
            .filter(|b| b.status == status)
            .collect()
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Cancels a worker and drops its subscription without waiting for it.
    pub(crate) fn release_worker(&self, worker: Worker) -> JoinHandle<()> {
        let _ = worker.cancel.send(true);
        self.inner.feed.unsubscribe(worker.subscription);
        worker.join
    }

    /// Cancels a worker and waits until its loop has exited.
    async fn quiesce(&self, worker: Option<Worker>) {
        let Some(worker) = worker else {
            return;
        };
        let join = self.release_worker(worker);
        if let Err(e) = join.await {
            warn!(error = %e, "Evaluation task ended abnormally");
        }
    }
}

use crate::feed::FeedMessage;
use crate::supervisor::BotSupervisor;
use core_types::{BotId, BotStatus, PriceTick, Signal, Trade};
use events::EngineEvent;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, warn};

/// Result of evaluating one tick.
enum Evaluation {
    Idle,
    Signal(Signal),
    Failed(String),
    /// The loop no longer owns the bot.
    Halt,
}

impl BotSupervisor {
    /// The evaluation loop of one bot.
    ///
    /// Waits for the next tick, then works through every tick that queued up
    /// behind it before waiting the activity policy's evaluation delay. Each
    /// tick is marked, checked against protective exits and evaluated, so a
    /// slow loop catches up instead of trading on stale prices. Both waits end
    /// as soon as `cancel` fires.
    pub(crate) async fn run_bot(
        &self,
        id: BotId,
        epoch: u64,
        mut ticks: broadcast::Receiver<FeedMessage>,
        mut cancel: watch::Receiver<bool>,
    ) {
        debug!(bot_id = %id, epoch, "Evaluation loop started");
        'evaluation: loop {
            let received = tokio::select! {
                biased;
                _ = cancel.changed() => break,
                received = ticks.recv() => received,
            };
            let mut pending = match received {
                Ok(message) => Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(bot_id = %id, skipped, "Evaluation loop lagged, oldest ticks dropped");
                    continue;
                }
                Err(RecvError::Closed) => {
                    self.fail_bot(id, Some(epoch), "Market data subscription closed".to_string());
                    break;
                }
            };

            while let Some(message) = pending.take() {
                match message.tick() {
                    None => {
                        debug!(bot_id = %id, symbol = %message.symbol, "Feed message without price, skipping");
                    }
                    Some(tick) => match self.process_tick(id, epoch, &tick) {
                        Evaluation::Idle => {}
                        Evaluation::Signal(signal) => self.dispatch(&signal),
                        Evaluation::Failed(reason) => {
                            self.fail_bot(id, Some(epoch), reason);
                            break 'evaluation;
                        }
                        Evaluation::Halt => break 'evaluation,
                    },
                }
                pending = next_queued(id, &mut ticks);
            }

            let delay = self.inner.activity.evaluation_delay();
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        debug!(bot_id = %id, epoch, "Evaluation loop exited");
    }

    fn process_tick(&self, id: BotId, epoch: u64, tick: &PriceTick) -> Evaluation {
        let shared = &self.inner;
        let (evaluation, closed, statistics) = {
            let mut table = shared.bots.write();
            let Some(entry) = table.entries.get_mut(&id) else {
                return Evaluation::Halt;
            };
            if entry.epoch != epoch || entry.instance.status != BotStatus::Running {
                return Evaluation::Halt;
            }

            entry.last_price = Some(tick.price);
            entry.instance.last_activity = shared.clock.now();
            let closed: Vec<Trade> = entry.apply_protective_exits(tick.price, tick.timestamp);
            let statistics = if closed.is_empty() {
                None
            } else {
                entry.refresh_performance(&shared.statistics, tick.timestamp);
                Some(entry.instance.statistics.clone())
            };

            let evaluation = if !entry.instance.configuration.schedule.is_active_at(tick.timestamp) {
                debug!(bot_id = %id, at = %tick.timestamp, "Outside trading schedule");
                Evaluation::Idle
            } else {
                let symbol = entry.instance.symbol().to_string();
                match entry.strategy.as_mut() {
                    None => Evaluation::Failed("Running bot has no strategy instance".to_string()),
                    Some(strategy) => match strategy.evaluate(tick) {
                        Ok(None) => Evaluation::Idle,
                        Ok(Some(intent)) => {
                            let signal = Signal::from_intent(id, symbol, intent, shared.clock.now());
                            // Appended under the bot lock so a bot's signals land in generation order.
                            self.append_signal(signal.clone());
                            Evaluation::Signal(signal)
                        }
                        Err(e) => Evaluation::Failed(e.to_string()),
                    },
                }
            };
            (evaluation, closed, statistics)
        };

        for trade in closed {
            self.emit(EngineEvent::TradeClosed { bot_id: id, trade });
        }
        if let Some(statistics) = statistics {
            self.emit(EngineEvent::StatisticsUpdated { bot_id: id, statistics });
        }
        if let Evaluation::Signal(signal) = &evaluation {
            self.emit(EngineEvent::SignalRecorded(signal.clone()));
        }
        evaluation
    }

    /// Moves a running or paused bot to `error`, tearing down its worker.
    ///
    /// With `epoch` set, the failure is dropped if the bot has since been
    /// restarted or stopped. The worker is released without being awaited
    /// since the caller may be that worker.
    pub(crate) fn fail_bot(&self, id: BotId, epoch: Option<u64>, reason: String) {
        let (from, worker) = {
            let mut table = self.inner.bots.write();
            let Some(entry) = table.entries.get_mut(&id) else {
                warn!(bot_id = %id, error = %reason, "Failure reported for an unknown bot");
                return;
            };
            if epoch.is_some_and(|e| e != entry.epoch) {
                return;
            }
            let from = entry.instance.status;
            if !matches!(from, BotStatus::Running | BotStatus::Paused) {
                warn!(bot_id = %id, status = %from, error = %reason, "Failure ignored, bot is not active");
                return;
            }
            entry.epoch += 1;
            entry.instance.status = BotStatus::Error;
            entry.instance.error_message = Some(reason.clone());
            entry.strategy = None;
            (from, entry.worker.take())
        };

        error!(bot_id = %id, %from, error = %reason, "Bot entered error state");
        if let Some(worker) = worker {
            drop(self.release_worker(worker));
        }
        self.emit(EngineEvent::BotStatusChanged {
            bot_id: id,
            from,
            to: BotStatus::Error,
            error_message: Some(reason),
        });
    }
}

/// The next message already waiting on the subscription, without blocking.
/// A closed subscription is left for the next blocking receive to report.
fn next_queued(id: BotId, ticks: &mut broadcast::Receiver<FeedMessage>) -> Option<FeedMessage> {
    loop {
        match ticks.try_recv() {
            Ok(message) => return Some(message),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(bot_id = %id, skipped, "Evaluation loop lagged, oldest ticks dropped");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
        }
    }
}

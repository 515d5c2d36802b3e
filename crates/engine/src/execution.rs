use crate::error::EngineError;
use crate::supervisor::{BotEntry, BotSupervisor};
use analytics::StatisticsEngine;
use chrono::{DateTime, Utc};
use core_types::{
    BotId, CoreError, EquityPoint, ErrorKind, OrderSide, Signal, SignalId, SignalIntent, Trade,
    TradeId, TradeStatus,
};
use events::EngineEvent;
use executor::OrderRequest;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// What executing a signal did to the bot's book.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// A BUY or SELL opened this trade.
    Opened(Trade),
    /// A CLOSE flattened these trades. Empty if the bot had nothing open.
    Closed(Vec<Trade>),
    /// The signal had been executed before; nothing happened.
    AlreadyExecuted,
}

impl BotEntry {
    /// Appends an equity point and recomputes statistics and daily returns from
    /// the full trade list.
    pub(crate) fn refresh_performance(&mut self, statistics: &StatisticsEngine, at: DateTime<Utc>) {
        let mark = self.last_price;
        let performance = &mut self.instance.performance;
        let value = statistics.net_profit(&performance.trades, mark);
        performance.equity.push(EquityPoint { timestamp: at, value });
        performance.daily_returns = statistics.daily_returns(&performance.equity);
        self.instance.statistics = statistics.compute(&performance.trades, &performance.equity, mark);
        self.instance.last_activity = at;
    }

    /// Closes open trades whose stop-loss or take-profit distance has been
    /// reached at `price`. Returns the trades it closed.
    pub(crate) fn apply_protective_exits(&mut self, price: Decimal, at: DateTime<Utc>) -> Vec<Trade> {
        let risk = &self.instance.configuration.risk_management;
        let (stop_loss, take_profit) = (risk.stop_loss, risk.take_profit);
        if stop_loss.is_none() && take_profit.is_none() {
            return Vec::new();
        }

        let mut closed = Vec::new();
        for trade in self.instance.performance.trades.iter_mut().filter(|t| t.is_open()) {
            let favourable = match trade.side {
                OrderSide::Buy => price - trade.entry_price,
                OrderSide::Sell => trade.entry_price - price,
            };
            let stopped = stop_loss.is_some_and(|sl| -favourable >= sl);
            let target = take_profit.is_some_and(|tp| favourable >= tp);
            if !(stopped || target) {
                continue;
            }
            if trade.close(price, at).is_ok() {
                let reason = if stopped { "stop loss" } else { "take profit" };
                info!(trade_id = %trade.id, %price, reason, "Protective exit");
                closed.push(trade.clone());
            }
        }
        closed
    }
}

impl BotSupervisor {
    /// Records a signal produced outside the bot's own loop and hands it to the
    /// auto-execution policy.
    pub fn record_signal(&self, bot_id: BotId, intent: SignalIntent) -> Result<Signal, EngineError> {
        let symbol = {
            let table = self.inner.bots.read();
            let entry = table.entries.get(&bot_id).ok_or(EngineError::BotNotFound(bot_id))?;
            entry.instance.symbol().to_string()
        };
        let signal = Signal::from_intent(bot_id, symbol, intent, self.inner.clock.now());
        self.append_signal(signal.clone());
        self.emit(EngineEvent::SignalRecorded(signal.clone()));
        self.dispatch(&signal);
        Ok(signal)
    }

    /// Executes a recorded signal.
    ///
    /// The signal is marked executed before the order goes out, so a rejected
    /// order leaves it marked. BUY and SELL open a trade of the default lot
    /// size at the fill price; CLOSE flattens every open trade of the bot.
    pub async fn execute_signal(&self, signal_id: SignalId) -> Result<ExecutionOutcome, EngineError> {
        let signal = self
            .inner
            .ledger
            .get(signal_id)
            .ok_or(EngineError::SignalNotFound(signal_id))?;
        let bot_id = signal.bot_id;
        let open_trades: Vec<Trade> = {
            let table = self.inner.bots.read();
            let entry = table.entries.get(&bot_id).ok_or(EngineError::BotNotFound(bot_id))?;
            entry.instance.performance.open_trades().cloned().collect()
        };

        if !self.inner.ledger.mark_executed(signal_id)? {
            debug!(%signal_id, "Signal already executed");
            return Ok(ExecutionOutcome::AlreadyExecuted);
        }
        self.emit(EngineEvent::SignalExecuted { bot_id, signal_id });

        let Some(side) = signal.kind.entry_side() else {
            let mut closed = Vec::with_capacity(open_trades.len());
            for trade in open_trades {
                let order = OrderRequest::market(bot_id, &trade.symbol, trade.side.opposite(), trade.quantity, signal.price);
                let fill = self.inner.executor.submit(&order).await?;
                match self.record_exit(bot_id, trade.id, fill.price, fill.time) {
                    Ok(trade) => closed.push(trade),
                    // Closed by a protective exit while the order was in flight.
                    Err(EngineError::Core(e)) => debug!(error = %e, "Trade already closed"),
                    Err(e) => return Err(e),
                }
            }
            info!(%bot_id, %signal_id, closed = closed.len(), "Close signal executed");
            return Ok(ExecutionOutcome::Closed(closed));
        };

        let order = OrderRequest::market(bot_id, &signal.symbol, side, self.inner.settings.default_lot_size, signal.price);
        let fill = self.inner.executor.submit(&order).await?;
        let trade = Trade::open(&signal.symbol, side, fill.price, fill.quantity, fill.time, &signal.reason);

        let statistics = {
            let mut table = self.inner.bots.write();
            let entry = table.entries.get_mut(&bot_id).ok_or(EngineError::BotNotFound(bot_id))?;
            entry.instance.performance.trades.push(trade.clone());
            entry.refresh_performance(&self.inner.statistics, fill.time);
            entry.instance.statistics.clone()
        };

        info!(%bot_id, %signal_id, trade_id = %trade.id, side = ?side, price = %trade.entry_price, "Trade opened");
        self.emit(EngineEvent::TradeOpened { bot_id, trade: trade.clone() });
        self.emit(EngineEvent::StatisticsUpdated { bot_id, statistics });
        Ok(ExecutionOutcome::Opened(trade))
    }

    /// Closes one open trade at the bot's last observed price, or at its entry
    /// price when the bot has not seen a tick yet.
    pub async fn close_trade(&self, bot_id: BotId, trade_id: TradeId) -> Result<Trade, EngineError> {
        let order = {
            let table = self.inner.bots.read();
            let entry = table.entries.get(&bot_id).ok_or(EngineError::BotNotFound(bot_id))?;
            let trade = entry
                .instance
                .performance
                .trades
                .iter()
                .find(|t| t.id == trade_id)
                .ok_or(EngineError::TradeNotFound { bot_id, trade_id })?;
            if !trade.is_open() {
                return Err(CoreError::InvalidTradeTransition {
                    trade_id,
                    from: trade.status,
                    to: TradeStatus::Closed,
                }
                .into());
            }
            let price = entry.last_price.unwrap_or(trade.entry_price);
            OrderRequest::market(bot_id, &trade.symbol, trade.side.opposite(), trade.quantity, price)
        };

        let fill = self.inner.executor.submit(&order).await?;
        self.record_exit(bot_id, trade_id, fill.price, fill.time)
    }

    /// Closes a recorded trade at a fill and refreshes the bot's performance.
    fn record_exit(
        &self,
        bot_id: BotId,
        trade_id: TradeId,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Trade, EngineError> {
        let (trade, statistics) = {
            let mut table = self.inner.bots.write();
            let entry = table.entries.get_mut(&bot_id).ok_or(EngineError::BotNotFound(bot_id))?;
            let trade = entry
                .instance
                .performance
                .trades
                .iter_mut()
                .find(|t| t.id == trade_id)
                .ok_or(EngineError::TradeNotFound { bot_id, trade_id })?;
            trade.close(price, at)?;
            let trade = trade.clone();
            entry.refresh_performance(&self.inner.statistics, at);
            (trade, entry.instance.statistics.clone())
        };

        info!(%bot_id, %trade_id, %price, profit = ?trade.realized_profit(), "Trade closed");
        self.emit(EngineEvent::TradeClosed { bot_id, trade: trade.clone() });
        self.emit(EngineEvent::StatisticsUpdated { bot_id, statistics });
        Ok(trade)
    }

    pub(crate) fn append_signal(&self, signal: Signal) {
        info!(bot_id = %signal.bot_id, signal_id = %signal.id, kind = %signal.kind, price = %signal.price, confidence = %signal.confidence, "Signal recorded");
        if let Some(evicted) = self.inner.ledger.append(signal) {
            debug!(signal_id = %evicted.id, "Oldest signal evicted from the ledger");
        }
    }

    /// Schedules a deferred auto-execution of the signal if the activity policy
    /// says so. Execution order across signals is not guaranteed.
    pub(crate) fn dispatch(&self, signal: &Signal) {
        if !self.inner.activity.should_auto_execute() {
            debug!(signal_id = %signal.id, "Signal left for manual execution");
            return;
        }
        let delay = self.inner.activity.execution_delay();
        let supervisor = self.clone();
        let (bot_id, signal_id) = (signal.bot_id, signal.id);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match supervisor.execute_signal(signal_id).await {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::ExecutionFailed => {
                    supervisor.fail_bot(bot_id, None, e.to_string());
                }
                Err(e) => warn!(%bot_id, %signal_id, error = %e, "Auto-execution skipped"),
            }
        });
    }
}

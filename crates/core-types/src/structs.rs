use crate::enums::{OrderSide, SignalKind, TradeStatus};
use crate::error::CoreError;
use crate::{BotId, SignalId, TradeId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single price observation for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }
}

/// What a strategy proposes before the engine gives it an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalIntent {
    pub kind: SignalKind,
    pub price: Decimal,
    /// Confidence score in [0, 100].
    pub confidence: Decimal,
    pub reason: String,
}

impl SignalIntent {
    pub fn new(kind: SignalKind, price: Decimal, confidence: Decimal, reason: impl Into<String>) -> Self {
        Self {
            kind,
            price,
            confidence: confidence.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED),
            reason: reason.into(),
        }
    }
}

/// A proposed trade action recorded in the signal ledger.
///
/// The only mutation after creation is flipping `executed` to `true`, once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub bot_id: BotId,
    pub symbol: String,
    pub kind: SignalKind,
    pub price: Decimal,
    pub confidence: Decimal,
    pub timestamp: DateTime<Utc>,
    pub executed: bool,
    pub reason: String,
}

impl Signal {
    pub fn from_intent(
        bot_id: BotId,
        symbol: impl Into<String>,
        intent: SignalIntent,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot_id,
            symbol: symbol.into(),
            kind: intent.kind,
            price: intent.price,
            confidence: intent.confidence,
            timestamp,
            executed: false,
            reason: intent.reason,
        }
    }
}

/// Exit leg of a trade. Price and time only ever exist together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeExit {
    pub price: Decimal,
    pub time: DateTime<Utc>,
}

/// A position opened by an executed signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: String,
    pub side: OrderSide,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit: Option<TradeExit>,
    pub status: TradeStatus,
    pub reason: String,
}

impl Trade {
    /// Opens a new trade.
    pub fn open(
        symbol: impl Into<String>,
        side: OrderSide,
        entry_price: Decimal,
        quantity: Decimal,
        entry_time: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            side,
            entry_price,
            quantity,
            entry_time,
            exit: None,
            status: TradeStatus::Open,
            reason: reason.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn exit_price(&self) -> Option<Decimal> {
        self.exit.map(|e| e.price)
    }

    pub fn exit_time(&self) -> Option<DateTime<Utc>> {
        self.exit.map(|e| e.time)
    }

    /// Records the exit. Only an open trade can be closed.
    pub fn close(&mut self, price: Decimal, time: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != TradeStatus::Open {
            return Err(CoreError::InvalidTradeTransition {
                trade_id: self.id,
                from: self.status,
                to: TradeStatus::Closed,
            });
        }
        self.exit = Some(TradeExit { price, time });
        self.status = TradeStatus::Closed;
        Ok(())
    }

    /// Cancels an open trade without an exit.
    pub fn cancel(&mut self) -> Result<(), CoreError> {
        if self.status != TradeStatus::Open {
            return Err(CoreError::InvalidTradeTransition {
                trade_id: self.id,
                from: self.status,
                to: TradeStatus::Cancelled,
            });
        }
        self.status = TradeStatus::Cancelled;
        Ok(())
    }

    /// Profit of the trade if it were exited at `price`.
    pub fn profit_at(&self, price: Decimal) -> Decimal {
        match self.side {
            OrderSide::Buy => (price - self.entry_price) * self.quantity,
            OrderSide::Sell => (self.entry_price - price) * self.quantity,
        }
    }

    /// Realised profit, present only for closed trades.
    pub fn realized_profit(&self) -> Option<Decimal> {
        match (self.status, self.exit) {
            (TradeStatus::Closed, Some(exit)) => Some(self.profit_at(exit.price)),
            _ => None,
        }
    }
}

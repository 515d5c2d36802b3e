use chrono::{DateTime, Utc};
use core_types::{BotId, OrderSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A market order as submitted by the supervisor or the backtester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub bot_id: BotId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Reference price the order was generated at.
    pub price: Decimal,
}

impl OrderRequest {
    pub fn market(bot_id: BotId, symbol: impl Into<String>, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            bot_id,
            symbol: symbol.into(),
            side,
            quantity,
            price,
        }
    }
}

/// The venue's receipt for a filled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: Uuid,
    pub client_order_id: Uuid,
    pub price: Decimal,
    pub quantity: Decimal,
    pub time: DateTime<Utc>,
}

use crate::error::ExecutorError;
use crate::order::{Fill, OrderRequest};
use async_trait::async_trait;
use configuration::Simulation;
use core_types::{Clock, OrderSide};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// The order-execution collaborator.
///
/// This trait allows the supervisor and the backtester to be agnostic about
/// whether they are talking to a simulated venue or a real one. A submission
/// eventually resolves to a fill or is rejected.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn submit(&self, order: &OrderRequest) -> Result<Fill, ExecutorError>;
}

/// The "virtual exchange".
///
/// Fills every valid market order in full after the configured latency, at the
/// reference price moved against the order by `slippage_pct`.
pub struct SimulatedExecutor {
    params: Simulation,
    clock: Arc<dyn Clock>,
}

impl SimulatedExecutor {
    pub fn new(params: Simulation, clock: Arc<dyn Clock>) -> Self {
        Self { params, clock }
    }

    /// For a buy, slippage makes the price HIGHER (worse); for a sell, LOWER.
    fn fill_price(&self, side: OrderSide, reference: Decimal) -> Decimal {
        let slippage = reference * self.params.slippage_pct;
        match side {
            OrderSide::Buy => reference + slippage,
            OrderSide::Sell => reference - slippage,
        }
    }
}

#[async_trait]
impl OrderExecutor for SimulatedExecutor {
    async fn submit(&self, order: &OrderRequest) -> Result<Fill, ExecutorError> {
        if order.quantity <= Decimal::ZERO {
            return Err(ExecutorError::InvalidOrder(format!(
                "quantity must be positive, got {}",
                order.quantity
            )));
        }
        if order.price <= Decimal::ZERO {
            return Err(ExecutorError::Rejected {
                client_order_id: order.client_order_id,
                reason: format!("no valid reference price ({})", order.price),
            });
        }

        if !self.params.latency.is_zero() {
            tokio::time::sleep(self.params.latency).await;
        }

        let fill = Fill {
            order_id: Uuid::new_v4(),
            client_order_id: order.client_order_id,
            price: self.fill_price(order.side, order.price),
            quantity: order.quantity,
            time: self.clock.now(),
        };
        debug!(
            symbol = %order.symbol,
            side = ?order.side,
            reference = %order.price,
            fill = %fill.price,
            "SimulatedExecutor: order filled"
        );
        Ok(fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::ManualClock;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn executor(slippage_pct: Decimal) -> (SimulatedExecutor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()));
        let params = Simulation {
            slippage_pct,
            latency: Duration::ZERO,
        };
        (SimulatedExecutor::new(params, clock.clone()), clock)
    }

    #[tokio::test]
    async fn fills_at_reference_price_and_clock_time() {
        let (executor, clock) = executor(Decimal::ZERO);
        let order = OrderRequest::market(Uuid::new_v4(), "EURUSD", OrderSide::Buy, dec!(100), dec!(1.0870));
        let fill = executor.submit(&order).await.unwrap();
        assert_eq!(fill.price, dec!(1.0870));
        assert_eq!(fill.quantity, dec!(100));
        assert_eq!(fill.client_order_id, order.client_order_id);
        assert_eq!(fill.time, clock.now());
    }

    #[tokio::test]
    async fn slippage_moves_against_the_order() {
        let (executor, _) = executor(dec!(0.01));
        let buy = OrderRequest::market(Uuid::new_v4(), "BTCUSD", OrderSide::Buy, dec!(1), dec!(100));
        let sell = OrderRequest::market(Uuid::new_v4(), "BTCUSD", OrderSide::Sell, dec!(1), dec!(100));
        assert_eq!(executor.submit(&buy).await.unwrap().price, dec!(101));
        assert_eq!(executor.submit(&sell).await.unwrap().price, dec!(99));
    }

    #[tokio::test]
    async fn rejects_invalid_orders() {
        let (executor, _) = executor(Decimal::ZERO);
        let no_qty = OrderRequest::market(Uuid::new_v4(), "EURUSD", OrderSide::Buy, dec!(0), dec!(1));
        let no_price = OrderRequest::market(Uuid::new_v4(), "EURUSD", OrderSide::Buy, dec!(1), dec!(0));
        let err = executor.submit(&no_qty).await.unwrap_err();
        assert_eq!(err.kind(), core_types::ErrorKind::ExecutionFailed);
        assert!(matches!(executor.submit(&no_price).await, Err(ExecutorError::Rejected { .. })));
    }
}

//! Market-data feeds.
//!
//! The supervisor consumes a `MarketFeed`: one subscription per running bot,
//! delivering `FeedMessage`s for the bot's symbol over a bounded channel.
//! A subscriber that falls behind loses its oldest messages, never the newest.

use crate::error::FeedError;
use chrono::{DateTime, Utc};
use core_types::{Clock, PriceTick};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// A raw message from the feed. Messages without a price are skipped by consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedMessage {
    pub symbol: String,
    pub price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl FeedMessage {
    pub fn price(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price: Some(price),
            timestamp,
        }
    }

    /// The tick carried by this message, if it has a price.
    pub fn tick(&self) -> Option<PriceTick> {
        self.price
            .map(|price| PriceTick::new(self.symbol.clone(), price, self.timestamp))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub receiver: broadcast::Receiver<FeedMessage>,
}

/// The market-data collaborator.
pub trait MarketFeed: Send + Sync {
    fn subscribe(&self, symbol: &str) -> Result<Subscription, FeedError>;
    fn unsubscribe(&self, handle: SubscriptionHandle);
}

struct Subscriber {
    symbol: String,
    sender: broadcast::Sender<FeedMessage>,
}

/// In-process feed hub. Whoever holds it publishes, subscribers receive.
///
/// Each subscription gets its own bounded ring. When a subscriber falls
/// behind, the oldest queued messages are overwritten and the subscriber sees
/// a lag on its next receive. The publisher never blocks.
pub struct ChannelFeed {
    buffer: usize,
    next_id: AtomicU64,
    closed: AtomicBool,
    subscribers: RwLock<HashMap<SubscriptionHandle, Subscriber>>,
}

impl ChannelFeed {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Delivers a message to every subscriber of its symbol. Returns how many received it.
    pub fn publish(&self, message: FeedMessage) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (handle, subscriber) in subscribers.iter() {
                if subscriber.symbol != message.symbol {
                    continue;
                }
                match subscriber.sender.send(message.clone()) {
                    Ok(_) => delivered += 1,
                    Err(_) => gone.push(*handle),
                }
            }
        }
        if !gone.is_empty() {
            let mut subscribers = self.subscribers.write();
            for handle in gone {
                subscribers.remove(&handle);
            }
        }
        delivered
    }

    pub fn publish_price(&self, symbol: &str, price: Decimal, timestamp: DateTime<Utc>) -> usize {
        self.publish(FeedMessage::price(symbol, price, timestamp))
    }

    pub fn subscriber_count(&self, symbol: &str) -> usize {
        self.subscribers
            .read()
            .values()
            .filter(|s| s.symbol == symbol)
            .count()
    }

    /// Drops every subscription and refuses new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers.write().clear();
    }
}

impl MarketFeed for ChannelFeed {
    fn subscribe(&self, symbol: &str) -> Result<Subscription, FeedError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FeedError::Closed);
        }
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = broadcast::channel(self.buffer);
        self.subscribers.write().insert(
            handle,
            Subscriber {
                symbol: symbol.to_string(),
                sender,
            },
        );
        debug!(%symbol, ?handle, "Feed subscription opened");
        Ok(Subscription { handle, receiver })
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if self.subscribers.write().remove(&handle).is_some() {
            debug!(?handle, "Feed subscription closed");
        }
    }
}

/// Publishes a multiplicative random walk for each `(symbol, start price)` until
/// `shutdown` flips to true.
pub fn spawn_random_walk(
    feed: Arc<ChannelFeed>,
    symbols: Vec<(String, Decimal)>,
    interval: Duration,
    volatility: f64,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut prices = symbols;
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let now = clock.now();
                    for (symbol, price) in prices.iter_mut() {
                        let step = if volatility > 0.0 { rng.gen_range(-volatility..volatility) } else { 0.0 };
                        if let Some(factor) = Decimal::from_f64(1.0 + step) {
                            *price = (*price * factor).round_dp(6);
                        }
                        feed.publish_price(symbol, *price, now);
                    }
                }
            }
        }
        debug!("Random walk feed stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn delivers_only_matching_symbols() {
        let feed = ChannelFeed::new(8);
        let mut eur = feed.subscribe("EURUSD").unwrap();
        let _btc = feed.subscribe("BTCUSD").unwrap();

        assert_eq!(feed.publish_price("EURUSD", dec!(1.085), at()), 1);
        let message = eur.receiver.recv().await.unwrap();
        assert_eq!(message.tick().unwrap().price, dec!(1.085));
        assert!(eur.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_buffers_drop_the_oldest_ticks() {
        let feed = ChannelFeed::new(2);
        let mut sub = feed.subscribe("EURUSD").unwrap();
        for price in [dec!(1), dec!(2), dec!(3)] {
            assert_eq!(feed.publish_price("EURUSD", price, at()), 1);
        }

        assert!(matches!(
            sub.receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(sub.receiver.recv().await.unwrap().price, Some(dec!(2)));
        assert_eq!(sub.receiver.recv().await.unwrap().price, Some(dec!(3)));
    }

    #[tokio::test]
    async fn receiver_closes_after_unsubscribe() {
        let feed = ChannelFeed::new(4);
        let mut sub = feed.subscribe("EURUSD").unwrap();
        feed.publish_price("EURUSD", dec!(1), at());
        feed.unsubscribe(sub.handle);

        assert_eq!(sub.receiver.recv().await.unwrap().price, Some(dec!(1)));
        assert!(matches!(
            sub.receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[test]
    fn unsubscribe_and_close() {
        let feed = ChannelFeed::new(4);
        let sub = feed.subscribe("EURUSD").unwrap();
        assert_eq!(feed.subscriber_count("EURUSD"), 1);
        feed.unsubscribe(sub.handle);
        assert_eq!(feed.subscriber_count("EURUSD"), 0);

        feed.close();
        let err = feed.subscribe("EURUSD").unwrap_err();
        assert_eq!(err.kind(), core_types::ErrorKind::FeedUnavailable);
    }

    #[test]
    fn messages_without_price_carry_no_tick() {
        let message = FeedMessage {
            symbol: "EURUSD".to_string(),
            price: None,
            timestamp: at(),
        };
        assert!(message.tick().is_none());
    }
}

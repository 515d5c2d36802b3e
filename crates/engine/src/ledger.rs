use crate::error::EngineError;
use core_types::{BotId, Signal, SignalId};
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Append-only, size-bounded log of generated signals.
///
/// Holds at most `capacity` signals in arrival order; appending beyond that
/// drops the oldest. All access goes through one lock so trimming and
/// appending never interleave.
#[derive(Debug)]
pub struct SignalLedger {
    capacity: usize,
    signals: RwLock<VecDeque<Signal>>,
}

impl SignalLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            signals: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a signal, returning the evicted oldest one if the ledger was full.
    pub fn append(&self, signal: Signal) -> Option<Signal> {
        let mut signals = self.signals.write();
        signals.push_back(signal);
        if signals.len() > self.capacity {
            signals.pop_front()
        } else {
            None
        }
    }

    /// The last `k` signals, most recent first.
    pub fn recent(&self, k: usize) -> Vec<Signal> {
        self.signals.read().iter().rev().take(k).cloned().collect()
    }

    /// Flags a signal as executed.
    ///
    /// Returns `Ok(true)` on the false -> true transition and `Ok(false)` when the
    /// signal was already executed.
    pub fn mark_executed(&self, id: SignalId) -> Result<bool, EngineError> {
        let mut signals = self.signals.write();
        let signal = signals
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(EngineError::SignalNotFound(id))?;
        if signal.executed {
            return Ok(false);
        }
        signal.executed = true;
        Ok(true)
    }

    pub fn get(&self, id: SignalId) -> Option<Signal> {
        self.signals.read().iter().find(|s| s.id == id).cloned()
    }

    /// Signals of one bot, in arrival order.
    pub fn signals_for(&self, bot_id: BotId) -> Vec<Signal> {
        self.signals
            .read()
            .iter()
            .filter(|s| s.bot_id == bot_id)
            .cloned()
            .collect()
    }

    /// All retained signals, in arrival order.
    pub fn snapshot(&self) -> Vec<Signal> {
        self.signals.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.signals.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::{SignalIntent, SignalKind};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn signal(bot_id: BotId, n: i64) -> Signal {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(n);
        let intent = SignalIntent::new(SignalKind::Buy, Decimal::from(n), Decimal::from(70), "test");
        Signal::from_intent(bot_id, "EURUSD", intent, at)
    }

    #[test]
    fn keeps_the_most_recent_signals() {
        let ledger = SignalLedger::new(100);
        let bot = Uuid::new_v4();
        let appended: Vec<Signal> = (0..150).map(|n| signal(bot, n)).collect();
        for s in &appended {
            ledger.append(s.clone());
        }

        assert_eq!(ledger.len(), 100);
        let retained = ledger.snapshot();
        let expected_ids: Vec<_> = appended[50..].iter().map(|s| s.id).collect();
        assert_eq!(retained.iter().map(|s| s.id).collect::<Vec<_>>(), expected_ids);
        assert_eq!(retained[0].timestamp, appended[50].timestamp);

        let recent = ledger.recent(3);
        assert_eq!(recent[0].id, appended[149].id);
        assert_eq!(recent[2].id, appended[147].id);
    }

    #[test]
    fn append_reports_evictions() {
        let ledger = SignalLedger::new(1);
        let bot = Uuid::new_v4();
        let first = signal(bot, 1);
        assert!(ledger.append(first.clone()).is_none());
        assert_eq!(ledger.append(signal(bot, 2)).map(|s| s.id), Some(first.id));
    }

    #[test]
    fn mark_executed_transitions_once() {
        let ledger = SignalLedger::new(10);
        let s = signal(Uuid::new_v4(), 1);
        ledger.append(s.clone());

        assert!(ledger.mark_executed(s.id).unwrap());
        assert!(!ledger.mark_executed(s.id).unwrap());
        assert!(ledger.get(s.id).unwrap().executed);

        let missing = ledger.mark_executed(Uuid::new_v4()).unwrap_err();
        assert_eq!(missing.kind(), core_types::ErrorKind::NotFound);
    }

    #[test]
    fn filters_by_bot() {
        let ledger = SignalLedger::new(10);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        ledger.append(signal(a, 1));
        ledger.append(signal(b, 2));
        ledger.append(signal(a, 3));
        assert_eq!(ledger.signals_for(a).len(), 2);
        assert_eq!(ledger.signals_for(b).len(), 1);
    }
}

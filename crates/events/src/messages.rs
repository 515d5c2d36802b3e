use crate::error::EventsError;
use core_types::{BotId, BotStatistics, BotStatus, Signal, SignalId, Trade};
use serde::{Deserialize, Serialize};

/// The top-level engine event enum.
///
/// The `#[serde(tag = "type", content = "payload")]` attribute serializes each
/// event into an object the presentation layer can dispatch on. For example:
/// `{
///   "type": "BotDeleted",
///   "payload": { "bot_id": "..." }
/// }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    BotCreated {
        bot_id: BotId,
        name: String,
        strategy_id: String,
        symbol: String,
    },
    BotStatusChanged {
        bot_id: BotId,
        from: BotStatus,
        to: BotStatus,
        error_message: Option<String>,
    },
    BotDeleted {
        bot_id: BotId,
    },
    SignalRecorded(Signal),
    SignalExecuted {
        bot_id: BotId,
        signal_id: SignalId,
    },
    TradeOpened {
        bot_id: BotId,
        trade: Trade,
    },
    TradeClosed {
        bot_id: BotId,
        trade: Trade,
    },
    StatisticsUpdated {
        bot_id: BotId,
        statistics: BotStatistics,
    },
}

impl EngineEvent {
    /// The bot this event concerns.
    pub fn bot_id(&self) -> BotId {
        match self {
            EngineEvent::BotCreated { bot_id, .. }
            | EngineEvent::BotStatusChanged { bot_id, .. }
            | EngineEvent::BotDeleted { bot_id }
            | EngineEvent::SignalExecuted { bot_id, .. }
            | EngineEvent::TradeOpened { bot_id, .. }
            | EngineEvent::TradeClosed { bot_id, .. }
            | EngineEvent::StatisticsUpdated { bot_id, .. } => *bot_id,
            EngineEvent::SignalRecorded(signal) => signal.bot_id,
        }
    }

    pub fn to_json(&self) -> Result<String, EventsError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{SignalIntent, SignalKind};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn status_change_serializes_with_type_tag() {
        let bot_id = Uuid::new_v4();
        let event = EngineEvent::BotStatusChanged {
            bot_id,
            from: BotStatus::Stopped,
            to: BotStatus::Running,
            error_message: None,
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "BotStatusChanged");
        assert_eq!(json["payload"]["to"], "running");
        assert_eq!(json["payload"]["bot_id"], bot_id.to_string());
    }

    #[test]
    fn signal_event_reports_its_bot() {
        let bot_id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let intent = SignalIntent::new(SignalKind::Sell, dec!(1.087), dec!(75), "Grid level 1 triggered");
        let event = EngineEvent::SignalRecorded(Signal::from_intent(bot_id, "EURUSD", intent, at));
        assert_eq!(event.bot_id(), bot_id);

        let back: EngineEvent = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(back, event);
    }
}

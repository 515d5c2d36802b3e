use crate::enums::BotStatus;
use crate::structs::Trade;
use crate::{BotId, ParameterMap};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Risk-management limits attached to a bot configuration.
///
/// Stop-loss and take-profit are absolute price distances from the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskManagement {
    pub max_position_size: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub max_daily_loss: Decimal,
    pub max_concurrent_trades: u32,
}

/// When a bot is allowed to evaluate ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSchedule {
    pub enabled: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub trading_days: Vec<Weekday>,
}

impl TradingSchedule {
    /// A schedule that never restricts evaluation.
    pub fn always() -> Self {
        Self {
            enabled: false,
            start_time: None,
            end_time: None,
            trading_days: Vec::new(),
        }
    }

    /// Whether the schedule allows evaluation at `at`.
    ///
    /// A window whose start is after its end wraps past midnight.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }
        if !self.trading_days.contains(&at.weekday()) {
            return false;
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                let time = at.time();
                if start <= end {
                    time >= start && time < end
                } else {
                    time >= start || time < end
                }
            }
            _ => true,
        }
    }
}

impl Default for TradingSchedule {
    fn default() -> Self {
        Self::always()
    }
}

/// Everything a user chooses when creating a bot. Immutable once the bot exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfiguration {
    pub strategy_id: String,
    pub name: String,
    pub symbol: String,
    pub parameters: ParameterMap,
    pub risk_management: RiskManagement,
    pub schedule: TradingSchedule,
}

/// Aggregate performance metrics of a bot, recomputed wholesale from its trades.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BotStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_profit: Decimal,
    pub total_loss: Decimal,
    pub net_profit: Decimal,
    pub win_rate: Decimal,
    /// `None` while there is no loss to divide by.
    pub profit_factor: Option<Decimal>,
    /// Largest peak-to-trough decline, percent of the peak.
    pub max_drawdown: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// The history a bot accumulates while it trades.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub daily_returns: Vec<DailyReturn>,
    pub equity: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
}

impl PerformanceRecord {
    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_open())
    }
}

/// A supervised bot and the state it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotInstance {
    pub id: BotId,
    pub configuration: BotConfiguration,
    pub status: BotStatus,
    pub statistics: BotStatistics,
    pub performance: PerformanceRecord,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl BotInstance {
    /// A freshly created, stopped bot with zeroed statistics and a single
    /// zero-value equity point at creation time.
    pub fn new(configuration: BotConfiguration, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            configuration,
            status: BotStatus::Stopped,
            statistics: BotStatistics::default(),
            performance: PerformanceRecord {
                daily_returns: Vec::new(),
                equity: vec![EquityPoint {
                    timestamp: created_at,
                    value: Decimal::ZERO,
                }],
                trades: Vec::new(),
            },
            created_at,
            started_at: None,
            stopped_at: None,
            last_activity: created_at,
            error_message: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.configuration.name
    }

    pub fn symbol(&self) -> &str {
        &self.configuration.symbol
    }

    pub fn strategy_id(&self) -> &str {
        &self.configuration.strategy_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn office_hours() -> TradingSchedule {
        TradingSchedule {
            enabled: true,
            start_time: NaiveTime::from_hms_opt(9, 0, 0),
            end_time: NaiveTime::from_hms_opt(17, 0, 0),
            trading_days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        }
    }

    #[test]
    fn schedule_respects_days_and_window() {
        let schedule = office_hours();
        // 2024-03-04 is a Monday.
        let monday_noon = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let monday_night = Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap();
        let sunday_noon = Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap();

        assert!(schedule.is_active_at(monday_noon));
        assert!(!schedule.is_active_at(monday_night));
        assert!(!schedule.is_active_at(sunday_noon));
    }

    #[test]
    fn window_end_is_exclusive_and_can_wrap() {
        let mut schedule = office_hours();
        let five_pm = Utc.with_ymd_and_hms(2024, 3, 4, 17, 0, 0).unwrap();
        assert!(!schedule.is_active_at(five_pm));

        schedule.start_time = NaiveTime::from_hms_opt(22, 0, 0);
        schedule.end_time = NaiveTime::from_hms_opt(2, 0, 0);
        let late = Utc.with_ymd_and_hms(2024, 3, 4, 23, 30, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 5, 1, 0, 0).unwrap();
        assert!(schedule.is_active_at(late));
        assert!(schedule.is_active_at(early));
        assert!(!schedule.is_active_at(five_pm));
    }

    #[test]
    fn disabled_schedule_is_always_active() {
        let schedule = TradingSchedule::always();
        let sunday = Utc.with_ymd_and_hms(2024, 3, 3, 3, 0, 0).unwrap();
        assert!(schedule.is_active_at(sunday));
    }
}

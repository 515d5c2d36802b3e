//! Timing and auto-execution policy of the evaluation loops.
//!
//! Production bots wait a jittered delay between evaluations and auto-execute a
//! random share of their signals after another jittered delay. Tests swap in
//! `FixedActivity` to remove every source of randomness.

use configuration::EngineSettings;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

pub trait ActivityPolicy: Send + Sync {
    /// Pause between two evaluations of the same bot.
    fn evaluation_delay(&self) -> Duration;
    /// Delay before an auto-executed signal is submitted.
    fn execution_delay(&self) -> Duration;
    /// Whether a freshly recorded signal should be auto-executed.
    fn should_auto_execute(&self) -> bool;
}

/// Base delay plus uniform jitter, re-drawn on every call.
pub struct JitteredActivity {
    evaluation_interval: Duration,
    evaluation_jitter: Duration,
    execution_delay: Duration,
    execution_jitter: Duration,
    auto_execute: bool,
    auto_execute_ratio: f64,
    rng: Mutex<StdRng>,
}

impl JitteredActivity {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Reproducible variant for simulations.
    pub fn seeded(settings: &EngineSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: &EngineSettings, rng: StdRng) -> Self {
        Self {
            evaluation_interval: settings.evaluation_interval,
            evaluation_jitter: settings.evaluation_jitter,
            execution_delay: settings.execution_delay,
            execution_jitter: settings.execution_jitter,
            auto_execute: settings.auto_execute,
            auto_execute_ratio: settings.auto_execute_ratio.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    fn jittered(&self, base: Duration, jitter: Duration) -> Duration {
        let max = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        if max == 0 {
            return base;
        }
        base + Duration::from_millis(self.rng.lock().gen_range(0..=max))
    }
}

impl ActivityPolicy for JitteredActivity {
    fn evaluation_delay(&self) -> Duration {
        self.jittered(self.evaluation_interval, self.evaluation_jitter)
    }

    fn execution_delay(&self) -> Duration {
        self.jittered(self.execution_delay, self.execution_jitter)
    }

    fn should_auto_execute(&self) -> bool {
        self.auto_execute && self.rng.lock().gen_bool(self.auto_execute_ratio)
    }
}

/// Deterministic policy: fixed delays and an explicit auto-execute switch.
#[derive(Debug, Clone, Copy)]
pub struct FixedActivity {
    pub evaluation: Duration,
    pub execution: Duration,
    pub auto_execute: bool,
}

impl FixedActivity {
    /// No delays at all.
    pub fn immediate(auto_execute: bool) -> Self {
        Self {
            evaluation: Duration::ZERO,
            execution: Duration::ZERO,
            auto_execute,
        }
    }
}

impl ActivityPolicy for FixedActivity {
    fn evaluation_delay(&self) -> Duration {
        self.evaluation
    }

    fn execution_delay(&self) -> Duration {
        self.execution
    }

    fn should_auto_execute(&self) -> bool {
        self.auto_execute
    }
}

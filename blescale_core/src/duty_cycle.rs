//! Awake/sleep duty cycle.
//!
//! Deep sleep resets the chip, so nothing here survives a cycle. Each boot
//! rebuilds its plan from the persisted configuration and the wake cause:
//!
//! ```text
//! ColdAwake --initial_awake_ms--> sleep --deepsleep_ms--> WarmAwake --awake_ms--> sleep --> WarmAwake ...
//! ```

use std::time::{Duration, Instant};

use blescale_config::Configuration;
use blescale_traits::WakeCause;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Power-on: long window so the node can be configured.
    ColdAwake,
    /// Timer wake from deep sleep.
    WarmAwake,
}

impl From<WakeCause> for Phase {
    fn from(cause: WakeCause) -> Self {
        match cause {
            WakeCause::ColdBoot => Phase::ColdAwake,
            WakeCause::DeepSleep => Phase::WarmAwake,
        }
    }
}

/// Timer settings fixed for one awake window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwakePlan {
    pub phase: Phase,
    /// Time until the sleep transition.
    pub awake: Duration,
    /// Broadcast period.
    pub interval: Duration,
}

impl AwakePlan {
    pub fn for_wake(cause: WakeCause, config: &Configuration) -> Self {
        let phase = Phase::from(cause);
        let awake = match phase {
            Phase::ColdAwake => config.initial_awake(),
            Phase::WarmAwake => config.awake(),
        };
        Self {
            phase,
            awake,
            interval: config.interval(),
        }
    }
}

/// Returned when the awake window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRequest {
    pub duration: Duration,
}

/// Deadlines of the periodic and one-shot timers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Schedule {
    pub sleep_at: Instant,
    pub next_tick: Instant,
    interval: Duration,
}

impl Schedule {
    pub fn start(now: Instant, plan: &AwakePlan) -> Self {
        Self {
            sleep_at: now + plan.awake,
            next_tick: now + plan.interval,
            interval: plan.interval,
        }
    }

    /// True when a periodic tick is due; moves `next_tick` past `now`,
    /// dropping ticks missed while a callback ran long.
    pub fn take_tick(&mut self, now: Instant) -> bool {
        if now < self.next_tick {
            return false;
        }
        while self.next_tick <= now {
            self.next_tick += self.interval;
        }
        true
    }
}

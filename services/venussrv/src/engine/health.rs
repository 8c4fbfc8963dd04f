//! Connection health state machine.
//!
//! Driven once per poll cycle from the scheduler. Tracks the
//! all-failed cycle streak, requests reconnects, and suspends a
//! device that keeps failing so a dead battery does not burn retries
//! forever.

use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Outcome counters for one poll cycle. `attempted` counts signals,
/// not wire-level retries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: u32,
    pub succeeded: u32,
    pub timed_out: u32,
}

impl CycleReport {
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.succeeded == 0
    }

    fn timeout_ratio(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            f64::from(self.timed_out) / f64::from(self.attempted)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    /// `n` consecutive all-failed cycles, below the suspension limit.
    Degraded(u32),
    /// Polling paused until the deadline.
    Suspended { until: Instant },
}

/// What the scheduler should do after reporting a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAction {
    None,
    Reconnect,
}

#[derive(Debug, Clone)]
pub struct HealthSettings {
    /// All-failed cycles tolerated before suspension.
    pub max_failure_streak: u32,
    pub suspend_cooldown: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            max_failure_streak: 5,
            suspend_cooldown: Duration::from_secs(300),
        }
    }
}

// Timeout-dominated cycles tolerated before forcing a reconnect
const HIGH_TIMEOUT_RATIO: f64 = 0.5;
const HIGH_TIMEOUT_CYCLES: u32 = 3;

#[derive(Debug)]
pub struct HealthMonitor {
    settings: HealthSettings,
    state: HealthState,
    failure_streak: u32,
    high_timeout_cycles: u32,
}

impl HealthMonitor {
    pub fn new(settings: HealthSettings) -> Self {
        Self {
            settings,
            state: HealthState::Healthy,
            failure_streak: 0,
            high_timeout_cycles: 0,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failure_streak
    }

    pub fn is_suspended_state(&self) -> bool {
        matches!(self.state, HealthState::Suspended { .. })
    }

    /// Suspended with the cooldown still running: skip the cycle.
    pub fn is_suspended(&self, now: Instant) -> bool {
        matches!(self.state, HealthState::Suspended { until } if now < until)
    }

    /// Suspended past the deadline: time for one reconnect probe.
    pub fn suspension_expired(&self, now: Instant) -> bool {
        matches!(self.state, HealthState::Suspended { until } if now >= until)
    }

    /// Fold one cycle's counters into the state machine and return
    /// the action the scheduler should take.
    pub fn observe(&mut self, report: &CycleReport, now: Instant) -> HealthAction {
        if report.attempted == 0 {
            return HealthAction::None;
        }

        if report.succeeded > 0 {
            if self.failure_streak > 0 || self.is_suspended_state() {
                info!(
                    streak = self.failure_streak,
                    "device recovered, failure streak cleared"
                );
            }
            self.failure_streak = 0;
            self.state = HealthState::Healthy;

            // Mostly-timeouts cycles still mean the link is sick even
            // though some reads get through
            if report.timeout_ratio() >= HIGH_TIMEOUT_RATIO {
                self.high_timeout_cycles += 1;
                if self.high_timeout_cycles >= HIGH_TIMEOUT_CYCLES {
                    warn!(
                        cycles = self.high_timeout_cycles,
                        "persistent timeout ratio, forcing reconnect"
                    );
                    self.high_timeout_cycles = 0;
                    return HealthAction::Reconnect;
                }
            } else {
                self.high_timeout_cycles = 0;
            }
            return HealthAction::None;
        }

        // Every attempted signal failed
        self.failure_streak += 1;
        self.high_timeout_cycles = 0;
        if self.failure_streak >= self.settings.max_failure_streak {
            let until = now + self.settings.suspend_cooldown;
            warn!(
                streak = self.failure_streak,
                cooldown_secs = self.settings.suspend_cooldown.as_secs(),
                "failure streak limit reached, suspending device"
            );
            self.state = HealthState::Suspended { until };
            HealthAction::None
        } else {
            warn!(streak = self.failure_streak, "poll cycle failed entirely");
            self.state = HealthState::Degraded(self.failure_streak);
            HealthAction::Reconnect
        }
    }

    /// Record the result of the post-deadline reconnect probe.
    /// Success resumes polling; failure extends the suspension by one
    /// cooldown.
    pub fn on_reconnect_result(&mut self, connected: bool, now: Instant) {
        if connected {
            info!("reconnected, resuming polling");
            self.failure_streak = 0;
            self.state = HealthState::Healthy;
        } else if self.is_suspended_state() {
            let until = now + self.settings.suspend_cooldown;
            warn!(
                cooldown_secs = self.settings.suspend_cooldown.as_secs(),
                "reconnect probe failed, extending suspension"
            );
            self.state = HealthState::Suspended { until };
        }
    }
}

//! Polling engine: tier-driven scheduler plus the read/write surface
//! exposed to callers.

pub mod health;
pub mod registry;
pub mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use venus_model::{SignalCatalog, SignalDefinition, Tier, Value};

use crate::config::TierIntervals;
use crate::error::{Result, VenusError};
use crate::protocol::RegisterLink;

pub use health::{CycleReport, HealthAction, HealthMonitor, HealthSettings, HealthState};
pub use registry::EngineRegistry;
pub use snapshot::Snapshot;

/// External enablement hook. When installed it overrides the
/// per-signal `enabled_by_default` flag; signals feeding derived
/// values are polled regardless of its verdict.
pub type RequiredPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub tiers: TierIntervals,
    pub health: HealthSettings,
}

/// Point-in-time device health summary.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub consecutive_failures: u32,
    pub suspended: bool,
    pub last_success_time: Option<DateTime<Utc>>,
}

pub struct PollingEngine {
    catalog: Arc<SignalCatalog>,
    link: Arc<dyn RegisterLink>,
    snapshot: Snapshot,
    last_success: Mutex<HashMap<&'static str, Instant>>,
    last_success_time: Mutex<Option<DateTime<Utc>>>,
    tiers: RwLock<TierIntervals>,
    health: Mutex<HealthMonitor>,
    required: RwLock<Option<RequiredPredicate>>,
    cancel: CancellationToken,
}

impl PollingEngine {
    pub fn new(
        catalog: Arc<SignalCatalog>,
        link: Arc<dyn RegisterLink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            catalog,
            link,
            snapshot: Snapshot::new(),
            last_success: Mutex::new(HashMap::new()),
            last_success_time: Mutex::new(None),
            tiers: RwLock::new(settings.tiers.clamped()),
            health: Mutex::new(HealthMonitor::new(settings.health)),
            required: RwLock::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn catalog(&self) -> &SignalCatalog {
        &self.catalog
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Install or clear the external enablement hook. Takes effect
    /// from the next cycle; no reconnect.
    pub async fn set_required_predicate(&self, predicate: Option<RequiredPredicate>) {
        *self.required.write().await = predicate;
    }

    /// Apply a partial tier-interval update at runtime. Values are
    /// clamped; the link is untouched.
    pub async fn update_tiers(&self, changes: &HashMap<Tier, u64>) {
        let mut tiers = self.tiers.write().await;
        *tiers = tiers.updated(changes);
        info!(?tiers, "tier intervals updated");
    }

    /// Scheduler main loop. Runs one cycle, then sleeps for the
    /// shortest tier interval, until cancelled.
    pub async fn run(self: Arc<Self>) {
        info!(signals = self.catalog.len(), "polling engine started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let report = self.run_cycle().await;
            debug!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                timed_out = report.timed_out,
                "poll cycle complete"
            );

            let tick = self.tiers.read().await.min_interval();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(tick) => {}
            }
        }
        self.link.close().await;
        info!("polling engine stopped");
    }

    /// Execute one poll cycle and feed the outcome to the health
    /// monitor. Public so callers and tests can drive cycles without
    /// the timer loop.
    pub async fn run_cycle(&self) -> CycleReport {
        let now = Instant::now();

        // Suspension gate
        {
            let health = self.health.lock().await;
            if health.is_suspended(now) {
                debug!("device suspended, skipping cycle");
                return CycleReport::default();
            }
        }
        let probe_due = self.health.lock().await.suspension_expired(now);
        if probe_due {
            let connected = self.link.reconnect().await.is_ok();
            self.health
                .lock()
                .await
                .on_reconnect_result(connected, Instant::now());
            if !connected {
                return CycleReport::default();
            }
        }

        let mut report = CycleReport::default();
        let tiers = *self.tiers.read().await;
        for def in self.catalog.signals() {
            if self.cancel.is_cancelled() {
                break;
            }
            if !def.role.is_pollable() {
                continue;
            }
            if !self.is_required(def).await {
                continue;
            }
            let last = self.last_success.lock().await.get(def.key).copied();
            if !due(last, tiers.interval(def.tier), now) {
                continue;
            }

            report.attempted += 1;
            let read = tokio::select! {
                _ = self.cancel.cancelled() => break,
                res = self.link.read_holding(def.address, def.count) => res,
            };
            match read {
                Ok(words) => match def.interpret(&words) {
                    Ok(value) => {
                        self.note_bitfield(def, &value);
                        self.snapshot.insert(def.key, value);
                        self.last_success.lock().await.insert(def.key, Instant::now());
                        *self.last_success_time.lock().await = Some(Utc::now());
                        report.succeeded += 1;
                    }
                    Err(e) => {
                        warn!(key = def.key, error = %e, "failed to decode reading");
                    }
                },
                Err(e) if e.is_timeout() => {
                    report.timed_out += 1;
                    debug!(key = def.key, error = %e, "read timed out");
                }
                Err(e) => {
                    debug!(key = def.key, error = %e, "read failed");
                }
            }
        }

        let action = self.health.lock().await.observe(&report, Instant::now());
        if action == HealthAction::Reconnect {
            if let Err(e) = self.link.reconnect().await {
                warn!(error = %e, "reconnect failed");
            }
        }
        report
    }

    async fn is_required(&self, def: &SignalDefinition) -> bool {
        let wanted = match self.required.read().await.as_ref() {
            Some(predicate) => predicate(def.key),
            None => def.enabled_by_default,
        };
        wanted || self.catalog.is_derived_input(def.key)
    }

    fn note_bitfield(&self, def: &SignalDefinition, value: &Value) {
        if def.bit_labels.is_empty() {
            return;
        }
        if let Value::Int(raw) = value {
            if *raw != 0 {
                let labels = def.active_bit_labels(*raw as u64);
                warn!(key = def.key, ?labels, "active status bits");
            }
        }
    }

    /// On-demand read of one signal, outside the poll schedule.
    /// Device-side failures (transport, timeout, exception response,
    /// undecodable payload) are soft (`Ok(None)`); an unknown or
    /// unreadable key is a validation error.
    pub async fn read_value(&self, key: &str) -> Result<Option<Value>> {
        let def = self.lookup(key)?;
        if !def.role.is_pollable() {
            return Err(VenusError::validation(format!(
                "signal '{key}' has no readable value"
            )));
        }
        match self.link.read_holding(def.address, def.count).await {
            Ok(words) => match def.interpret(&words) {
                Ok(value) => {
                    self.snapshot.insert(def.key, value.clone());
                    self.last_success.lock().await.insert(def.key, Instant::now());
                    *self.last_success_time.lock().await = Some(Utc::now());
                    Ok(Some(value))
                }
                Err(e) => {
                    warn!(key, error = %e, "failed to decode reading");
                    Ok(None)
                }
            },
            Err(e) if e.is_soft() => {
                warn!(key, error = %e, "on-demand read failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write a setting. `Ok(true)` only when the device confirmed
    /// the write; communication exhaustion is `Ok(false)`; anything
    /// rejected before the wire is `Err`.
    pub async fn write_value(&self, key: &str, value: &Value) -> Result<bool> {
        let def = self.lookup(key)?;
        let word = def.encode_write(value)?;
        self.write_confirmed(def, word).await
    }

    /// Fire a one-shot action by writing its command word.
    pub async fn trigger(&self, key: &str) -> Result<bool> {
        let def = self.lookup(key)?;
        let word = def.command_word()?;
        info!(key, command = format!("{word:#06x}"), "triggering action");
        self.write_confirmed(def, word).await
    }

    async fn write_confirmed(&self, def: &SignalDefinition, word: u16) -> Result<bool> {
        match self.link.write_single(def.address, word).await {
            Ok(()) => {
                info!(key = def.key, value = word, "write confirmed");
                Ok(true)
            }
            Err(e) if e.is_soft() => {
                warn!(key = def.key, error = %e, "write failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Read-only copy of the current snapshot.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.snapshot.to_map()
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        self.snapshot.to_json()
    }

    /// Evaluate a derived signal against the current snapshot.
    /// Missing inputs yield `Ok(None)`.
    pub fn derived_value(&self, key: &str) -> Result<Option<Value>> {
        let derived = self
            .catalog
            .derived(key)
            .ok_or_else(|| VenusError::validation(format!("unknown derived signal '{key}'")))?;
        Ok(derived.evaluate(|k| self.snapshot.get(k)))
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let health = self.health.lock().await;
        Diagnostics {
            consecutive_failures: health.consecutive_failures(),
            suspended: health.is_suspended_state(),
            last_success_time: *self.last_success_time.lock().await,
        }
    }

    fn lookup(&self, key: &str) -> Result<&SignalDefinition> {
        self.catalog
            .get(key)
            .ok_or_else(|| VenusError::validation(format!("unknown signal '{key}'")))
    }
}

/// A signal is due when it has never succeeded or its tier interval
/// has fully elapsed since the last success.
fn due(last_success: Option<Instant>, interval: std::time::Duration, now: Instant) -> bool {
    match last_success {
        None => true,
        Some(last) => now.duration_since(last) >= interval,
    }
}

//! Keyed registry of running polling engines.
//!
//! One engine per device id. The registry owns the scheduler tasks;
//! disposing an entry cancels its engine and waits for the task to
//! finish. There is no global state, callers hold the registry.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use venus_model::SignalCatalog;

use crate::config::ServiceConfig;
use crate::engine::{EngineSettings, HealthSettings, PollingEngine};
use crate::error::{Result, VenusError};
use crate::protocol::{GateConfig, TransactionGate, TransportConfig, TransportConnection};

/// Assemble an engine from configuration. The link is lazy; no
/// network activity happens until the first transaction.
pub fn build_engine(config: &ServiceConfig) -> Result<Arc<PollingEngine>> {
    let version = config.catalog_version()?;
    let catalog = Arc::new(SignalCatalog::for_version(version)?);

    let device = &config.device;
    let transport = TransportConnection::new(TransportConfig {
        host: device.host.clone(),
        port: device.port,
        unit_id: device.unit_id,
        connect_timeout: Duration::from_millis(device.connect_timeout_ms),
        call_timeout: Duration::from_millis(device.call_timeout_ms),
        stabilize_delay: Duration::from_millis(device.stabilize_delay_ms),
    });
    let gate = TransactionGate::new(
        transport,
        GateConfig {
            message_wait: Duration::from_millis(device.message_wait_ms),
            read_retries: device.read_retries,
            read_retry_delay: Duration::from_millis(device.read_retry_delay_ms),
            write_retry_delay: Duration::from_millis(device.write_retry_delay_ms),
        },
    );

    let settings = EngineSettings {
        tiers: config.polling.tiers,
        health: HealthSettings {
            max_failure_streak: config.health.max_failure_streak,
            suspend_cooldown: Duration::from_secs(config.health.suspend_secs),
        },
    };
    Ok(Arc::new(PollingEngine::new(
        catalog,
        Arc::new(gate),
        settings,
    )))
}

struct EngineEntry {
    engine: Arc<PollingEngine>,
    task: JoinHandle<()>,
}

#[derive(Default)]
pub struct EngineRegistry {
    engines: DashMap<String, EngineEntry>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build, register and start an engine for a device. Device ids
    /// are unique; reusing one is rejected.
    pub fn create(&self, device_id: &str, config: &ServiceConfig) -> Result<Arc<PollingEngine>> {
        if self.engines.contains_key(device_id) {
            return Err(VenusError::validation(format!(
                "device '{device_id}' already registered"
            )));
        }
        let engine = build_engine(config)?;
        let task = tokio::spawn(engine.clone().run());
        self.engines.insert(
            device_id.to_string(),
            EngineEntry {
                engine: engine.clone(),
                task,
            },
        );
        info!(device_id, "engine registered");
        Ok(engine)
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<PollingEngine>> {
        self.engines.get(device_id).map(|e| e.engine.clone())
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.key().clone()).collect()
    }

    /// Stop and remove a device's engine. Returns false when the id
    /// is unknown.
    pub async fn dispose(&self, device_id: &str) -> bool {
        let Some((_, entry)) = self.engines.remove(device_id) else {
            return false;
        };
        entry.engine.shutdown();
        if let Err(e) = entry.task.await {
            warn!(device_id, error = %e, "engine task ended abnormally");
        }
        info!(device_id, "engine disposed");
        true
    }

    pub async fn dispose_all(&self) {
        let ids = self.device_ids();
        futures::future::join_all(ids.iter().map(|id| self.dispose(id))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn test_config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        // Point at a closed local port; engines connect lazily
        config.device.host = "127.0.0.1".to_string();
        config.device.port = 1;
        config
    }

    #[tokio::test]
    async fn create_get_dispose_lifecycle() {
        let registry = EngineRegistry::new();
        let engine = registry.create("garage", &test_config()).unwrap();
        assert!(Arc::ptr_eq(&engine, &registry.get("garage").unwrap()));
        assert_eq!(registry.device_ids(), vec!["garage".to_string()]);

        assert!(registry.dispose("garage").await);
        assert!(registry.get("garage").is_none());
        assert!(!registry.dispose("garage").await);
    }

    #[tokio::test]
    async fn duplicate_device_ids_are_rejected() {
        let registry = EngineRegistry::new();
        registry.create("unit", &test_config()).unwrap();
        assert!(matches!(
            registry.create("unit", &test_config()),
            Err(VenusError::Validation(_))
        ));
        registry.dispose_all().await;
    }

    #[tokio::test]
    async fn bad_catalog_version_fails_creation() {
        let registry = EngineRegistry::new();
        let mut config = test_config();
        config.device.catalog_version = "v9".to_string();
        assert!(matches!(
            registry.create("unit", &config),
            Err(VenusError::Config(_))
        ));
    }
}

//! Transaction gate: serialized access to the device link.
//!
//! The device tolerates exactly one in-flight transaction. Every
//! read and write acquires the single slot, reconnecting first if the
//! link is down, retrying on communication failure, and holding the
//! slot through the inter-message quiet period so back-to-back
//! requests never crowd the device.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, VenusError};
use crate::protocol::pdu;
use crate::protocol::transport::TransportConnection;

/// The async seam between the engine and the wire. Production code
/// uses [`TransactionGate`]; engine unit tests substitute fakes.
#[async_trait]
pub trait RegisterLink: Send + Sync {
    /// Read `count` holding registers at `address`.
    async fn read_holding(&self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Write one register, confirmed by the device's echo.
    async fn write_single(&self, address: u16, value: u16) -> Result<()>;

    /// Force a close-then-connect cycle.
    async fn reconnect(&self) -> Result<()>;

    /// Tear the link down.
    async fn close(&self);
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Quiet period between transactions.
    pub message_wait: Duration,
    pub read_retries: u32,
    pub read_retry_delay: Duration,
    pub write_retry_delay: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            message_wait: Duration::from_millis(80),
            read_retries: 3,
            read_retry_delay: Duration::from_millis(100),
            write_retry_delay: Duration::from_millis(1000),
        }
    }
}

pub struct TransactionGate {
    link: Mutex<TransportConnection>,
    config: GateConfig,
}

impl TransactionGate {
    pub fn new(link: TransportConnection, config: GateConfig) -> Self {
        Self {
            link: Mutex::new(link),
            config,
        }
    }

    /// Run one attempt: ensure the link is up, execute, parse.
    async fn attempt(
        &self,
        link: &mut TransportConnection,
        request: &[u8],
    ) -> Result<Vec<u8>> {
        if !link.is_connected() {
            link.connect().await?;
        }
        link.execute(request).await
    }

    /// Run a transaction under the single slot with bounded retries.
    /// The response is parsed inside each attempt, so an exception
    /// response or a short payload burns a retry exactly like a
    /// transport failure does.
    async fn run_with_retries<T>(
        &self,
        request: &[u8],
        retries: u32,
        retry_delay: Duration,
        what: &str,
        parse: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<T> {
        let mut link = self.link.lock().await;
        let mut last_err = VenusError::transport("no attempt made");
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            let outcome = match self.attempt(&mut link, request).await {
                Ok(pdu) => parse(&pdu),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(value) => {
                    // Quiet period before the slot is released
                    tokio::time::sleep(self.config.message_wait).await;
                    return Ok(value);
                }
                Err(e) => {
                    warn!(what, attempt, error = %e, "transaction attempt failed");
                    last_err = e;
                    if attempt < attempts {
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
        }
        tokio::time::sleep(self.config.message_wait).await;
        Err(last_err)
    }
}

#[async_trait]
impl RegisterLink for TransactionGate {
    async fn read_holding(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        // Validation happens before the slot is taken
        let request = pdu::build_read_holding(address, count)?;
        self.run_with_retries(
            &request,
            self.config.read_retries,
            self.config.read_retry_delay,
            "read_holding",
            |pdu| pdu::parse_read_holding(pdu, count),
        )
        .await
    }

    async fn write_single(&self, address: u16, value: u16) -> Result<()> {
        let request = pdu::build_write_single(address, value);
        self.run_with_retries(
            &request,
            self.config.read_retries,
            self.config.write_retry_delay,
            "write_single",
            |pdu| pdu::parse_write_single(pdu, address, value),
        )
        .await
    }

    async fn reconnect(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        debug!("reconnecting on request");
        link.reconnect().await
    }

    async fn close(&self) {
        let mut link = self.link.lock().await;
        link.close().await;
    }
}

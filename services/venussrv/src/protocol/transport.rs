//! Modbus TCP transport: connection lifecycle and MBAP framing.
//!
//! One [`TransportConnection`] owns one TCP stream to one device.
//! Serialization of transactions is enforced a level up by the
//! [`TransactionGate`](super::gate::TransactionGate); this type is
//! `&mut self` throughout and holds no locks.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Result, VenusError};

const MBAP_HEADER_LEN: usize = 7;
const MAX_PDU_LEN: usize = 253;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    /// Settle time after connect before the first request. The
    /// device drops frames sent immediately after accepting.
    pub stabilize_delay: Duration,
}

pub struct TransportConnection {
    config: TransportConfig,
    stream: Option<TcpStream>,
    state: LinkState,
    next_transaction_id: u16,
}

impl TransportConnection {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            stream: None,
            state: LinkState::Disconnected,
            next_transaction_id: 1,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Establish the TCP connection. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.state = LinkState::Connecting;
        let addr = format!("{}:{}", self.config.host, self.config.port);
        debug!(%addr, "connecting");

        let connect = TcpStream::connect(&addr);
        let stream = match timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.state = LinkState::Disconnected;
                return Err(VenusError::transport(format!(
                    "failed to connect to {addr}: {e}"
                )));
            }
            Err(_) => {
                self.state = LinkState::Disconnected;
                return Err(VenusError::timeout(format!(
                    "connection to {addr} timed out after {:?}",
                    self.config.connect_timeout
                )));
            }
        };
        stream.set_nodelay(true)?;
        self.stream = Some(stream);

        // Let the device settle before the first transaction
        if !self.config.stabilize_delay.is_zero() {
            tokio::time::sleep(self.config.stabilize_delay).await;
        }

        self.state = LinkState::Connected;
        info!(%addr, "connected");
        Ok(())
    }

    /// Drop the connection. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!("connection closed");
        }
        self.state = LinkState::Disconnected;
    }

    /// Close then connect. Failures leave the link disconnected.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.close().await;
        self.connect().await
    }

    // Wrapping counter that never yields 0
    fn next_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        if self.next_transaction_id == 0 {
            self.next_transaction_id = 1;
        }
        id
    }

    /// Execute one request/response exchange: frame the PDU with an
    /// MBAP header, send, and read back the matching response PDU.
    /// Any transport or timeout failure tears the link down so the
    /// next caller reconnects.
    pub async fn execute(&mut self, request_pdu: &[u8]) -> Result<Vec<u8>> {
        if !self.is_connected() {
            return Err(VenusError::transport("not connected"));
        }
        let transaction_id = self.next_transaction_id();
        let frame = build_frame(transaction_id, self.config.unit_id, request_pdu);

        let call_timeout = self.config.call_timeout;
        let result = timeout(call_timeout, self.exchange(&frame, transaction_id)).await;
        match result {
            Ok(Ok(pdu)) => Ok(pdu),
            Ok(Err(e)) => {
                warn!(error = %e, "transaction failed, dropping connection");
                self.close().await;
                Err(e)
            }
            Err(_) => {
                self.close().await;
                Err(VenusError::timeout(format!(
                    "transaction {transaction_id} timed out after {call_timeout:?}"
                )))
            }
        }
    }

    async fn exchange(&mut self, frame: &[u8], transaction_id: u16) -> Result<Vec<u8>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| VenusError::transport("not connected"))?;
        stream.write_all(frame).await?;

        let mut header = [0u8; MBAP_HEADER_LEN];
        stream.read_exact(&mut header).await?;

        let response_transaction = u16::from_be_bytes([header[0], header[1]]);
        let protocol_id = u16::from_be_bytes([header[2], header[3]]);
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        let unit_id = header[6];

        if protocol_id != 0 {
            return Err(VenusError::protocol(format!(
                "unexpected protocol id {protocol_id}"
            )));
        }
        if response_transaction != transaction_id {
            return Err(VenusError::protocol(format!(
                "transaction id mismatch: sent {transaction_id}, got {response_transaction}"
            )));
        }
        // Length counts unit id + PDU
        if length < 2 || length > MAX_PDU_LEN + 1 {
            return Err(VenusError::protocol(format!(
                "invalid MBAP length {length}"
            )));
        }
        if unit_id != self.config.unit_id {
            return Err(VenusError::protocol(format!(
                "unit id mismatch: expected {}, got {unit_id}",
                self.config.unit_id
            )));
        }

        let mut pdu = vec![0u8; length - 1];
        stream.read_exact(&mut pdu).await?;
        debug!(
            transaction_id,
            pdu_len = pdu.len(),
            "transaction complete"
        );
        Ok(pdu)
    }
}

fn build_frame(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
    let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + pdu.len());
    frame.put_u16(transaction_id);
    frame.put_u16(0); // protocol id
    frame.put_u16((pdu.len() + 1) as u16);
    frame.put_u8(unit_id);
    frame.put_slice(pdu);
    frame.to_vec()
}

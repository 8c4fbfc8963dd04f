//! In-process Modbus TCP device simulator for integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use venussrv::config::ServiceConfig;

#[derive(Default)]
struct SimulatorState {
    registers: Mutex<HashMap<u16, u16>>,
    request_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    response_delay_ms: AtomicUsize,
    exception_code: AtomicUsize,
    truncate_reads: AtomicBool,
}

/// Minimal holding-register server: function codes 0x03 and 0x06,
/// everything else answered with an illegal-function exception.
pub struct Simulator {
    addr: SocketAddr,
    state: Arc<SimulatorState>,
    task: JoinHandle<()>,
}

impl Simulator {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(SimulatorState::default());

        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, state).await;
                });
            }
        });

        Self { addr, state, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.state.registers.lock().unwrap().insert(address, value);
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.state.registers.lock().unwrap().get(&address).copied()
    }

    pub fn request_count(&self) -> usize {
        self.state.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously in-flight requests observed.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Delay every response, to widen the window concurrent requests
    /// would need to overlap in.
    pub fn set_response_delay(&self, delay: Duration) {
        self.state
            .response_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Answer every request with the given exception code until cleared.
    pub fn force_exception(&self, code: u8) {
        self.state
            .exception_code
            .store(code as usize, Ordering::SeqCst);
    }

    pub fn clear_exception(&self) {
        self.state.exception_code.store(0, Ordering::SeqCst);
    }

    /// Drop the last register from every read response.
    pub fn truncate_reads(&self, on: bool) {
        self.state.truncate_reads.store(on, Ordering::SeqCst);
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, state: Arc<SimulatorState>) -> std::io::Result<()> {
    loop {
        let mut header = [0u8; 7];
        if stream.read_exact(&mut header).await.is_err() {
            return Ok(());
        }
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        let unit_id = header[6];
        let mut pdu = vec![0u8; length.saturating_sub(1)];
        stream.read_exact(&mut pdu).await?;

        state.request_count.fetch_add(1, Ordering::SeqCst);
        let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = state.response_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        let response_pdu = handle_pdu(&pdu, &state);
        state.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut frame = Vec::with_capacity(7 + response_pdu.len());
        frame.extend_from_slice(&header[0..2]); // transaction id echo
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(&((response_pdu.len() + 1) as u16).to_be_bytes());
        frame.push(unit_id);
        frame.extend_from_slice(&response_pdu);
        stream.write_all(&frame).await?;
    }
}

fn handle_pdu(pdu: &[u8], state: &SimulatorState) -> Vec<u8> {
    let exception = state.exception_code.load(Ordering::SeqCst);
    if exception != 0 {
        let fc = pdu.first().copied().unwrap_or(0);
        return vec![fc | 0x80, exception as u8];
    }
    match pdu.first() {
        Some(0x03) if pdu.len() == 5 => {
            let address = u16::from_be_bytes([pdu[1], pdu[2]]);
            let mut count = u16::from_be_bytes([pdu[3], pdu[4]]);
            if state.truncate_reads.load(Ordering::SeqCst) {
                count = count.saturating_sub(1);
            }
            let registers = state.registers.lock().unwrap();
            let mut response = vec![0x03, (count * 2) as u8];
            for i in 0..count {
                let value = registers.get(&(address + i)).copied().unwrap_or(0);
                response.extend_from_slice(&value.to_be_bytes());
            }
            response
        }
        Some(0x06) if pdu.len() == 5 => {
            let address = u16::from_be_bytes([pdu[1], pdu[2]]);
            let value = u16::from_be_bytes([pdu[3], pdu[4]]);
            state.registers.lock().unwrap().insert(address, value);
            pdu.to_vec()
        }
        Some(fc) => vec![fc | 0x80, 0x01],
        None => vec![0x80, 0x01],
    }
}

/// Service configuration pointed at a simulator, with delays and
/// timeouts shrunk for test speed.
pub fn config_for(addr: SocketAddr) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.device.host = addr.ip().to_string();
    config.device.port = addr.port();
    config.device.connect_timeout_ms = 2000;
    config.device.call_timeout_ms = 2000;
    config.device.stabilize_delay_ms = 10;
    config.device.message_wait_ms = 5;
    config.device.read_retry_delay_ms = 10;
    config.device.write_retry_delay_ms = 10;
    config
}

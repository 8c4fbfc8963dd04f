//! Modbus TCP protocol layer: PDU codec, framed transport and the
//! serialized transaction gate.

pub mod gate;
pub mod pdu;
pub mod transport;

pub use gate::{GateConfig, RegisterLink, TransactionGate};
pub use transport::{LinkState, TransportConfig, TransportConnection};

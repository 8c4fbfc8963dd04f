//! Modbus TCP polling service for Marstek Venus battery systems.
//!
//! Layers, bottom up: `protocol` speaks raw Modbus TCP to one device
//! behind a serialized transaction gate; `engine` schedules
//! tier-based polling, tracks device health and exposes the
//! read/write surface; `config` loads and validates the layered
//! service configuration.

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;

pub use config::ServiceConfig;
pub use engine::{Diagnostics, EngineRegistry, PollingEngine};
pub use error::{Result, VenusError};

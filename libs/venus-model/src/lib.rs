//! Domain model for Marstek Venus battery systems.
//!
//! Pure, I/O-free building blocks shared by the polling service:
//! typed values, the register codec, the versioned signal catalog and
//! the derived-value definitions. Everything here is deterministic
//! and synchronous; the async transport and scheduling live in
//! `venussrv`.

pub mod catalog;
pub mod codec;
pub mod derived;
pub mod error;
pub mod tables;
pub mod types;
pub mod value;

pub use catalog::{SignalCatalog, SignalDefinition};
pub use derived::{DerivedKind, DerivedSignal};
pub use error::{ModelError, ModelResult};
pub use types::{CatalogVersion, DataType, SignalRole, Tier};
pub use value::Value;

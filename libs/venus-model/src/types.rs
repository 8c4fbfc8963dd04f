//! Core enumerations shared across the model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Interpretation of raw register words for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Single register, two's complement.
    Int16,
    /// Single register, unsigned.
    Uint16,
    /// Two registers, big-endian, two's complement.
    Int32,
    /// Two registers, big-endian, unsigned.
    Uint32,
    /// N registers holding two ASCII bytes each, NUL padded.
    Ascii,
    /// Single register, one bit selected by `bit_index`.
    Bit,
    /// 1-4 registers exposed as a raw bit pattern; label resolution
    /// is left to the consumer via the bit-label map.
    Bitfield,
}

impl DataType {
    /// Minimum number of registers a value of this type occupies.
    pub fn min_register_count(self) -> u16 {
        match self {
            DataType::Int32 | DataType::Uint32 => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Int16 => "int16",
            DataType::Uint16 => "uint16",
            DataType::Int32 => "int32",
            DataType::Uint32 => "uint32",
            DataType::Ascii => "ascii",
            DataType::Bit => "bit",
            DataType::Bitfield => "bitfield",
        };
        f.write_str(s)
    }
}

/// Explicit role tag stored on each signal definition at catalog-build
/// time. The engine never inspects entity types at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalRole {
    /// Read-only reading (sensor or binary sensor).
    Measurement,
    /// Enumerated setting written by option label.
    Selectable,
    /// On/off setting written via command words.
    Switchable,
    /// Bounded numeric setting.
    NumericSetting,
    /// Write-only trigger; never scheduled for polling.
    OneShotAction,
}

impl SignalRole {
    /// One-shot actions are write-only and never polled.
    pub fn is_pollable(self) -> bool {
        !matches!(self, SignalRole::OneShotAction)
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, SignalRole::Measurement)
    }
}

/// Named polling frequency class. Intervals come from the service
/// configuration; the catalog only assigns the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Fast,
    Medium,
    Slow,
    VerySlow,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Fast => "fast",
            Tier::Medium => "medium",
            Tier::Slow => "slow",
            Tier::VerySlow => "very_slow",
        };
        f.write_str(s)
    }
}

/// Device generation selecting one of the fixed register catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogVersion {
    /// Venus E battery (base register map).
    VenusE,
    /// Jupiter C battery (extended register map).
    JupiterC,
}

impl CatalogVersion {
    pub fn as_tag(self) -> &'static str {
        match self {
            CatalogVersion::VenusE => "venus-e",
            CatalogVersion::JupiterC => "jupiter-c",
        }
    }

    /// Resolve a configured version tag, accepting both canonical
    /// tags and the legacy `v1`/`v2` tokens through a single complete
    /// mapping. Unknown tags fail loudly; there is no fallback.
    pub fn resolve(tag: &str) -> Result<Self, ModelError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "venus-e" | "v1" => Ok(CatalogVersion::VenusE),
            "jupiter-c" | "v2" => Ok(CatalogVersion::JupiterC),
            other => Err(ModelError::config(format!(
                "unknown catalog version tag '{other}' (expected venus-e, jupiter-c, v1 or v2)"
            ))),
        }
    }
}

impl FromStr for CatalogVersion {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CatalogVersion::resolve(s)
    }
}

impl fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_tags_resolve_canonical_and_legacy() {
        assert_eq!(
            CatalogVersion::resolve("venus-e").unwrap(),
            CatalogVersion::VenusE
        );
        assert_eq!(
            CatalogVersion::resolve("Jupiter-C").unwrap(),
            CatalogVersion::JupiterC
        );
        assert_eq!(CatalogVersion::resolve("v1").unwrap(), CatalogVersion::VenusE);
        assert_eq!(
            CatalogVersion::resolve("v2").unwrap(),
            CatalogVersion::JupiterC
        );
    }

    #[test]
    fn unknown_version_tag_is_an_error() {
        let err = CatalogVersion::resolve("v3").unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn one_shot_actions_are_not_pollable() {
        assert!(!SignalRole::OneShotAction.is_pollable());
        assert!(SignalRole::Measurement.is_pollable());
        assert!(!SignalRole::Measurement.is_writable());
        assert!(SignalRole::NumericSetting.is_writable());
    }
}

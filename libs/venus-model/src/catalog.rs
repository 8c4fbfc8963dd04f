//! Signal catalog: the immutable table of register-backed signals for
//! one device generation.
//!
//! A catalog is built once from the static tables, validated
//! exhaustively, then shared read-only. Every contract check that can
//! happen before I/O happens here or in [`SignalDefinition`] methods,
//! so the transport never sees an invalid request.

use std::collections::{HashMap, HashSet};

use crate::codec;
use crate::derived::DerivedSignal;
use crate::error::{ModelError, ModelResult};
use crate::tables;
use crate::types::{CatalogVersion, DataType, SignalRole, Tier};
use crate::value::{apply_scale, round_to, Value};

/// One register-backed signal: where it lives, how to interpret it,
/// how often to poll it and how it may be written.
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub address: u16,
    pub count: u16,
    pub dtype: DataType,
    pub scale: f64,
    pub tier: Tier,
    pub role: SignalRole,
    pub enabled_by_default: bool,
    /// Only meaningful for [`DataType::Bit`].
    pub bit_index: Option<u8>,
    /// Bit position to label, for bitfield diagnostics.
    pub bit_labels: &'static [(u8, &'static str)],
    /// Raw reading to display label (read side).
    pub states: &'static [(u16, &'static str)],
    /// Option label to raw word (write side of selectables; also used
    /// to label readbacks).
    pub options: &'static [(&'static str, u16)],
    pub command_on: Option<u16>,
    pub command_off: Option<u16>,
    pub command: Option<u16>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub unit: Option<&'static str>,
}

impl SignalDefinition {
    pub fn measurement(
        key: &'static str,
        name: &'static str,
        address: u16,
        dtype: DataType,
        tier: Tier,
    ) -> Self {
        Self {
            key,
            name,
            address,
            count: dtype.min_register_count(),
            dtype,
            scale: 1.0,
            tier,
            role: SignalRole::Measurement,
            enabled_by_default: true,
            bit_index: None,
            bit_labels: &[],
            states: &[],
            options: &[],
            command_on: None,
            command_off: None,
            command: None,
            min: None,
            max: None,
            step: None,
            unit: None,
        }
    }

    pub fn selectable(
        key: &'static str,
        name: &'static str,
        address: u16,
        options: &'static [(&'static str, u16)],
    ) -> Self {
        Self {
            role: SignalRole::Selectable,
            options,
            ..Self::measurement(key, name, address, DataType::Uint16, Tier::Fast)
        }
    }

    pub fn switchable(
        key: &'static str,
        name: &'static str,
        address: u16,
        command_on: u16,
        command_off: u16,
    ) -> Self {
        Self {
            role: SignalRole::Switchable,
            command_on: Some(command_on),
            command_off: Some(command_off),
            ..Self::measurement(key, name, address, DataType::Uint16, Tier::Fast)
        }
    }

    pub fn numeric_setting(
        key: &'static str,
        name: &'static str,
        address: u16,
        min: f64,
        max: f64,
        step: f64,
    ) -> Self {
        Self {
            role: SignalRole::NumericSetting,
            min: Some(min),
            max: Some(max),
            step: Some(step),
            ..Self::measurement(key, name, address, DataType::Uint16, Tier::Fast)
        }
    }

    pub fn one_shot(
        key: &'static str,
        name: &'static str,
        address: u16,
        command: u16,
    ) -> Self {
        Self {
            role: SignalRole::OneShotAction,
            command: Some(command),
            enabled_by_default: false,
            ..Self::measurement(key, name, address, DataType::Uint16, Tier::Fast)
        }
    }

    pub fn with_count(mut self, count: u16) -> Self {
        self.count = count;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_bit(mut self, index: u8) -> Self {
        self.dtype = DataType::Bit;
        self.bit_index = Some(index);
        self
    }

    pub fn with_states(mut self, states: &'static [(u16, &'static str)]) -> Self {
        self.states = states;
        self
    }

    pub fn with_bit_labels(mut self, labels: &'static [(u8, &'static str)]) -> Self {
        self.bit_labels = labels;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    /// Decode the raw words read for this signal into its snapshot
    /// value: codec decode, then label mapping, then scaling.
    pub fn interpret(&self, words: &[u16]) -> ModelResult<Value> {
        let raw = codec::decode(words, self.dtype, self.bit_index)?;
        match raw {
            Value::Int(n) => {
                if let Some(label) = self.label_for(n) {
                    return Ok(Value::Text(label.to_string()));
                }
                Ok(apply_scale(n, self.scale))
            }
            other => Ok(other),
        }
    }

    fn label_for(&self, raw: i64) -> Option<&'static str> {
        if let Some(&(_, label)) = self.states.iter().find(|(v, _)| i64::from(*v) == raw) {
            return Some(label);
        }
        self.options
            .iter()
            .find(|(_, v)| i64::from(*v) == raw)
            .map(|&(label, _)| label)
    }

    /// Labels of the bits set in a bitfield reading, for logging
    /// fault and alarm transitions.
    pub fn active_bit_labels(&self, raw: u64) -> Vec<&'static str> {
        self.bit_labels
            .iter()
            .filter(|(bit, _)| raw >> bit & 1 == 1)
            .map(|&(_, label)| label)
            .collect()
    }

    /// Encode a caller-supplied value into the single register word
    /// to write, according to this signal's role. All range and type
    /// checks happen here, before any network activity.
    pub fn encode_write(&self, value: &Value) -> ModelResult<u16> {
        match self.role {
            SignalRole::Measurement => Err(ModelError::validation(format!(
                "signal '{}' is read-only",
                self.key
            ))),
            SignalRole::OneShotAction => Err(ModelError::validation(format!(
                "signal '{}' is a one-shot action, use trigger",
                self.key
            ))),
            SignalRole::Selectable => {
                let label = value.as_text().ok_or_else(|| {
                    ModelError::validation(format!(
                        "signal '{}' expects an option label",
                        self.key
                    ))
                })?;
                self.options
                    .iter()
                    .find(|(l, _)| *l == label)
                    .map(|&(_, raw)| raw)
                    .ok_or_else(|| {
                        ModelError::validation(format!(
                            "'{label}' is not a valid option for '{}'",
                            self.key
                        ))
                    })
            }
            SignalRole::Switchable => {
                let on = value.as_bool().ok_or_else(|| {
                    ModelError::validation(format!(
                        "signal '{}' expects a boolean",
                        self.key
                    ))
                })?;
                let word = if on { self.command_on } else { self.command_off };
                word.ok_or_else(|| {
                    ModelError::config(format!("switch '{}' has no command words", self.key))
                })
            }
            SignalRole::NumericSetting => {
                let scaled = value.as_f64().ok_or_else(|| {
                    ModelError::validation(format!(
                        "signal '{}' expects a numeric value",
                        self.key
                    ))
                })?;
                if let (Some(min), Some(max)) = (self.min, self.max) {
                    if scaled < min || scaled > max {
                        return Err(ModelError::validation(format!(
                            "{scaled} out of range {min}..={max} for '{}'",
                            self.key
                        )));
                    }
                }
                // The device stores the unscaled word; invert the
                // read-side scale before encoding.
                let raw = round_to(scaled / self.scale, 0);
                codec::encode_word(&Value::Float(raw), self.dtype)
            }
        }
    }

    /// The raw command word for a one-shot action.
    pub fn command_word(&self) -> ModelResult<u16> {
        if self.role != SignalRole::OneShotAction {
            return Err(ModelError::validation(format!(
                "signal '{}' is not a one-shot action",
                self.key
            )));
        }
        self.command
            .ok_or_else(|| ModelError::config(format!("action '{}' has no command word", self.key)))
    }
}

/// Immutable signal table for one [`CatalogVersion`].
#[derive(Debug)]
pub struct SignalCatalog {
    version: CatalogVersion,
    signals: HashMap<&'static str, SignalDefinition>,
    order: Vec<&'static str>,
    derived: Vec<DerivedSignal>,
    dependency_closure: HashSet<&'static str>,
}

impl SignalCatalog {
    /// Build and validate the catalog for a device generation.
    pub fn for_version(version: CatalogVersion) -> ModelResult<Self> {
        let defs = tables::signals(version);
        let derived = tables::derived_signals(version);

        let mut signals = HashMap::with_capacity(defs.len());
        let mut order = Vec::with_capacity(defs.len());
        for def in defs {
            validate(&def)?;
            order.push(def.key);
            if signals.insert(def.key, def).is_some() {
                let key = order.last().copied().unwrap_or_default();
                return Err(ModelError::config(format!(
                    "duplicate signal key '{key}' in {version} catalog"
                )));
            }
        }

        let mut dependency_closure = HashSet::new();
        for d in &derived {
            for input in d.inputs() {
                if !signals.contains_key(input) {
                    return Err(ModelError::config(format!(
                        "derived signal '{}' references unknown key '{input}'",
                        d.key
                    )));
                }
                dependency_closure.insert(input);
            }
        }

        Ok(Self {
            version,
            signals,
            order,
            derived,
            dependency_closure,
        })
    }

    pub fn version(&self) -> CatalogVersion {
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&SignalDefinition> {
        self.signals.get(key)
    }

    /// Signals in table order.
    pub fn signals(&self) -> impl Iterator<Item = &SignalDefinition> {
        self.order.iter().filter_map(|k| self.signals.get(k))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn derived(&self, key: &str) -> Option<&DerivedSignal> {
        self.derived.iter().find(|d| d.key == key)
    }

    pub fn derived_signals(&self) -> &[DerivedSignal] {
        &self.derived
    }

    /// Whether a polled signal feeds at least one derived signal.
    /// Such signals stay polled even when externally disabled.
    pub fn is_derived_input(&self, key: &str) -> bool {
        self.dependency_closure.contains(key)
    }
}

fn validate(def: &SignalDefinition) -> ModelResult<()> {
    if def.count == 0 || def.count > 125 {
        return Err(ModelError::config(format!(
            "signal '{}': register count {} out of range 1-125",
            def.key, def.count
        )));
    }
    if def.count < def.dtype.min_register_count() {
        return Err(ModelError::config(format!(
            "signal '{}': {} requires at least {} registers",
            def.key,
            def.dtype,
            def.dtype.min_register_count()
        )));
    }
    if u32::from(def.address) + u32::from(def.count) > 0x1_0000 {
        return Err(ModelError::config(format!(
            "signal '{}': register block {}+{} exceeds the address space",
            def.key, def.address, def.count
        )));
    }
    match def.dtype {
        DataType::Bit => match def.bit_index {
            Some(i) if i < 16 => {}
            _ => {
                return Err(ModelError::config(format!(
                    "signal '{}': bit type requires a bit index in 0-15",
                    def.key
                )))
            }
        },
        DataType::Bitfield if def.count > 4 => {
            return Err(ModelError::config(format!(
                "signal '{}': bitfield is limited to 4 registers",
                def.key
            )))
        }
        _ => {}
    }
    match def.role {
        SignalRole::Selectable if def.options.is_empty() => Err(ModelError::config(format!(
            "selectable '{}' has no options",
            def.key
        ))),
        SignalRole::Switchable if def.command_on.is_none() || def.command_off.is_none() => Err(
            ModelError::config(format!("switch '{}' is missing command words", def.key)),
        ),
        SignalRole::OneShotAction if def.command.is_none() => Err(ModelError::config(format!(
            "action '{}' has no command word",
            def.key
        ))),
        SignalRole::NumericSetting => match (def.min, def.max) {
            (Some(min), Some(max)) if min <= max => Ok(()),
            _ => Err(ModelError::config(format!(
                "numeric setting '{}' needs min <= max bounds",
                def.key
            ))),
        },
        _ => Ok(()),
    }
}

//! Derived signals computed from snapshot values.
//!
//! These are never polled from the device. Each one is a pure function
//! over already-decoded signal values, evaluated on demand. A missing
//! input or a zero divisor yields `None` rather than an error; absence
//! of data is not a fault.

use crate::value::{round_to, Value};

/// How a derived signal combines its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
    /// `min(discharge / charge * 100, 100)`, one decimal place.
    RoundTripEfficiency {
        charge: &'static str,
        discharge: &'static str,
    },
    /// Ratio of the smaller power magnitude to the larger, as a
    /// percentage with one decimal place.
    ConversionEfficiency {
        battery_power: &'static str,
        ac_power: &'static str,
    },
    /// `soc / 100 * capacity`, two decimal places.
    StoredEnergy {
        soc: &'static str,
        capacity: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct DerivedSignal {
    pub key: &'static str,
    pub name: &'static str,
    pub kind: DerivedKind,
}

impl DerivedSignal {
    /// Keys of the polled signals this value is computed from.
    pub fn inputs(&self) -> [&'static str; 2] {
        match self.kind {
            DerivedKind::RoundTripEfficiency { charge, discharge } => [charge, discharge],
            DerivedKind::ConversionEfficiency {
                battery_power,
                ac_power,
            } => [battery_power, ac_power],
            DerivedKind::StoredEnergy { soc, capacity } => [soc, capacity],
        }
    }

    /// Evaluate against the current snapshot. `lookup` resolves a
    /// signal key to its latest decoded value.
    pub fn evaluate<F>(&self, lookup: F) -> Option<Value>
    where
        F: Fn(&str) -> Option<Value>,
    {
        let fetch = |key: &str| lookup(key).and_then(|v| v.as_f64());
        match self.kind {
            DerivedKind::RoundTripEfficiency { charge, discharge } => {
                let charge = fetch(charge)?;
                let discharge = fetch(discharge)?;
                if charge == 0.0 {
                    return None;
                }
                let efficiency = (discharge / charge * 100.0).min(100.0);
                Some(Value::Float(round_to(efficiency, 1)))
            }
            DerivedKind::ConversionEfficiency {
                battery_power,
                ac_power,
            } => {
                let battery = fetch(battery_power)?.abs();
                let ac = fetch(ac_power)?.abs();
                let (low, high) = if battery <= ac { (battery, ac) } else { (ac, battery) };
                if high == 0.0 {
                    return None;
                }
                Some(Value::Float(round_to(low / high * 100.0, 1)))
            }
            DerivedKind::StoredEnergy { soc, capacity } => {
                let soc = fetch(soc)?;
                let capacity = fetch(capacity)?;
                Some(Value::Float(round_to(soc / 100.0 * capacity, 2)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(map: &'a HashMap<&'a str, Value>) -> impl Fn(&str) -> Option<Value> + 'a {
        move |key| map.get(key).cloned()
    }

    const RTE: DerivedSignal = DerivedSignal {
        key: "round_trip_efficiency_total",
        name: "Round-Trip Efficiency Total",
        kind: DerivedKind::RoundTripEfficiency {
            charge: "total_charging_energy",
            discharge: "total_discharging_energy",
        },
    };

    #[test]
    fn round_trip_efficiency_is_capped_at_100() {
        let mut map = HashMap::new();
        map.insert("total_charging_energy", Value::Float(100.0));
        map.insert("total_discharging_energy", Value::Float(120.0));
        assert_eq!(RTE.evaluate(lookup(&map)), Some(Value::Float(100.0)));

        map.insert("total_discharging_energy", Value::Float(87.34));
        assert_eq!(RTE.evaluate(lookup(&map)), Some(Value::Float(87.3)));
    }

    #[test]
    fn missing_input_or_zero_charge_yields_none() {
        let mut map = HashMap::new();
        map.insert("total_discharging_energy", Value::Float(10.0));
        assert_eq!(RTE.evaluate(lookup(&map)), None);

        map.insert("total_charging_energy", Value::Float(0.0));
        assert_eq!(RTE.evaluate(lookup(&map)), None);
    }

    #[test]
    fn stored_energy_from_soc_and_capacity() {
        let sig = DerivedSignal {
            key: "stored_energy",
            name: "Stored Energy",
            kind: DerivedKind::StoredEnergy {
                soc: "battery_soc",
                capacity: "battery_total_energy",
            },
        };
        let mut map = HashMap::new();
        map.insert("battery_soc", Value::Int(73));
        map.insert("battery_total_energy", Value::Float(5.12));
        assert_eq!(sig.evaluate(lookup(&map)), Some(Value::Float(3.74)));
    }

    #[test]
    fn conversion_efficiency_uses_magnitudes() {
        let sig = DerivedSignal {
            key: "conversion_efficiency",
            name: "Conversion Efficiency",
            kind: DerivedKind::ConversionEfficiency {
                battery_power: "battery_power",
                ac_power: "ac_power",
            },
        };
        let mut map = HashMap::new();
        map.insert("battery_power", Value::Int(-1000));
        map.insert("ac_power", Value::Int(950));
        assert_eq!(sig.evaluate(lookup(&map)), Some(Value::Float(95.0)));

        map.insert("ac_power", Value::Int(0));
        map.insert("battery_power", Value::Int(0));
        assert_eq!(sig.evaluate(lookup(&map)), None);
    }
}

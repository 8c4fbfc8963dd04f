//! Static register tables for the supported device generations.
//!
//! Addresses, scales, command words and label maps come from the
//! Marstek Modbus register documentation. The Jupiter C map is a
//! strict superset of the Venus E map.

use crate::catalog::SignalDefinition;
use crate::derived::{DerivedKind, DerivedSignal};
use crate::types::{CatalogVersion, DataType, Tier};

const INVERTER_STATES: &[(u16, &str)] = &[
    (0, "Sleep"),
    (1, "Standby"),
    (2, "Charge"),
    (3, "Discharge"),
    (4, "Backup Mode"),
    (5, "OTA Upgrade"),
    (6, "Bypass"),
];

const FAULT_BITS: &[(u8, &str)] = &[
    // Register 36100 (bits 0-15)
    (0, "Grid Overvoltage"),
    (1, "Grid Undervoltage"),
    (2, "Grid Overfrequency"),
    (3, "Grid Underfrequency"),
    (4, "Grid Peak Voltage"),
    (5, "Current Dcover"),
    (6, "Voltage Dcover"),
    // Register 36101 (bits 16-31)
    (16, "BAT Overvoltage"),
    (17, "BAT Undervoltage"),
    (18, "BAT Overcurrent"),
    (19, "BAT low SOC"),
    (20, "BAT communication failure"),
    (21, "BMS protect"),
    // Register 36102 (bits 32-47)
    (32, "Inverter soft start timeout"),
    (33, "Self-checking failure"),
    (34, "EEPROM failure"),
    (35, "Other system failure"),
    // Register 36103 (bits 48-63)
    (48, "Hardware Bus overvoltage"),
    (49, "Hardware Output overcurrent"),
    (50, "Hardware trans overcurrent"),
    (51, "Hardware battery overcurrent"),
    (52, "Hardware Protection"),
    (53, "Output Overcurrent"),
    (54, "High Voltage bus overvoltage"),
    (55, "High Voltage bus undervoltage"),
    (56, "Overpower Protection"),
    (57, "FSM abnormal"),
    (58, "Overtemperature Protection"),
];

const ALARM_BITS: &[(u8, &str)] = &[
    // Register 36000 (bits 0-15)
    (0, "PLL Abnormal Restart"),
    (1, "Overtemperature Limit"),
    (2, "Low Temperature Limit"),
    (3, "Fan Abnormal Warning"),
    (4, "Low Battery SOC Warning"),
    (5, "Output Overcurrent Warning"),
    (6, "Abnormal Line Sequence Detection"),
    // Register 36001 (bits 16-31)
    (16, "WiFi Abnormal"),
    (17, "BLE Abnormal"),
    (18, "Network Abnormal"),
    (19, "CT Connection Abnormal"),
];

const USER_WORK_MODES: &[(&str, u16)] = &[
    ("Manual", 0),
    ("Anti-Feed", 1),
    ("Trade Mode", 2),
];

const FORCE_MODES: &[(&str, u16)] = &[("None", 0), ("Charge", 1), ("Discharge", 2)];

const GRID_STANDARDS: &[(&str, u16)] = &[
    ("Auto", 0),
    ("EN50549", 1),
    ("Netherlands", 2),
    ("Germany", 3),
    ("Austria", 4),
    ("United Kingdom", 5),
    ("Spain", 6),
    ("Poland", 7),
    ("Italy", 8),
    ("China", 9),
];

// 0x55AA, the device's magic confirmation word
const COMMAND_CONFIRM: u16 = 21930;
const COMMAND_RELEASE: u16 = 21947; // 0x55BB

/// Register map shared by every supported generation.
fn base_signals() -> Vec<SignalDefinition> {
    use DataType::*;
    use SignalDefinition as S;
    use Tier::*;

    vec![
        // Device identity and firmware
        S::measurement("device_id", "Device ID", 0x001B, Ascii, VerySlow).with_count(10),
        S::measurement("ems_version", "EMS Version", 0x001C, Uint16, VerySlow),
        S::measurement("inv_version", "INV Version", 0x001D, Uint16, VerySlow),
        S::measurement("mppt_version", "MPPT Version", 0x001E, Uint16, VerySlow),
        S::measurement("bms_version", "BMS Version", 0x001F, Uint16, VerySlow),
        S::measurement("sn_code", "SN Code", 31200, Ascii, VerySlow)
            .with_count(10)
            .disabled(),
        S::measurement("software_version", "Software Version", 31100, Uint16, VerySlow)
            .with_scale(0.01),
        S::measurement(
            "comm_module_firmware",
            "Communication Module Firmware",
            30800,
            Ascii,
            VerySlow,
        )
        .with_count(6),
        S::measurement("mac_address", "MAC Address", 30402, Ascii, VerySlow).with_count(6),
        S::measurement("modbus_address", "Modbus Address", 41100, Uint16, VerySlow).disabled(),
        // Battery
        S::measurement("battery_soc", "Battery SOC", 32104, Uint16, Medium).with_unit("%"),
        S::measurement("battery_total_energy", "Battery Total Energy", 32105, Uint16, Slow)
            .with_scale(0.001)
            .with_unit("kWh"),
        S::measurement("battery_voltage", "Battery Voltage", 32100, Uint16, Medium)
            .with_scale(0.01)
            .with_unit("V"),
        S::measurement("battery_current", "Battery Current", 32101, Int16, Medium)
            .with_scale(0.01)
            .with_unit("A"),
        S::measurement("battery_power", "Battery Power", 32102, Int32, Fast).with_unit("W"),
        // Temperatures
        S::measurement("internal_temperature", "Internal Temperature", 35000, Int16, Medium)
            .with_scale(0.1)
            .with_unit("°C"),
        S::measurement(
            "internal_mos1_temperature",
            "Internal MOS1 Temperature",
            35001,
            Int16,
            Medium,
        )
        .with_scale(0.1)
        .with_unit("°C")
        .disabled(),
        S::measurement(
            "internal_mos2_temperature",
            "Internal MOS2 Temperature",
            35002,
            Int16,
            Medium,
        )
        .with_scale(0.1)
        .with_unit("°C")
        .disabled(),
        S::measurement("max_cell_temperature", "Max Cell Temperature", 35010, Int16, Medium)
            .with_unit("°C")
            .disabled(),
        S::measurement("min_cell_temperature", "Min Cell Temperature", 35011, Int16, Medium)
            .with_unit("°C")
            .disabled(),
        S::measurement("max_cell_voltage", "Max Cell Voltage", 37007, Int16, Medium)
            .with_scale(0.001)
            .with_unit("V")
            .disabled(),
        S::measurement("min_cell_voltage", "Min Cell Voltage", 37008, Int16, Medium)
            .with_scale(0.001)
            .with_unit("V")
            .disabled(),
        // Grid side
        S::measurement("ac_voltage", "AC Voltage", 32200, Uint16, Medium)
            .with_scale(0.1)
            .with_unit("V"),
        S::measurement("ac_current", "AC Current", 32201, Int16, Medium)
            .with_scale(0.01)
            .with_unit("A"),
        S::measurement("ac_power", "AC Power", 32202, Int32, Fast).with_unit("W"),
        S::measurement("ac_frequency", "AC Frequency", 32204, Int16, Medium)
            .with_scale(0.01)
            .with_unit("Hz"),
        // Energy counters
        S::measurement("total_charging_energy", "Total Charging Energy", 33000, Uint32, Slow)
            .with_scale(0.01)
            .with_unit("kWh"),
        S::measurement(
            "total_discharging_energy",
            "Total Discharging Energy",
            33002,
            Int32,
            Slow,
        )
        .with_scale(0.01)
        .with_unit("kWh"),
        S::measurement(
            "total_daily_charging_energy",
            "Total Daily Charging Energy",
            33004,
            Uint32,
            Slow,
        )
        .with_scale(0.01)
        .with_unit("kWh")
        .disabled(),
        S::measurement(
            "total_daily_discharging_energy",
            "Total Daily Discharging Energy",
            33006,
            Int32,
            Slow,
        )
        .with_scale(0.01)
        .with_unit("kWh")
        .disabled(),
        S::measurement(
            "total_monthly_charging_energy",
            "Total Monthly Charging Energy",
            33008,
            Uint32,
            Slow,
        )
        .with_scale(0.01)
        .with_unit("kWh")
        .disabled(),
        S::measurement(
            "total_monthly_discharging_energy",
            "Total Monthly Discharging Energy",
            33010,
            Int32,
            Slow,
        )
        .with_scale(0.01)
        .with_unit("kWh")
        .disabled(),
        // State, faults and alarms
        S::measurement("inverter_state", "Inverter State", 35100, Uint16, Fast)
            .with_states(INVERTER_STATES),
        S::measurement("fault_status", "Fault Status", 36100, Bitfield, Fast)
            .with_count(4)
            .with_bit_labels(FAULT_BITS),
        S::measurement("alarm_status", "Alarm Status", 36000, Bitfield, Fast)
            .with_count(2)
            .with_bit_labels(ALARM_BITS),
        // Connectivity
        S::measurement("wifi_status", "WiFi Status", 30300, Uint16, Medium)
            .with_bit(0)
            .disabled(),
        S::measurement("cloud_status", "Cloud Status", 30302, Uint16, Medium)
            .with_bit(0)
            .disabled(),
        S::measurement("discharge_limit_mode", "Discharge Limit", 41010, Uint16, Medium)
            .with_bit(0)
            .disabled(),
        S::measurement("wifi_signal_strength", "WiFi Signal Strength", 30303, Uint16, Fast)
            .with_scale(-1.0)
            .with_unit("dBm")
            .disabled(),
        // Writable settings
        S::selectable("user_work_mode", "User Work Mode", 43000, USER_WORK_MODES),
        S::selectable("force_mode", "Force Mode", 42010, FORCE_MODES).disabled(),
        S::switchable("backup_function", "Backup Function", 41200, 0, 1),
        S::switchable(
            "rs485_control_mode",
            "RS485 Control Mode",
            42000,
            COMMAND_CONFIRM,
            COMMAND_RELEASE,
        )
        .disabled(),
        S::numeric_setting(
            "set_charge_power",
            "Set Forcible Charge Power",
            42020,
            0.0,
            2500.0,
            50.0,
        )
        .with_unit("W")
        .disabled(),
        S::numeric_setting(
            "set_discharge_power",
            "Set Forcible Discharge Power",
            42021,
            0.0,
            2500.0,
            50.0,
        )
        .with_unit("W")
        .disabled(),
        S::numeric_setting("max_charge_power", "Max Charge Power", 44002, 0.0, 2500.0, 50.0)
            .with_unit("W")
            .disabled(),
        S::numeric_setting(
            "max_discharge_power",
            "Max Discharge Power",
            44003,
            0.0,
            2500.0,
            50.0,
        )
        .with_unit("W")
        .disabled(),
        // Cutoff capacities are stored in tenths of a percent
        S::numeric_setting(
            "charging_cutoff_capacity",
            "Charging Cutoff Capacity",
            44000,
            80.0,
            100.0,
            1.0,
        )
        .with_scale(0.1)
        .with_unit("%")
        .disabled(),
        S::numeric_setting(
            "discharging_cutoff_capacity",
            "Discharging Cutoff Capacity",
            44001,
            12.0,
            30.0,
            1.0,
        )
        .with_scale(0.1)
        .with_unit("%")
        .disabled(),
        // One-shot actions
        S::one_shot("reset_device", "Reset Device", 41000, COMMAND_CONFIRM),
        S::one_shot("factory_reset", "Factory Reset", 41001, COMMAND_CONFIRM),
    ]
}

/// Registers present on Jupiter C units only.
fn jupiter_extensions() -> Vec<SignalDefinition> {
    use DataType::*;
    use SignalDefinition as S;
    use Tier::*;

    vec![
        S::measurement("ac_offgrid_voltage", "AC Offgrid Voltage", 32300, Uint16, Medium)
            .with_scale(0.1)
            .with_unit("V")
            .disabled(),
        S::measurement("ac_offgrid_current", "AC Offgrid Current", 32301, Uint16, Medium)
            .with_scale(0.01)
            .with_unit("A")
            .disabled(),
        S::measurement("ac_offgrid_power", "AC Offgrid Power", 32302, Int32, Fast)
            .with_unit("W")
            .disabled(),
        S::selectable("grid_standard", "Grid Standard", 44100, GRID_STANDARDS),
        S::numeric_setting("charge_to_soc", "Charge to SOC", 42011, 10.0, 100.0, 1.0)
            .with_unit("%")
            .disabled(),
    ]
}

/// Signal definitions for a device generation, in table order.
pub fn signals(version: CatalogVersion) -> Vec<SignalDefinition> {
    let mut defs = base_signals();
    if version == CatalogVersion::JupiterC {
        defs.extend(jupiter_extensions());
    }
    defs
}

/// Derived-value definitions. Identical across generations.
pub fn derived_signals(_version: CatalogVersion) -> Vec<DerivedSignal> {
    vec![
        DerivedSignal {
            key: "round_trip_efficiency_total",
            name: "Round-Trip Efficiency Total",
            kind: DerivedKind::RoundTripEfficiency {
                charge: "total_charging_energy",
                discharge: "total_discharging_energy",
            },
        },
        DerivedSignal {
            key: "round_trip_efficiency_monthly",
            name: "Round-Trip Efficiency Monthly",
            kind: DerivedKind::RoundTripEfficiency {
                charge: "total_monthly_charging_energy",
                discharge: "total_monthly_discharging_energy",
            },
        },
        DerivedSignal {
            key: "conversion_efficiency",
            name: "Conversion Efficiency",
            kind: DerivedKind::ConversionEfficiency {
                battery_power: "battery_power",
                ac_power: "ac_power",
            },
        },
        DerivedSignal {
            key: "stored_energy",
            name: "Stored Energy",
            kind: DerivedKind::StoredEnergy {
                soc: "battery_soc",
                capacity: "battery_total_energy",
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jupiter_table_is_a_superset() {
        let base = signals(CatalogVersion::VenusE);
        let jupiter = signals(CatalogVersion::JupiterC);
        assert_eq!(jupiter.len(), base.len() + jupiter_extensions().len());
    }

    #[test]
    fn command_words_match_device_magic() {
        assert_eq!(COMMAND_CONFIRM, 0x55AA);
        assert_eq!(COMMAND_RELEASE, 0x55BB);
    }
}

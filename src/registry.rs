//! Static register catalog for the BMV battery monitor.
//!
//! The monitor exposes the same physical quantities through two key spaces:
//! the HEX protocol addresses registers by a 16 bit id, the TEXT protocol
//! labels them with short tags. The two tables below are independent because
//! the payload conventions differ as well. Lookups are exact-match and a miss
//! is not an error: the wire routinely carries registers belonging to other
//! device variants, which we simply ignore.

/// Value encoding of a HEX-protocol register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexValueType {
    None,
    U8,
    S8,
    U16,
    S16,
    U24,
    U32,
    S32,
    Str20,
    Str32,
}

/// Value encoding of a TEXT-protocol field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextValueType {
    Bool,
    Int,
    Float,
}

/// Register access mode. Recorded from the device documentation; this crate
/// only ever reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

/// Device variants a register is defined for.
pub const VALID_ALL: u8 = 0b1111_1111;
pub const VALID_BMV700: u8 = 0b0000_0001;
pub const VALID_BMV702: u8 = 0b0000_0010;
pub const VALID_BMV712: u8 = 0b0000_0100;

/// A register reachable over the HEX request/response protocol.
#[derive(Debug, Clone)]
pub struct HexRegister {
    /// Stable name, also the MQTT topic leaf.
    pub name: &'static str,
    pub address: u16,
    pub value_type: HexValueType,
    /// Scale factor applied to the raw integer.
    pub multiplier: f64,
    pub units: &'static str,
    pub access: Access,
    pub validity: u8,
}

/// A field pushed by the TEXT protocol.
#[derive(Debug, Clone)]
pub struct TextRegister {
    /// Stable name, also the MQTT topic leaf.
    pub name: &'static str,
    /// The short token the device labels the field with on the wire.
    pub tag: &'static str,
    pub value_type: TextValueType,
    /// Scale factor for Float fields. Defined but not applied for Int fields.
    pub multiplier: f64,
    pub units: &'static str,
}

const HEX_REGISTERS: &[HexRegister] = &[
    HexRegister { name: "id",             address: 0x0100, value_type: HexValueType::U32, multiplier: 1.0,  units: "",   access: Access::Read, validity: VALID_ALL },
    HexRegister { name: "main_voltage",   address: 0xED8D, value_type: HexValueType::S16, multiplier: 0.01, units: "V",  access: Access::Read, validity: VALID_ALL },
    HexRegister { name: "current_coarse", address: 0xED8F, value_type: HexValueType::S16, multiplier: 0.1,  units: "A",  access: Access::Read, validity: VALID_ALL },
    HexRegister { name: "soc",            address: 0x0FFF, value_type: HexValueType::U16, multiplier: 0.01, units: "%",  access: Access::Read, validity: VALID_ALL },
    HexRegister { name: "consumed_ah",    address: 0xEEFF, value_type: HexValueType::S32, multiplier: 0.1,  units: "Ah", access: Access::Read, validity: VALID_ALL },
];

// Entries verified against a BMV-702. Other devices push additional tags
// which fall through lookup and are ignored.
const TEXT_REGISTERS: &[TextRegister] = &[
    TextRegister { name: "main_voltage",           tag: "V",     value_type: TextValueType::Float, multiplier: 0.001, units: "V" },
    TextRegister { name: "current_fine",           tag: "I",     value_type: TextValueType::Float, multiplier: 0.001, units: "A" },
    TextRegister { name: "power",                  tag: "P",     value_type: TextValueType::Int,   multiplier: 1.0,   units: "W" },
    TextRegister { name: "load_current",           tag: "LI",    value_type: TextValueType::Float, multiplier: 0.001, units: "A" },
    TextRegister { name: "pv_voltage",             tag: "VPV",   value_type: TextValueType::Float, multiplier: 0.001, units: "V" },
    TextRegister { name: "pv_power",               tag: "PPV",   value_type: TextValueType::Int,   multiplier: 1.0,   units: "W" },
    TextRegister { name: "error",                  tag: "ERR",   value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "charge_state",           tag: "CS",    value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "consumed_ah",            tag: "CE",    value_type: TextValueType::Float, multiplier: 0.001, units: "Ah" },
    TextRegister { name: "soc",                    tag: "SOC",   value_type: TextValueType::Float, multiplier: 0.1,   units: "%" },
    TextRegister { name: "ttg",                    tag: "TTG",   value_type: TextValueType::Int,   multiplier: 1.0,   units: "Min" },
    TextRegister { name: "alarm_state",            tag: "Alarm", value_type: TextValueType::Bool,  multiplier: 1.0,   units: "" },
    TextRegister { name: "relay_state",            tag: "Relay", value_type: TextValueType::Bool,  multiplier: 1.0,   units: "" },
    TextRegister { name: "alarm_reason",           tag: "AR",    value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "sw_version",             tag: "FW",    value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "max_discharge",          tag: "H1",    value_type: TextValueType::Float, multiplier: 0.001, units: "Ah" },
    TextRegister { name: "last_discharge",         tag: "H2",    value_type: TextValueType::Float, multiplier: 0.001, units: "Ah" },
    TextRegister { name: "average_discharge",      tag: "H3",    value_type: TextValueType::Float, multiplier: 0.001, units: "Ah" },
    TextRegister { name: "num_cycles",             tag: "H4",    value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "num_full_discharge",     tag: "H5",    value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "cumulative_ah",          tag: "H6",    value_type: TextValueType::Float, multiplier: 0.001, units: "Ah" },
    TextRegister { name: "min_voltage",            tag: "H7",    value_type: TextValueType::Float, multiplier: 0.001, units: "V" },
    TextRegister { name: "max_voltage",            tag: "H8",    value_type: TextValueType::Float, multiplier: 0.001, units: "V" },
    TextRegister { name: "time_since_full_charge", tag: "H9",    value_type: TextValueType::Int,   multiplier: 1.0,   units: "Sec" },
    TextRegister { name: "num_auto_sync",          tag: "H10",   value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "num_low_volt_alarm",     tag: "H11",   value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "num_high_volt_alarm",    tag: "H12",   value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
    TextRegister { name: "energy_discharged",      tag: "H17",   value_type: TextValueType::Float, multiplier: 0.01,  units: "kWh" },
    TextRegister { name: "energy_charged",         tag: "H18",   value_type: TextValueType::Float, multiplier: 0.01,  units: "kWh" },
    TextRegister { name: "energy_total",           tag: "H19",   value_type: TextValueType::Float, multiplier: 0.01,  units: "kWh" },
    TextRegister { name: "energy_today",           tag: "H20",   value_type: TextValueType::Float, multiplier: 0.01,  units: "kWh" },
    TextRegister { name: "max_power_today",        tag: "H21",   value_type: TextValueType::Float, multiplier: 1.0,   units: "W" },
    TextRegister { name: "energy_yesterday",       tag: "H22",   value_type: TextValueType::Float, multiplier: 0.01,  units: "kWh" },
    TextRegister { name: "max_power_yesterday",    tag: "H23",   value_type: TextValueType::Float, multiplier: 1.0,   units: "W" },
    TextRegister { name: "id",                     tag: "PID",   value_type: TextValueType::Int,   multiplier: 1.0,   units: "" },
];

/// Look up a HEX register by its stable name.
pub fn hex_by_name(name: &str) -> Option<&'static HexRegister> {
    HEX_REGISTERS.iter().find(|r| r.name == name)
}

/// Look up a HEX register by its 16 bit address.
pub fn hex_by_address(address: u16) -> Option<&'static HexRegister> {
    HEX_REGISTERS.iter().find(|r| r.address == address)
}

/// Look up a TEXT register by its wire tag.
pub fn text_by_tag(tag: &str) -> Option<&'static TextRegister> {
    TEXT_REGISTERS.iter().find(|r| r.tag == tag)
}

#[test]
fn test_hex_lookup_by_name() {
    let reg = hex_by_name("soc").unwrap();
    assert_eq!(reg.address, 0x0FFF);
    assert_eq!(reg.value_type, HexValueType::U16);
    assert_eq!(reg.multiplier, 0.01);
}

#[test]
fn test_hex_lookup_by_address() {
    let reg = hex_by_address(0xED8F).unwrap();
    assert_eq!(reg.name, "current_coarse");

    // Reserved and foreign-variant addresses fall through
    assert!(hex_by_address(0x0382).is_none());
}

#[test]
fn test_text_lookup_is_case_sensitive() {
    assert_eq!(text_by_tag("SOC").unwrap().name, "soc");
    assert!(text_by_tag("soc").is_none());
    assert!(text_by_tag("SO").is_none());
}

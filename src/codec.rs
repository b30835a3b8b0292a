//! Wire codec for the two VE.Direct sub-protocols.
//!
//! The HEX protocol is a request/response protocol carried as ASCII hex text:
//! a frame is `:` + payload + two checksum digits + `\n`. The payload starts
//! with a single command nibble, then whole bytes rendered as two hex digits
//! each, most significant nibble first, with multi-byte fields little-endian
//! by byte. The TEXT protocol pushes tab separated `tag<TAB>value` lines on
//! its own cadence.
//!
//! Everything in this module is a pure function over a de-framed payload.
//! Malformed input is answered with `None`, never an error: a dropped frame
//! costs nothing because the next poll re-requests the value.

use crate::registry::{self, HexRegister, HexValueType, TextRegister, TextValueType};

/// Command nibble of a GET request.
pub const CMD_GET: char = '7';
/// Command nibble of a GET response.
pub const RSP_GET: char = '7';

/// The device's "no data" sentinel in TEXT values.
const NO_DATA: &str = "---";

/// Value of one ASCII hex digit. Non-hex characters count as zero, which
/// makes them corrupt the checksum instead of aborting the scan.
fn nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        b'a'..=b'f' => c - b'a' + 10,
        _ => 0,
    }
}

/// Compute the HEX-protocol checksum over a payload (leading `:` and the
/// checksum's own digits excluded).
///
/// The first character is a lone command nibble and contributes its value
/// unscaled; every following pair of characters contributes one byte. The
/// transmitted checksum is `0x55 - sum`, so that summing every payload byte
/// including the checksum itself is `0x55` modulo 256.
pub fn checksum(payload: &str) -> u8 {
    let mut bytes = payload.bytes();
    let mut sum: u8 = match bytes.next() {
        Some(first) => nibble(first),
        None => 0,
    };
    while let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) {
        sum = sum.wrapping_add((nibble(hi) << 4) | nibble(lo));
    }
    0x55u8.wrapping_sub(sum)
}

/// Build the wire bytes of a GET request for one register address.
///
/// Layout: `:` + command nibble + address low byte + address high byte +
/// one zero flags byte + checksum + `\n`, every byte as two uppercase hex
/// digits.
pub fn encode_get_request(address: u16) -> String {
    let body = format!(
        "{}{:02X}{:02X}{:02X}",
        CMD_GET,
        address & 0xFF,
        address >> 8,
        0
    );
    format!(":{}{:02X}\n", body, checksum(&body))
}

/// Decode the 4 address digits (low byte first, high nibble first within
/// each byte). Inverse of the rendering in [`encode_get_request`].
fn decode_address(digits: &[u8]) -> u16 {
    ((nibble(digits[0]) as u16) << 4)
        | (nibble(digits[1]) as u16)
        | ((nibble(digits[2]) as u16) << 12)
        | ((nibble(digits[3]) as u16) << 8)
}

/// Decode `nbytes` little-endian bytes from hex digit pairs, or `None` if the
/// digits run out first (a truncated frame).
fn decode_le(digits: &[u8], nbytes: usize) -> Option<u64> {
    if digits.len() < nbytes * 2 {
        return None;
    }
    let mut raw = 0u64;
    for i in 0..nbytes {
        let byte = (nibble(digits[2 * i]) << 4) | nibble(digits[2 * i + 1]);
        raw |= (byte as u64) << (8 * i);
    }
    Some(raw)
}

/// Reinterpret the raw little-endian integer per the register's value type.
/// String registers carry no numeric value and decode to nothing.
fn decode_value(digits: &[u8], value_type: HexValueType) -> Option<f64> {
    let value = match value_type {
        HexValueType::None => return None,
        HexValueType::U8 => decode_le(digits, 1)? as u8 as f64,
        HexValueType::S8 => decode_le(digits, 1)? as i8 as f64,
        HexValueType::U16 => decode_le(digits, 2)? as u16 as f64,
        HexValueType::S16 => decode_le(digits, 2)? as u16 as i16 as f64,
        HexValueType::U24 => decode_le(digits, 3)? as u32 as f64,
        HexValueType::U32 => decode_le(digits, 4)? as u32 as f64,
        HexValueType::S32 => decode_le(digits, 4)? as u32 as i32 as f64,
        HexValueType::Str20 | HexValueType::Str32 => return None,
    };
    Some(value)
}

/// Decode a complete HEX frame payload (`:` and `\n` already stripped) into
/// the register it answers for and its scaled value.
///
/// Returns `None` for anything that should not be published: checksum
/// mismatch, a response code other than GET, an address we have no catalog
/// row for, a nonzero device error flags byte, or truncated data digits.
pub fn decode_hex_frame(payload: &str) -> Option<(&'static HexRegister, f64)> {
    let digits = payload.as_bytes();

    // Smallest conceivable response: command nibble plus 4 address digits
    if digits.len() < 5 {
        return None;
    }
    if digits[0] != RSP_GET as u8 {
        return None;
    }

    // The trailing two digits are the frame's checksum; recompute over the
    // rest with the same subtraction form used when encoding.
    if digits.len() >= 7 {
        let body = &payload[..payload.len() - 2];
        let tail = &digits[digits.len() - 2..];
        let received = (nibble(tail[0]) << 4) | nibble(tail[1]);
        if checksum(body) != received {
            return None;
        }
    }

    let address = decode_address(&digits[1..5]);
    let reg = registry::hex_by_address(address)?;

    // Flags byte follows the address; without it there is nothing to decode
    if digits.len() < 7 {
        return None;
    }
    let flags = (nibble(digits[5]) << 4) | nibble(digits[6]);
    if flags != 0 {
        // Device-side error (unknown register, unsupported, parameter error)
        return None;
    }

    let data = digits.get(7..digits.len() - 2).unwrap_or(&[]);
    let raw = decode_value(data, reg.value_type)?;
    Some((reg, raw * reg.multiplier))
}

/// Decode one TEXT line (`\r` already stripped) into the register it carries
/// and the ready-to-publish payload string.
///
/// A payload of `""` is deliberate: the device's `---` sentinel (and an
/// unrecognised boolean token) publish an empty value so the stale field is
/// cleared downstream rather than left showing the last reading.
pub fn decode_text_line(line: &str) -> Option<(&'static TextRegister, String)> {
    let mut fields = line.splitn(2, '\t');
    let tag = fields.next()?;
    let raw = fields.next().unwrap_or("");

    let reg = registry::text_by_tag(tag)?;
    let payload = match reg.value_type {
        TextValueType::Float => {
            if raw == NO_DATA {
                String::new()
            } else {
                let n: i64 = raw.trim().parse().ok()?;
                format!("{:.3}", n as f64 * reg.multiplier)
            }
        }
        TextValueType::Int => {
            if raw == NO_DATA {
                String::new()
            } else {
                // The multiplier is defined for Int fields too but is not
                // applied; these values (error codes, firmware versions,
                // alarm bitmasks) are consumed verbatim.
                let n: i64 = raw.trim().parse().ok()?;
                n.to_string()
            }
        }
        TextValueType::Bool => match raw {
            "ON" => "1".to_string(),
            "OFF" => "0".to_string(),
            _ => String::new(),
        },
    };

    Some((reg, payload))
}

#[cfg(test)]
fn response_frame(body: &str) -> String {
    format!("{}{:02X}", body, checksum(body))
}

/// Sum of every payload byte including the checksum byte, modulo 256. Valid
/// frames always sum to 0x55.
#[cfg(test)]
fn full_sum(payload: &str) -> u8 {
    let mut bytes = payload.bytes();
    let mut sum: u8 = nibble(bytes.next().unwrap());
    while let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) {
        sum = sum.wrapping_add((nibble(hi) << 4) | nibble(lo));
    }
    sum
}

#[test]
fn test_checksum_round_trip() {
    for address in [0x0000u16, 0x0FFF, 0xED8F, 0xEEFF, 0xFFFF] {
        let frame = encode_get_request(address);
        let payload = frame
            .strip_prefix(':')
            .unwrap()
            .strip_suffix('\n')
            .unwrap();
        assert_eq!(full_sum(payload), 0x55, "address {address:04X}");
    }
}

#[test]
fn test_encode_get_request_layout() {
    // Consumed Ah register, 0xEEFF: low byte first, then high byte
    let frame = encode_get_request(0xEEFF);
    assert!(frame.starts_with(":7FFEE00"));
    assert!(frame.ends_with('\n'));
    assert_eq!(frame.len(), 11);
}

#[test]
fn test_address_digits_inverse() {
    for address in 0..=u16::MAX {
        let digits = format!("{:02X}{:02X}", address & 0xFF, address >> 8);
        assert_eq!(decode_address(digits.as_bytes()), address);
    }
}

#[test]
fn test_decode_address_nibble_order() {
    // The catalog's current_coarse register
    assert_eq!(decode_address(b"8FED"), 0xED8F);
}

#[test]
fn test_decode_hex_frame_u16_scaled() {
    // soc (0x0FFF), Un16 x0.01: raw 0x0EE4 = 3812 -> 38.12
    let payload = response_frame("7FF0F00E40E");
    let (reg, value) = decode_hex_frame(&payload).unwrap();
    assert_eq!(reg.name, "soc");
    assert!((value - 38.12).abs() < 1e-9);
}

#[test]
fn test_decode_hex_frame_signed() {
    // current_coarse (0xED8F), Sn16 x0.1: raw 0xFFFF = -1 -> -0.1
    let payload = response_frame("78FED00FFFF");
    let (reg, value) = decode_hex_frame(&payload).unwrap();
    assert_eq!(reg.name, "current_coarse");
    assert!((value + 0.1).abs() < 1e-9);
}

#[test]
fn test_decode_hex_frame_bad_checksum() {
    let mut payload = response_frame("7FF0F00E40E");
    payload.replace_range(payload.len() - 2.., "00");
    assert!(decode_hex_frame(&payload).is_none());
}

#[test]
fn test_decode_hex_frame_error_flags() {
    // Flags 0x01: device reports an unknown register
    let payload = response_frame("7FF0F01E40E");
    assert!(decode_hex_frame(&payload).is_none());
}

#[test]
fn test_decode_hex_frame_unknown_address() {
    let payload = response_frame("7000000E40E");
    assert!(decode_hex_frame(&payload).is_none());
}

#[test]
fn test_decode_hex_frame_truncated_data() {
    // soc wants 4 data digits, only 2 present
    let payload = response_frame("7FF0F00E4");
    assert!(decode_hex_frame(&payload).is_none());
}

#[test]
fn test_decode_hex_frame_other_response_code() {
    // A SET response ('8') is out of scope and dropped
    let payload = response_frame("8FF0F00E40E");
    assert!(decode_hex_frame(&payload).is_none());
}

#[test]
fn test_decode_text_float() {
    // 950 x0.1 -> 95.0, rendered with the fixed 3 decimal places
    let (reg, payload) = decode_text_line("SOC\t950").unwrap();
    assert_eq!(reg.name, "soc");
    assert_eq!(payload, "95.000");
}

#[test]
fn test_decode_text_bool() {
    let (reg, payload) = decode_text_line("Alarm\tON").unwrap();
    assert_eq!(reg.name, "alarm_state");
    assert_eq!(payload, "1");

    let (_, payload) = decode_text_line("Relay\tOFF").unwrap();
    assert_eq!(payload, "0");

    let (_, payload) = decode_text_line("Alarm\tmaybe").unwrap();
    assert_eq!(payload, "");
}

#[test]
fn test_decode_text_no_data_sentinel() {
    let (_, payload) = decode_text_line("V\t---").unwrap();
    assert_eq!(payload, "");

    let (_, payload) = decode_text_line("P\t---").unwrap();
    assert_eq!(payload, "");
}

#[test]
fn test_decode_text_int_verbatim() {
    // Int fields publish the raw integer, multiplier unapplied
    let (reg, payload) = decode_text_line("P\t-123").unwrap();
    assert_eq!(reg.name, "power");
    assert_eq!(payload, "-123");
}

#[test]
fn test_decode_text_unknown_tag() {
    assert!(decode_text_line("T\t25").is_none());
}

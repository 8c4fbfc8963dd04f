//! Modbus PDU construction and parsing.
//!
//! Only the two function codes the device speaks: read holding
//! registers (0x03) and write single register (0x06). Exception
//! responses carry the request function code with the high bit set.

use bytes::{BufMut, BytesMut};

use crate::error::{Result, VenusError};

pub const FC_READ_HOLDING: u8 = 0x03;
pub const FC_WRITE_SINGLE: u8 = 0x06;

/// Largest register block a single read request may cover.
pub const MAX_READ_COUNT: u16 = 125;

/// Build a read-holding-registers request PDU.
pub fn build_read_holding(address: u16, count: u16) -> Result<Vec<u8>> {
    if count == 0 || count > MAX_READ_COUNT {
        return Err(VenusError::validation(format!(
            "register count {count} out of range 1-{MAX_READ_COUNT}"
        )));
    }
    if u32::from(address) + u32::from(count) > 0x1_0000 {
        return Err(VenusError::validation(format!(
            "register block {address}+{count} exceeds the address space"
        )));
    }
    let mut pdu = BytesMut::with_capacity(5);
    pdu.put_u8(FC_READ_HOLDING);
    pdu.put_u16(address);
    pdu.put_u16(count);
    Ok(pdu.to_vec())
}

/// Build a write-single-register request PDU.
pub fn build_write_single(address: u16, value: u16) -> Vec<u8> {
    let mut pdu = BytesMut::with_capacity(5);
    pdu.put_u8(FC_WRITE_SINGLE);
    pdu.put_u16(address);
    pdu.put_u16(value);
    pdu.to_vec()
}

/// Parse a read-holding response PDU into register words.
pub fn parse_read_holding(pdu: &[u8], expected_count: u16) -> Result<Vec<u16>> {
    check_function(pdu, FC_READ_HOLDING)?;
    if pdu.len() < 2 {
        return Err(VenusError::protocol("read response truncated"));
    }
    let byte_count = pdu[1] as usize;
    let payload = &pdu[2..];
    if payload.len() != byte_count || byte_count != usize::from(expected_count) * 2 {
        return Err(VenusError::protocol(format!(
            "read response byte count {byte_count} does not match {expected_count} registers"
        )));
    }
    Ok(payload
        .chunks_exact(2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .collect())
}

/// Validate a write-single response PDU, which must echo the request.
pub fn parse_write_single(pdu: &[u8], address: u16, value: u16) -> Result<()> {
    check_function(pdu, FC_WRITE_SINGLE)?;
    if pdu.len() != 5 {
        return Err(VenusError::protocol("write response truncated"));
    }
    let echo_address = u16::from_be_bytes([pdu[1], pdu[2]]);
    let echo_value = u16::from_be_bytes([pdu[3], pdu[4]]);
    if echo_address != address || echo_value != value {
        return Err(VenusError::protocol(format!(
            "write echo mismatch: sent {address}={value}, got {echo_address}={echo_value}"
        )));
    }
    Ok(())
}

fn check_function(pdu: &[u8], expected: u8) -> Result<()> {
    let function = *pdu
        .first()
        .ok_or_else(|| VenusError::protocol("empty response PDU"))?;
    if function == expected | 0x80 {
        let code = pdu.get(1).copied().unwrap_or(0);
        return Err(VenusError::protocol(format!(
            "device exception {code:#04x} ({}) for function {expected:#04x}",
            exception_name(code)
        )));
    }
    if function != expected {
        return Err(VenusError::protocol(format!(
            "unexpected function code {function:#04x}, expected {expected:#04x}"
        )));
    }
    Ok(())
}

fn exception_name(code: u8) -> &'static str {
    match code {
        0x01 => "illegal function",
        0x02 => "illegal data address",
        0x03 => "illegal data value",
        0x04 => "server device failure",
        0x05 => "acknowledge",
        0x06 => "server device busy",
        _ => "unknown exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_request_layout() {
        let pdu = build_read_holding(32100, 2).unwrap();
        assert_eq!(pdu, vec![0x03, 0x7D, 0x64, 0x00, 0x02]);
    }

    #[test]
    fn read_count_bounds() {
        assert!(build_read_holding(0, 0).is_err());
        assert!(build_read_holding(0, 126).is_err());
        assert!(build_read_holding(0xFFFF, 2).is_err());
        assert!(build_read_holding(0, 125).is_ok());
    }

    #[test]
    fn read_response_round_trip() {
        let pdu = [0x03, 0x04, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(
            parse_read_holding(&pdu, 2).unwrap(),
            vec![0x1234, 0x5678]
        );
    }

    #[test]
    fn read_response_byte_count_mismatch() {
        let pdu = [0x03, 0x02, 0x12, 0x34];
        assert!(parse_read_holding(&pdu, 2).is_err());
    }

    #[test]
    fn exception_response_is_protocol_error() {
        let pdu = [0x83, 0x02];
        let err = parse_read_holding(&pdu, 1).unwrap_err();
        assert!(matches!(err, VenusError::Protocol(_)));
        assert!(err.to_string().contains("illegal data address"));
    }

    #[test]
    fn write_echo_validation() {
        let pdu = build_write_single(44001, 300);
        assert_eq!(pdu, vec![0x06, 0xAB, 0xE1, 0x01, 0x2C]);
        assert!(parse_write_single(&pdu, 44001, 300).is_ok());
        assert!(parse_write_single(&pdu, 44001, 301).is_err());
    }
}

//! Register codec.
//!
//! Pure functions mapping raw 16-bit register words to typed values
//! and back. All multi-word types are big-endian (high word first) as
//! transmitted by the device.

use crate::error::{ModelError, ModelResult};
use crate::types::DataType;
use crate::value::Value;

/// Decode raw register words into a typed, unscaled value.
///
/// `bit_index` is only consulted for [`DataType::Bit`]; an index
/// outside 0-15 is a contract violation reported as a validation
/// error. Fewer words than the type requires is a decode error, never
/// a panic.
pub fn decode(words: &[u16], dtype: DataType, bit_index: Option<u8>) -> ModelResult<Value> {
    match dtype {
        DataType::Int16 => {
            let word = require(words, 1, dtype)?[0];
            let val = i64::from(word);
            Ok(Value::Int(if val >= 0x8000 { val - 0x1_0000 } else { val }))
        }
        DataType::Uint16 => {
            let word = require(words, 1, dtype)?[0];
            Ok(Value::Int(i64::from(word)))
        }
        DataType::Int32 => {
            let regs = require(words, 2, dtype)?;
            let val = (i64::from(regs[0]) << 16) | i64::from(regs[1]);
            Ok(Value::Int(if val >= 0x8000_0000 {
                val - 0x1_0000_0000
            } else {
                val
            }))
        }
        DataType::Uint32 => {
            let regs = require(words, 2, dtype)?;
            Ok(Value::Int((i64::from(regs[0]) << 16) | i64::from(regs[1])))
        }
        DataType::Ascii => {
            if words.is_empty() {
                return Err(ModelError::decode("ascii value requires at least 1 word"));
            }
            let mut bytes = Vec::with_capacity(words.len() * 2);
            for word in words {
                bytes.push((word >> 8) as u8);
                bytes.push((word & 0xFF) as u8);
            }
            // Non-ASCII bytes are dropped rather than rejected; the
            // device pads string registers with NUL.
            let text: String = bytes
                .into_iter()
                .filter(|b| b.is_ascii())
                .map(char::from)
                .collect();
            Ok(Value::Text(text.trim_end_matches('\0').to_string()))
        }
        DataType::Bit => {
            let index = match bit_index {
                Some(i) if i < 16 => i,
                Some(i) => {
                    return Err(ModelError::validation(format!(
                        "bit index {i} out of range (0-15)"
                    )))
                }
                None => {
                    return Err(ModelError::validation(
                        "bit data type requires a bit index",
                    ))
                }
            };
            let word = require(words, 1, dtype)?[0];
            Ok(Value::Bool((word >> index) & 1 == 1))
        }
        DataType::Bitfield => {
            if words.is_empty() || words.len() > 4 {
                return Err(ModelError::decode(format!(
                    "bitfield requires 1-4 words, got {}",
                    words.len()
                )));
            }
            // Word i carries bits 16*i .. 16*i+15, matching the
            // device's fault/alarm bit numbering.
            let mut raw: u64 = 0;
            for (i, word) in words.iter().enumerate() {
                raw |= u64::from(*word) << (16 * i);
            }
            Ok(Value::Int(raw as i64))
        }
    }
}

/// Encode a value as register words for the declared data type.
///
/// Only used by tests and the single-word [`encode_word`]; the wire
/// protocol itself writes one register at a time.
pub fn encode_words(value: &Value, dtype: DataType) -> ModelResult<Vec<u16>> {
    let numeric = value
        .as_f64()
        .ok_or_else(|| ModelError::validation(format!("cannot encode {value:?} as {dtype}")))?;
    if numeric.fract() != 0.0 {
        return Err(ModelError::validation(format!(
            "cannot encode fractional raw value {numeric} as {dtype}"
        )));
    }
    let raw = numeric as i64;
    match dtype {
        DataType::Int16 => {
            if !(-0x8000..=0x7FFF).contains(&raw) {
                return Err(ModelError::validation(format!(
                    "{raw} out of range for int16"
                )));
            }
            Ok(vec![raw as i16 as u16])
        }
        DataType::Uint16 => {
            if !(0..=0xFFFF).contains(&raw) {
                return Err(ModelError::validation(format!(
                    "{raw} out of range for uint16"
                )));
            }
            Ok(vec![raw as u16])
        }
        DataType::Int32 => {
            if !(-0x8000_0000..=0x7FFF_FFFF).contains(&raw) {
                return Err(ModelError::validation(format!(
                    "{raw} out of range for int32"
                )));
            }
            let bits = raw as i32 as u32;
            Ok(vec![(bits >> 16) as u16, (bits & 0xFFFF) as u16])
        }
        DataType::Uint32 => {
            if !(0..=0xFFFF_FFFF).contains(&raw) {
                return Err(ModelError::validation(format!(
                    "{raw} out of range for uint32"
                )));
            }
            Ok(vec![(raw >> 16) as u16, (raw & 0xFFFF) as u16])
        }
        DataType::Ascii | DataType::Bit | DataType::Bitfield => Err(ModelError::validation(
            format!("data type {dtype} is not writable"),
        )),
    }
}

/// Encode a value into a single register word. The wire protocol only
/// supports single-register writes, so multi-word types are rejected.
pub fn encode_word(value: &Value, dtype: DataType) -> ModelResult<u16> {
    match dtype {
        DataType::Int16 | DataType::Uint16 => Ok(encode_words(value, dtype)?[0]),
        other => Err(ModelError::validation(format!(
            "data type {other} cannot be written as a single register"
        ))),
    }
}

fn require(words: &[u16], count: usize, dtype: DataType) -> ModelResult<&[u16]> {
    if words.len() < count {
        return Err(ModelError::decode(format!(
            "{dtype} requires {count} register(s), got {}",
            words.len()
        )));
    }
    Ok(&words[..count])
}

use crate::core::error::{Error, Result};

/// Variable byte encoding for integers (best for small integers).
/// Used for vints in segment files and relation payloads.
pub struct VByteEncoder;

impl VByteEncoder {
    /// Encode single u32 value
    /// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
    pub fn encode_u32(output: &mut Vec<u8>, mut value: u32) {
        while value >= 128 {
            output.push((value & 127) as u8 | 128);  // Set continuation bit
            value >>= 7;
        }
        output.push(value as u8);  // Last byte without continuation bit
    }

    /// Zig-zag encode so small negative numbers stay short
    pub fn encode_zint(output: &mut Vec<u8>, value: i32) {
        Self::encode_u32(output, ((value << 1) ^ (value >> 31)) as u32);
    }

    /// Decode single u32 value, returns (value, bytes_consumed)
    pub fn decode_u32(input: &[u8]) -> Result<(u32, usize)> {
        let mut value = 0u32;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            value |= ((byte & 127) as u32) << shift;

            if byte & 128 == 0 {  // No continuation bit
                return Ok((value, consumed));
            }

            shift += 7;
            if shift > 28 {  // Max 5 bytes for u32
                return Err(Error::invalid_index("VByte overflow"));
            }
        }

        Err(Error::invalid_index("Incomplete VByte"))
    }

    pub fn decode_zint(input: &[u8]) -> Result<(i32, usize)> {
        let (raw, consumed) = Self::decode_u32(input)?;
        Ok((((raw >> 1) as i32) ^ -((raw & 1) as i32), consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_take_one_byte() {
        let mut out = Vec::new();
        VByteEncoder::encode_u32(&mut out, 127);
        assert_eq!(out, vec![127]);
        out.clear();
        VByteEncoder::encode_u32(&mut out, 128);
        assert_eq!(out, vec![0x80, 0x01]);
    }

    #[test]
    fn zint_keeps_sign() {
        for value in [-300, -1, 0, 1, 2, 70000] {
            let mut out = Vec::new();
            VByteEncoder::encode_zint(&mut out, value);
            let (decoded, consumed) = VByteEncoder::decode_zint(&out).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, out.len());
        }
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert!(VByteEncoder::decode_u32(&[0x80]).is_err());
    }
}

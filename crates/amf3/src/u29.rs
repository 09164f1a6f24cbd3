//! Variable length 29-bit integers.
//!
//! Defined by:
//! - AMF 3 spec, 1.3.1 Variable Length Unsigned 29-bit Integer Encoding

use crate::Amf3Error;
use crate::io::ByteReader;

/// Largest value a U29 can hold.
pub const U29_MAX: u32 = (1 << 29) - 1;

/// Largest value an S29 can hold.
pub const S29_MAX: i32 = (1 << 28) - 1;

/// Smallest value an S29 can hold.
pub const S29_MIN: i32 = -(1 << 28);

/// Reinterpret a U29 as a 29-bit two's complement integer.
pub fn decode_s29(value: u32) -> i32 {
    let value = (value & U29_MAX) as i32;

    if value <= S29_MAX { value } else { value - (1 << 29) }
}

impl ByteReader<'_> {
    /// Read a variable length unsigned 29-bit integer.
    ///
    /// The first three bytes carry 7 bits each, the high bit signals that another
    /// byte follows. A fourth byte contributes all of its 8 bits.
    pub fn read_u29(&mut self) -> Result<u32, Amf3Error> {
        let mut result = 0u32;

        for i in 0..4 {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(Amf3Error::UnexpectedEof) if i > 0 => return Err(Amf3Error::MalformedInteger),
                Err(err) => return Err(err),
            };

            if i == 3 {
                return Ok((result << 8) | byte as u32);
            }

            result = (result << 7) | (byte & 0x7f) as u32;

            if byte & 0x80 == 0 {
                break;
            }
        }

        Ok(result)
    }

    /// Read a variable length signed 29-bit integer.
    pub fn read_s29(&mut self) -> Result<i32, Amf3Error> {
        self.read_u29().map(decode_s29)
    }

    /// Read a U29 and split it into a [`U29Header`].
    pub fn read_header(&mut self) -> Result<U29Header, Amf3Error> {
        self.read_u29().map(U29Header::new)
    }
}

/// The header in front of every complex AMF3 value.
///
/// The low bit tells whether the value follows inline or is a reference into one
/// of the reference tables. The remaining bits are a type specific payload: an
/// index, a length, a count or further flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U29Header {
    payload: u32,
    is_reference: bool,
}

impl U29Header {
    /// Split a U29 into its reference flag and payload.
    pub fn new(value: u32) -> Self {
        Self {
            payload: value >> 1,
            is_reference: value & 1 == 0,
        }
    }

    /// Whether the payload is an index into a reference table.
    pub fn is_reference(&self) -> bool {
        self.is_reference
    }

    /// The bits that have not been consumed yet.
    pub fn payload(&self) -> u32 {
        self.payload
    }

    /// Consume the lowest remaining bit of the payload.
    pub fn next_flag(&mut self) -> bool {
        let flag = self.payload & 1 == 1;
        self.payload >>= 1;
        flag
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
pub(crate) mod tests {
    use super::{S29_MAX, S29_MIN, U29_MAX, U29Header, decode_s29};
    use crate::Amf3Error;
    use crate::io::ByteReader;

    /// Encode a U29, only used to build fixtures.
    pub(crate) fn encode_u29(value: u32) -> Vec<u8> {
        assert!(value <= U29_MAX, "value does not fit in 29 bits");

        if value < 0x80 {
            vec![value as u8]
        } else if value < 0x4000 {
            vec![(value >> 7) as u8 | 0x80, (value & 0x7f) as u8]
        } else if value < 0x20_0000 {
            vec![
                (value >> 14) as u8 | 0x80,
                ((value >> 7) & 0x7f) as u8 | 0x80,
                (value & 0x7f) as u8,
            ]
        } else {
            vec![
                (value >> 22) as u8 | 0x80,
                ((value >> 15) & 0x7f) as u8 | 0x80,
                ((value >> 8) & 0x7f) as u8 | 0x80,
                value as u8,
            ]
        }
    }

    fn read_u29(bytes: &[u8]) -> Result<u32, Amf3Error> {
        ByteReader::new(bytes).read_u29()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(read_u29(&[0x00]).unwrap(), 0);
        assert_eq!(read_u29(&[0x7f]).unwrap(), 127);
        assert_eq!(read_u29(&[0x81, 0x00]).unwrap(), 128);
        assert_eq!(read_u29(&[0xff, 0x7f]).unwrap(), 0x3fff);
        assert_eq!(read_u29(&[0x81, 0x80, 0x00]).unwrap(), 0x4000);
        assert_eq!(read_u29(&[0x80, 0xc0, 0x80, 0x00]).unwrap(), 0x20_0000);
        assert_eq!(read_u29(&[0xff, 0xff, 0xff, 0xff]).unwrap(), U29_MAX);
    }

    #[test]
    fn fourth_byte_uses_all_bits() {
        let mut reader = ByteReader::new(&[0x80, 0x80, 0x80, 0xff, 0x01][..]);
        assert_eq!(reader.read_u29().unwrap(), 0xff);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
    }

    #[test]
    fn u29_round_trip() {
        let samples = (0..=0x4000).chain([0x1f_ffff, 0x20_0000, 0x0fff_ffff, 0x1000_0000, U29_MAX]);

        for value in samples {
            assert_eq!(read_u29(&encode_u29(value)).unwrap(), value, "value {value}");
        }

        for shift in 0..29 {
            let value = 1u32 << shift;
            assert_eq!(read_u29(&encode_u29(value)).unwrap(), value, "value {value}");
            assert_eq!(read_u29(&encode_u29(value - 1)).unwrap(), value - 1, "value {}", value - 1);
        }
    }

    #[test]
    fn s29_round_trip() {
        let samples = (-300..300).chain([S29_MIN, S29_MIN + 1, S29_MAX - 1, S29_MAX, -(1 << 20), 1 << 20]);

        for value in samples {
            let encoded = encode_u29((value as u32) & U29_MAX);
            assert_eq!(ByteReader::new(&encoded[..]).read_s29().unwrap(), value, "value {value}");
        }
    }

    #[test]
    fn s29_sign() {
        assert_eq!(decode_s29(S29_MAX as u32), S29_MAX);
        assert_eq!(decode_s29(1 << 28), S29_MIN);
        assert_eq!(decode_s29(U29_MAX), -1);
    }

    #[test]
    fn truncated() {
        assert!(matches!(read_u29(&[]), Err(Amf3Error::UnexpectedEof)));
        assert!(matches!(read_u29(&[0x81]), Err(Amf3Error::MalformedInteger)));
        assert!(matches!(read_u29(&[0x81, 0x81, 0x81]), Err(Amf3Error::MalformedInteger)));
    }

    #[test]
    fn header_flags() {
        let mut header = U29Header::new(0b1011);
        assert!(!header.is_reference());
        assert_eq!(header.payload(), 0b101);
        assert!(header.next_flag());
        assert!(!header.next_flag());
        assert_eq!(header.payload(), 0b1);

        let header = U29Header::new(0b100);
        assert!(header.is_reference());
        assert_eq!(header.payload(), 2);
    }
}

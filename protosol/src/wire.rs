//! Wire format for Google's Protocol Buffers, aka [protobuf](https://protobuf.dev).

// Discriminant and length conversions here are range checked.
#![allow(clippy::as_conversions)]

use crate::error::{DecodeError, InvalidKeyReason};
use crate::leb128::LebCodec;

/// Smallest legal field number.
pub const MINIMUM_TAG_VAL: u32 = 1;
/// Largest legal field number, `2^29 - 1`.
pub const MAXIMUM_TAG_VAL: u32 = (1 << 29) - 1;

/// The low three bits of a record key.
///
/// The generated Solidity names these after the runtime library
/// (`Bits64`, `LengthDelimited`, `Bits32`); the descriptor reader and the
/// plugin response writer use this enum.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Scalars up to 64 bits, bools and enums.
    Varint = 0,
    /// `fixed64`, `sfixed64` and `double`.
    I64 = 1,
    /// Strings, bytes, messages and packed blocks.
    Len = 2,
    /// Group start. Never produced by proto3.
    SGroup = 3,
    /// Group end. Never produced by proto3.
    EGroup = 4,
    /// `fixed32`, `sfixed32` and `float`.
    I32 = 5,
}

impl WireType {
    /// The raw three-bit value.
    #[inline(always)]
    pub const fn into_val(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WireType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        let wire_type = match value {
            0 => WireType::Varint,
            1 => WireType::I64,
            2 => WireType::Len,
            3 => WireType::SGroup,
            4 => WireType::EGroup,
            5 => WireType::I32,
            _ => return Err(DecodeError::invalid_wire_type(value)),
        };
        Ok(wire_type)
    }
}

/// Writes the key `tag << 3 | wire_type` as a varint.
#[inline]
pub fn encode_key<B: bytes::BufMut>(wire_type: WireType, tag: u32, buf: &mut B) {
    let key = (tag << 3) | u32::from(wire_type.into_val());
    key.encode_leb128(buf);
}

/// Returns the encoded length of a field key (tag + wire type).
#[inline]
pub fn encoded_key_len(tag: u32) -> usize {
    // The wire type only occupies the low three bits, so it never changes the length.
    (tag << 3).encoded_leb128_len()
}

/// Reads one record key, returning its wire type and field number.
///
/// The largest legal key is `MAXIMUM_TAG_VAL << 3 | 7 == u32::MAX`, so a key
/// that overflows `u32` is rejected by the varint decoder.
pub fn decode_key<B: bytes::Buf>(buf: &mut B) -> Result<(WireType, u32), DecodeError> {
    if !buf.has_remaining() {
        return Err(DecodeError::invalid_key(InvalidKeyReason::EmptyBuffer));
    }
    let (raw_key, _) = u32::decode_leb128_buf(buf)?;

    let wire_type = WireType::try_from((raw_key & 0b111) as u8)?;

    let tag = raw_key >> 3;
    if tag < MINIMUM_TAG_VAL {
        return Err(DecodeError::invalid_key(InvalidKeyReason::TagOutOfRange));
    }

    Ok((wire_type, tag))
}

/// Decodes the length prefix for a length-delimited field.
///
/// The returned length is checked against the bytes remaining in `buf`.
pub fn decode_len<B: bytes::Buf>(buf: &mut B) -> Result<usize, DecodeError> {
    let (len, _) = u64::decode_leb128_buf(buf)?;
    let len = usize::try_from(len).map_err(|_| DecodeError::length_overflow(len))?;
    if buf.remaining() < len {
        return Err(DecodeError::unexpected_end_of_buffer());
    }
    Ok(len)
}

/// Writes a length-delimited record: key, varint length, then `payload`.
pub fn encode_len_delimited<B: bytes::BufMut>(tag: u32, payload: &[u8], buf: &mut B) {
    encode_key(WireType::Len, tag, buf);
    (payload.len() as u64).encode_leb128(buf);
    buf.put_slice(payload);
}

/// Reserves the single length byte of a record whose payload is about to be
/// written. Pairs with [`backpatch_len`].
pub fn reserve_len(buf: &mut Vec<u8>) -> usize {
    let len_pos = buf.len();
    buf.push(0);
    len_pos
}

/// Fills in the length reserved at `len_pos` once the payload behind it is
/// complete. A length of 128 or more needs a longer varint, so the payload
/// moves right to make room.
///
/// Generated encoders run the same routine over a fixed buffer, which is
/// why they need headroom after each record.
pub fn backpatch_len(buf: &mut Vec<u8>, len_pos: usize) {
    let len = (buf.len() - len_pos - 1) as u64;
    let mut prefix = Vec::with_capacity(u64::MAX_LEB_BYTES);
    len.encode_leb128(&mut prefix);
    buf.splice(len_pos..=len_pos, prefix);
}

/// Writes a varint record: key, then `value`.
pub fn encode_varint_field<B: bytes::BufMut>(tag: u32, value: u64, buf: &mut B) {
    encode_key(WireType::Varint, tag, buf);
    value.encode_leb128(buf);
}

/// Advances `buf` past one value of `wire_type`.
///
/// The descriptor reader uses this for fields it has no use for, which is
/// most of `descriptor.proto`.
pub fn skip_field<B: bytes::Buf>(wire_type: WireType, buf: &mut B) -> Result<(), DecodeError> {
    let skip_len = match wire_type {
        WireType::Varint => {
            u64::decode_leb128_buf(buf)?;
            return Ok(());
        }
        WireType::I64 => 8,
        WireType::Len => decode_len(buf)?,
        WireType::I32 => 4,
        WireType::SGroup | WireType::EGroup => {
            return Err(DecodeError::deprecated_group_encoding());
        }
    };

    if buf.remaining() < skip_len {
        return Err(DecodeError::unexpected_end_of_buffer());
    }
    buf.advance(skip_len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use bytes::Buf;

    use crate::error::DecodeError;
    use crate::leb128::LebCodec;
    use crate::wire::{
        backpatch_len, decode_key, decode_len, encode_key, encode_len_delimited, encoded_key_len,
        reserve_len, skip_field,
    };
    use crate::wire::{WireType, MAXIMUM_TAG_VAL, MINIMUM_TAG_VAL};

    #[test]
    fn proptest_keys_roundtrip() {
        let wire_types = prop::sample::select(vec![
            WireType::Varint,
            WireType::I64,
            WireType::Len,
            WireType::I32,
        ]);
        proptest!(|(tag in MINIMUM_TAG_VAL..=MAXIMUM_TAG_VAL, wire_type in wire_types)| {
            let mut buf = Vec::new();
            encode_key(wire_type, tag, &mut buf);
            prop_assert_eq!(buf.len(), encoded_key_len(tag));
            prop_assert_eq!(decode_key(&mut &buf[..]).unwrap(), (wire_type, tag));
        });
    }

    #[test]
    fn test_wire_type_values() {
        for value in 0..=5u8 {
            assert_eq!(WireType::try_from(value).unwrap().into_val(), value);
        }
        assert_eq!(
            WireType::try_from(6),
            Err(DecodeError::InvalidWireType { value: 6 })
        );
    }

    #[test]
    fn test_decode_key_rejects_bad_input() {
        // Tag zero.
        let mut buf: &[u8] = &[0x00];
        assert!(matches!(
            decode_key(&mut buf),
            Err(DecodeError::InvalidKey { .. })
        ));

        // Wire type 6.
        let mut buf: &[u8] = &[0x0e];
        assert_eq!(
            decode_key(&mut buf),
            Err(DecodeError::InvalidWireType { value: 6 })
        );

        let mut buf: &[u8] = &[];
        assert!(matches!(
            decode_key(&mut buf),
            Err(DecodeError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_decode_len() {
        let mut buf = &[0u8][..];
        assert_eq!(decode_len(&mut buf).unwrap(), 0);

        let mut buf = &[3u8, 1, 2, 3][..];
        assert_eq!(decode_len(&mut buf).unwrap(), 3);

        // Length runs past the end of the buffer.
        let mut buf = &[0xac, 0x02, 1][..];
        assert_eq!(
            decode_len(&mut buf),
            Err(DecodeError::UnexpectedEndOfBuffer)
        );
    }

    #[test]
    fn test_encode_len_delimited() {
        let mut buf = Vec::new();
        encode_len_delimited(15, b"abc", &mut buf);
        assert_eq!(buf, vec![0x7a, 0x03, b'a', b'b', b'c']);
    }

    /// The backpatch routine of the generated encoders, over a buffer with
    /// headroom: shift the payload by the extra varint bytes, then write the
    /// varint. Returns the new end of the record.
    fn backpatch_in_place(buf: &mut [u8], len_pos: usize, pos: usize) -> usize {
        let len = pos - len_pos - 1;
        let mut size = 1;
        let mut rest = len >> 7;
        while rest != 0 {
            size += 1;
            rest >>= 7;
        }
        if size > 1 {
            for i in (len_pos + 2..=pos).rev() {
                buf[i - 1 + size - 1] = buf[i - 1];
            }
        }
        let mut value = len;
        for j in 0..size {
            let mut b = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                b |= 0x80;
            }
            buf[len_pos + j] = b;
        }
        pos + size - 1
    }

    #[test]
    fn test_backpatch_lengths() {
        for len in [0usize, 1, 127, 128, 300, 16383, 16384, 2_097_152] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

            let mut buf = vec![0xaa];
            let len_pos = reserve_len(&mut buf);
            buf.extend_from_slice(&payload);
            backpatch_len(&mut buf, len_pos);

            let mut rest = &buf[1..];
            assert_eq!(decode_len(&mut rest).unwrap(), len);
            assert_eq!(rest, &payload[..]);

            // The fixed-buffer routine lands on the same bytes.
            let mut fixed = vec![0u8; 1 + 1 + len + 9];
            fixed[0] = 0xaa;
            fixed[2..2 + len].copy_from_slice(&payload);
            let end = backpatch_in_place(&mut fixed, 1, 2 + len);
            assert_eq!(&fixed[..end], &buf[..], "len {len}");
        }
    }

    #[test]
    fn test_backpatch_nested_records() {
        let mut buf = Vec::new();
        let outer = reserve_len(&mut buf);
        let inner = reserve_len(&mut buf);
        buf.extend(std::iter::repeat(7u8).take(200));
        backpatch_len(&mut buf, inner);
        backpatch_len(&mut buf, outer);

        let mut rest = &buf[..];
        assert_eq!(decode_len(&mut rest).unwrap(), 202);
        assert_eq!(decode_len(&mut rest).unwrap(), 200);
        assert!(rest.iter().all(|b| *b == 7));
    }

    /// The packed decoder of the generated codecs: one pass to count, one to
    /// fill a fixed-size array. Empty blocks and truncated elements fail.
    fn decode_packed_two_pass(block: &[u8]) -> Option<Vec<u64>> {
        if block.is_empty() {
            return None;
        }
        let mut cursor = block;
        let mut cnt = 0;
        while cursor.has_remaining() {
            u64::decode_leb128_buf(&mut cursor).ok()?;
            cnt += 1;
        }
        let mut values = vec![0u64; cnt];
        let mut cursor = block;
        for value in values.iter_mut() {
            *value = u64::decode_leb128_buf(&mut cursor).ok()?.0;
        }
        Some(values)
    }

    #[test]
    fn test_packed_two_pass() {
        for values in [vec![1u64], vec![0, 300, u64::MAX], (0..1000).collect()] {
            let mut block = Vec::new();
            for value in &values {
                value.encode_leb128(&mut block);
            }
            assert_eq!(decode_packed_two_pass(&block), Some(values));
        }

        // Absent field is the empty array; an explicit empty block is not.
        assert_eq!(decode_packed_two_pass(&[]), None);
        // Last element cut short.
        assert_eq!(decode_packed_two_pass(&[0x01, 0x80]), None);
    }

    #[test]
    fn test_skip_field() {
        let mut buf = &[0x80, 0x01, 99][..];
        skip_field(WireType::Varint, &mut buf).unwrap();
        assert_eq!(buf, &[99]);

        let mut buf = &[1, 2, 3, 4, 99][..];
        skip_field(WireType::I32, &mut buf).unwrap();
        assert_eq!(buf, &[99]);

        let mut buf = &[1, 2, 3, 4, 5, 6, 7, 8, 99][..];
        skip_field(WireType::I64, &mut buf).unwrap();
        assert_eq!(buf, &[99]);

        let mut buf = &[3, 1, 2, 3, 99][..];
        skip_field(WireType::Len, &mut buf).unwrap();
        assert_eq!(buf, &[99]);

        let mut buf = &[1, 2, 3][..];
        assert!(skip_field(WireType::I64, &mut buf).is_err());
    }

    #[test]
    fn test_skip_field_groups_error() {
        let mut buf = &[0u8][..];
        assert!(skip_field(WireType::SGroup, &mut buf).is_err());
        assert!(skip_field(WireType::EGroup, &mut buf).is_err());
    }
}

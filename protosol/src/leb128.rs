//! LEB128 variable-length integer encoding/decoding.

// This module uses `as` casts which have been reviewed for truncation.
#![allow(clippy::as_conversions)]

use crate::error::DecodeError;

/// Types that can be encoded as, and decoded from, a LEB128 varint.
pub trait LebCodec: Sized + Copy {
    /// Maximum number of bytes a varint of this type may occupy.
    const MAX_LEB_BYTES: usize;

    /// Decode a varint from the front of `buf`, advancing past it.
    ///
    /// Returns the decoded value and the number of bytes consumed. Fails if
    /// the buffer ends mid-varint, if the varint is longer than
    /// [`LebCodec::MAX_LEB_BYTES`], or if the value overflows `Self`.
    fn decode_leb128_buf<B: bytes::Buf>(buf: &mut B) -> Result<(Self, usize), DecodeError>;

    /// Encode `self` into `buf`, returning the number of bytes written.
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize;

    /// The number of bytes required to encode this integer.
    fn encoded_leb128_len(self) -> usize;
}

impl LebCodec for u64 {
    const MAX_LEB_BYTES: usize = 10;

    fn decode_leb128_buf<B: bytes::Buf>(buf: &mut B) -> Result<(Self, usize), DecodeError> {
        let mut value: u64 = 0;
        for i in 0..Self::MAX_LEB_BYTES {
            if !buf.has_remaining() {
                return Err(DecodeError::unexpected_end_of_buffer());
            }
            let byte = buf.get_u8();

            // The tenth byte only contributes bit 63.
            if i == Self::MAX_LEB_BYTES - 1 && byte > 0x01 {
                return Err(DecodeError::invalid_varint());
            }

            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte < 0x80 {
                return Ok((value, i + 1));
            }
        }
        Err(DecodeError::invalid_varint())
    }

    #[inline]
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize {
        let mut value = self;
        let mut written = 1;
        while value >= 0x80 {
            buf.put_u8((value as u8) | 0x80);
            value >>= 7;
            written += 1;
        }
        buf.put_u8(value as u8);
        written
    }

    /// LEB128 stores 7 bits per byte, so the length is
    /// `ceil(significant_bits / 7)` with a minimum of one byte.
    #[inline]
    fn encoded_leb128_len(self) -> usize {
        let significant_bits = 64 - self.leading_zeros() as usize;
        significant_bits.div_ceil(7).max(1)
    }
}

impl LebCodec for u32 {
    const MAX_LEB_BYTES: usize = 5;

    fn decode_leb128_buf<B: bytes::Buf>(buf: &mut B) -> Result<(Self, usize), DecodeError> {
        let mut value: u32 = 0;
        for i in 0..Self::MAX_LEB_BYTES {
            if !buf.has_remaining() {
                return Err(DecodeError::unexpected_end_of_buffer());
            }
            let byte = buf.get_u8();

            // The fifth byte only contributes the top four bits.
            if i == Self::MAX_LEB_BYTES - 1 && byte > 0x0f {
                return Err(DecodeError::invalid_varint());
            }

            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte < 0x80 {
                return Ok((value, i + 1));
            }
        }
        Err(DecodeError::invalid_varint())
    }

    #[inline]
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize {
        u64::from(self).encode_leb128(buf)
    }

    #[inline]
    fn encoded_leb128_len(self) -> usize {
        u64::from(self).encoded_leb128_len()
    }
}

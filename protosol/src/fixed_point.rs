//! Deterministic fixed-point representation of IEEE-754 floats.
//!
//! Generated Solidity has no floating point, so `float` fields are stored as
//! an `int32` holding `value * 10^6` and `double` fields as an `int64` holding
//! `value * 10^15`. The conversion works on the raw bit pattern using integer
//! arithmetic only, which makes it reproducible on any runtime.
//!
//! Decoding (`to_scaled`) truncates toward zero. Zero and subnormal inputs map
//! to `0`; infinities and NaN saturate to the largest positive scaled value;
//! finite values that overflow saturate to `±max`. Every bit pattern has a
//! scaled value, and neighbouring patterns often share one.
//!
//! Encoding (`from_scaled`) picks the float whose mantissa is the rounded-up
//! quotient `|v| * 2^k / scale`, with `k` chosen so the mantissa is normalized.
//! Rounding up guarantees `to_scaled(from_scaled(v)) == v` whenever
//! `|v| < 2^mantissa_bits`.

// Every cast below is between widths that are checked by the surrounding logic.
#![allow(clippy::as_conversions)]

/// An IEEE-754 binary format paired with the fixed-point scale it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatFormat {
    /// Total width of the bit pattern.
    pub bits: u32,
    /// Width of the stored (explicit) mantissa.
    pub mantissa_bits: u32,
    /// Width of the biased exponent.
    pub exponent_bits: u32,
    /// Exponent bias.
    pub exponent_bias: u32,
    /// Multiplier applied to the real value.
    pub scale: u64,
}

/// `float`, scaled by `10^6` into an `int32`.
pub const FLOAT: FloatFormat = FloatFormat {
    bits: 32,
    mantissa_bits: 23,
    exponent_bits: 8,
    exponent_bias: 127,
    scale: 1_000_000,
};

/// `double`, scaled by `10^15` into an `int64`.
pub const DOUBLE: FloatFormat = FloatFormat {
    bits: 64,
    mantissa_bits: 52,
    exponent_bits: 11,
    exponent_bias: 1023,
    scale: 1_000_000_000_000_000,
};

impl FloatFormat {
    pub const fn mantissa_mask(&self) -> u64 {
        (1 << self.mantissa_bits) - 1
    }

    pub const fn exponent_mask(&self) -> u64 {
        (1 << self.exponent_bits) - 1
    }

    /// The implicit leading one of a normalized mantissa.
    pub const fn implicit_bit(&self) -> u64 {
        1 << self.mantissa_bits
    }

    /// The biased exponent at which the full mantissa equals the value itself.
    ///
    /// Exponents above this shift the scaled magnitude left, exponents below
    /// shift it right.
    pub const fn shift_origin(&self) -> u32 {
        self.exponent_bias + self.mantissa_bits
    }

    /// Largest scaled value, the saturation point.
    pub const fn max_scaled(&self) -> u64 {
        (1 << (self.bits - 1)) - 1
    }

    /// Scaled magnitudes strictly below this bound survive `from_scaled`
    /// followed by `to_scaled` unchanged.
    pub const fn exact_bound(&self) -> u64 {
        1 << self.mantissa_bits
    }

    /// Converts a raw IEEE-754 bit pattern into its scaled integer.
    pub fn to_scaled(&self, raw: u64) -> i64 {
        let negative = (raw >> (self.bits - 1)) & 1 == 1;
        let exponent = (raw >> self.mantissa_bits) & self.exponent_mask();
        let mantissa = raw & self.mantissa_mask();

        if exponent == 0 {
            return 0;
        }
        let max = self.max_scaled();
        if exponent == self.exponent_mask() {
            return max as i64;
        }

        let magnitude = u128::from(mantissa | self.implicit_bit()) * u128::from(self.scale);
        let origin = u64::from(self.shift_origin());
        let magnitude = if exponent >= origin {
            let shift = (exponent - origin) as u32;
            if shift >= 64 || magnitude > u128::from(max) >> shift {
                u128::from(max)
            } else {
                magnitude << shift
            }
        } else {
            let shift = (origin - exponent) as u32;
            magnitude.checked_shr(shift).unwrap_or(0)
        };

        let magnitude = magnitude.min(u128::from(max)) as i64;
        if negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Converts a scaled integer into the IEEE-754 bit pattern the encoder writes.
    pub fn from_scaled(&self, scaled: i64) -> u64 {
        if scaled == 0 {
            return 0;
        }
        let sign = u64::from(scaled < 0) << (self.bits - 1);
        let abs = u128::from(scaled.unsigned_abs());
        let scale = u128::from(self.scale);
        let target = scale << self.mantissa_bits;

        // Smallest k with abs * 2^k / scale >= 2^mantissa_bits. For every
        // representable scaled value abs < scale * 2^(mantissa_bits + 1), so k
        // never needs to go negative.
        let mut k: u32 = 0;
        while (abs << k) < target {
            k += 1;
        }

        let mut mantissa = ((abs << k) + scale - 1) / scale;
        if mantissa == u128::from(self.implicit_bit()) << 1 && k > 0 {
            mantissa >>= 1;
            k -= 1;
        }

        let exponent = u64::from(self.shift_origin() - k);
        sign | (exponent << self.mantissa_bits) | (mantissa as u64 & self.mantissa_mask())
    }
}

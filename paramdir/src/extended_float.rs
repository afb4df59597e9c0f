use bytemuck::{Pod, Zeroable};

const EXPONENT_BIAS: i32 = 16383;
const EXPONENT_MAX: u16 = 0x7FFF;
const INTEGER_BIT: u64 = 1 << 63;
const F64_MANTISSA_MASK: u64 = (1 << 52) - 1;

/// x87 80-bit extended precision value in a 16-byte `long double` slot.
///
/// Bytes 0..8 hold the significand (explicit integer bit), bytes 8..10 the
/// sign and 15-bit exponent, all little-endian. Bytes 10..16 are padding and
/// are preserved verbatim.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct ExtendedFloat([u8; 16]);

impl ExtendedFloat {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    fn from_parts(
        sign: bool,
        exponent: u16,
        significand: u64,
    ) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&significand.to_le_bytes());
        let sign_exponent = ((sign as u16) << 15) | (exponent & EXPONENT_MAX);
        bytes[8..10].copy_from_slice(&sign_exponent.to_le_bytes());
        Self(bytes)
    }

    fn parts(&self) -> (bool, u16, u64) {
        let mut significand = [0u8; 8];
        significand.copy_from_slice(&self.0[..8]);
        let sign_exponent = u16::from_le_bytes([self.0[8], self.0[9]]);
        (
            sign_exponent >> 15 == 1,
            sign_exponent & EXPONENT_MAX,
            u64::from_le_bytes(significand),
        )
    }

    /// Exact widening conversion; every `f64` is representable.
    pub fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let sign = bits >> 63 == 1;
        let exponent = ((bits >> 52) & 0x7FF) as i32;
        let mantissa = bits & F64_MANTISSA_MASK;

        match (exponent, mantissa) {
            (0, 0) => Self::from_parts(sign, 0, 0),
            (0x7FF, 0) => Self::from_parts(sign, EXPONENT_MAX, INTEGER_BIT),
            (0x7FF, _) => Self::from_parts(
                sign,
                EXPONENT_MAX,
                INTEGER_BIT | (1 << 62) | (mantissa << 11),
            ),
            (0, _) => {
                let leading_zeros = mantissa.leading_zeros() as i32;
                let significand = mantissa << leading_zeros;
                let biased = 63 - leading_zeros - 1074 + EXPONENT_BIAS;
                Self::from_parts(sign, biased as u16, significand)
            },
            _ => Self::from_parts(
                sign,
                (exponent - 1023 + EXPONENT_BIAS) as u16,
                INTEGER_BIT | (mantissa << 11),
            ),
        }
    }

    pub fn from_f32(value: f32) -> Self {
        Self::from_f64(value as f64)
    }

    /// Narrowing conversion, rounding to nearest even.
    pub fn to_f64(&self) -> f64 {
        let (sign, exponent, significand) = self.parts();
        let sign_bit = (sign as u64) << 63;

        if exponent == EXPONENT_MAX {
            let fraction = significand & !INTEGER_BIT;
            if fraction == 0 {
                return f64::from_bits(sign_bit | (0x7FF << 52));
            }
            let payload = ((fraction >> 11) & F64_MANTISSA_MASK) | (1 << 51);
            return f64::from_bits(sign_bit | (0x7FF << 52) | payload);
        }
        if significand == 0 {
            return f64::from_bits(sign_bit);
        }

        // Denormals use the minimum exponent; normalize unnormal encodings.
        let mut unbiased = exponent.max(1) as i32 - EXPONENT_BIAS;
        let leading_zeros = significand.leading_zeros() as i32;
        let significand = significand << leading_zeros;
        unbiased -= leading_zeros;

        if unbiased > 1023 {
            return f64::from_bits(sign_bit | (0x7FF << 52));
        }

        // Normal results drop the integer bit, subnormal results keep it.
        let shift = if unbiased >= -1022 {
            11
        } else {
            11 + (-1022 - unbiased) as u32
        };
        if shift > 64 {
            return f64::from_bits(sign_bit);
        }

        let wide = significand as u128;
        let mut mantissa = (wide >> shift) as u64;
        let remainder = wide & ((1u128 << shift) - 1);
        let half = 1u128 << (shift - 1);
        if remainder > half || (remainder == half && mantissa & 1 == 1) {
            mantissa += 1;
        }

        if unbiased >= -1022 {
            // The carry out of the fraction bumps the exponent field.
            let biased = (unbiased + 1023) as u64;
            let bits = (biased << 52) + (mantissa - (1 << 52));
            if bits >= 0x7FF << 52 {
                return f64::from_bits(sign_bit | (0x7FF << 52));
            }
            f64::from_bits(sign_bit | bits)
        } else {
            f64::from_bits(sign_bit | mantissa)
        }
    }

    pub fn to_f32(&self) -> f32 {
        self.to_f64() as f32
    }
}

impl From<f64> for ExtendedFloat {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<ExtendedFloat> for f64 {
    fn from(value: ExtendedFloat) -> Self {
        value.to_f64()
    }
}

impl std::fmt::Debug for ExtendedFloat {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "ExtendedFloat({})", self.to_f64())
    }
}

//! Numeric interpretations of a single 8-bit cell: two's-complement
//! integers and a compact sign/exponent/mantissa mini-float. Pure
//! functions, used by whoever needs to display register bytes as numbers.

/// Exponent width the machine's display layer uses by default.
pub const DEFAULT_EXPONENT_BITS: u32 = 3;

/// Reinterprets the byte as a two's-complement integer in -128..=127.
pub fn byte_to_signed_int(byte: u8) -> i8 {
    byte as i8
}

/// Inverse of [`byte_to_signed_int`]: low 7 bits verbatim, bit 7 from the
/// sign.
pub fn signed_int_to_byte(value: i32) -> u8 {
    let sign = if value < 0 { 0x80 } else { 0 };
    (value & 0x7F) as u8 | sign
}

/// Decodes a mini-float with 1 sign bit, `exponent_bits` exponent bits
/// (bias `2^(exponent_bits - 1) - 1`) and `7 - exponent_bits` mantissa
/// bits. An all-zero exponent field is 0; an all-ones field is ±infinity
/// (mantissa 0) or NaN.
pub fn byte_to_float(byte: u8, exponent_bits: u32) -> f64 {
    debug_assert!((1..=7).contains(&exponent_bits));
    let mantissa_bits = 7 - exponent_bits;
    let exponent_mask = (((1u16 << exponent_bits) - 1) as u8) << mantissa_bits;

    if byte & exponent_mask == 0 {
        return 0.0;
    }

    let mantissa = u32::from(byte) & ((1 << mantissa_bits) - 1);
    let bias = (1i32 << (exponent_bits - 1)) - 1;
    let exponent = i32::from((byte & exponent_mask) >> mantissa_bits);
    let sign = if byte & 0x80 != 0 { -1.0 } else { 1.0 };
    let infinity = (1i32 << exponent_bits) - 1;

    if exponent == infinity {
        if mantissa == 0 {
            return sign * f64::INFINITY;
        }
        return f64::NAN;
    }

    let fraction = 1.0 + f64::from(mantissa) / f64::from(1u32 << mantissa_bits);
    sign * fraction * 2f64.powi(exponent - bias)
}

/// Inverse of [`byte_to_float`], re-biasing the IEEE double fields into
/// the mini layout. Exponent overflow saturates to the positive-infinity
/// encoding, underflow to the negative one; a zero biased exponent (zero
/// and subnormals) encodes as 0.
pub fn float_to_byte(value: f64, exponent_bits: u32) -> u8 {
    debug_assert!((1..=7).contains(&exponent_bits));
    let bits = value.to_bits();
    let exponent64 = ((bits >> 52) & 0x7FF) as i32;

    if exponent64 == 0 {
        return 0;
    }

    let mantissa_bits = 7 - exponent_bits;
    let infinity = (1i32 << exponent_bits) - 1;
    let mut sign = if value < 0.0 { 1u8 } else { 0 };
    let mut exponent = infinity;
    let mut mantissa = if mantissa_bits == 0 {
        0
    } else {
        ((bits >> (52 - u64::from(mantissa_bits))) & ((1 << mantissa_bits) - 1)) as u8
    };

    if exponent64 != 0x7FF {
        let bias = (1i32 << (exponent_bits - 1)) - 1;
        exponent = exponent64 - 1023 + bias;

        if exponent >= infinity {
            mantissa = 0;
            exponent = infinity;
            sign = 0;
        } else if exponent < 0 {
            mantissa = 0;
            exponent = infinity;
            sign = 1;
        }
    }

    (sign << 7) | ((exponent as u8) << mantissa_bits) | mantissa
}

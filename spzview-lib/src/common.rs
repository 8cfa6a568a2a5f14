use half::f16;

pub const DEFAULT_CAPACITY_MULTIPLIER: usize = 10;
pub const DEFAULT_FRACTIONAL_BITS: u8 = 12;
pub const COLOR_SCALE: f32 = 0.15;
pub const SH_C0: f32 = 0.282_094_8;
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[inline]
pub(crate) fn clamp_u8(x: f32) -> u8 {
    x.round().clamp(0.0, 255.0) as u8
}

#[inline]
pub(crate) fn quantize_sh(x: f32, bucket_size: i32) -> u8 {
    let q = (x * 128.0).round() as i32 + 128;
    let q = ((q + bucket_size / 2) / bucket_size) * bucket_size;
    q.clamp(0, 255) as u8
}

#[inline]
pub(crate) fn unquantize_sh(x: u8) -> f32 {
    (x as f32 - 128.0) / 128.0
}

/// SH bands beyond DC for a degree, per colour channel.
#[inline]
pub fn dim_for_degree(deg: u8) -> usize {
    match deg {
        0 => 0,
        1 => 3,
        2 => 8,
        3 => 15,
        _ => 0,
    }
}

#[inline]
pub fn sh_coeffs_per_point(deg: u8) -> usize {
    dim_for_degree(deg) * 3
}

#[inline]
pub(crate) fn half_to_float(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

#[cfg(test)]
#[inline]
pub(crate) fn float_to_half(x: f32) -> u16 {
    f16::from_f32(x).to_bits()
}

/// Sign-extends a little-endian 24-bit integer.
#[inline]
pub(crate) fn parse_3bytes(bytes: &[u8]) -> i32 {
    let b0 = bytes[0] as u32;
    let b1 = bytes[1] as u32;
    let b2 = bytes[2] as u32;
    let mut fixed = b0 | (b1 << 8) | (b2 << 16);
    if (fixed & 0x0080_0000) != 0 {
        fixed |= 0xFF00_0000;
    }
    fixed as i32
}

#[inline]
pub(crate) fn write_3bytes(fixed: i32) -> [u8; 3] {
    [
        (fixed & 0xFF) as u8,
        ((fixed >> 8) & 0xFF) as u8,
        ((fixed >> 16) & 0xFF) as u8,
    ]
}

/// Normalises `q`, falling back to identity when the norm vanishes or is not
/// finite.
#[inline]
pub(crate) fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if !norm.is_finite() || norm < f32::EPSILON {
        return [0.0, 0.0, 0.0, 1.0];
    }
    q.map(|c| c / norm)
}

/// `sqrt(1 - |v|^2)`, clamped at zero.
#[inline]
pub(crate) fn complete_unit(sum_sq: f32) -> f32 {
    (1.0 - sum_sq).max(0.0).sqrt()
}

#[inline]
pub(crate) fn sh_dc_to_color(c: u8) -> f32 {
    let dc = (c as f32 / 255.0 - 0.5) / COLOR_SCALE;
    (0.5 + SH_C0 * dc).clamp(0.0, 1.0)
}

#[inline]
pub(crate) fn color_to_sh_dc(rgb: f32) -> u8 {
    let dc = (rgb - 0.5) / SH_C0;
    clamp_u8(dc * COLOR_SCALE * 255.0 + 127.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sh_coeffs_per_degree() {
        assert_eq!(sh_coeffs_per_point(0), 0);
        assert_eq!(sh_coeffs_per_point(1), 9);
        assert_eq!(sh_coeffs_per_point(2), 24);
        assert_eq!(sh_coeffs_per_point(3), 45);
    }

    #[test]
    fn test_3bytes_sign_extension() {
        for v in [0, 1, -1, 4095, -4096, 0x7F_FFFF, -0x80_0000] {
            assert_eq!(parse_3bytes(&write_3bytes(v)), v);
        }
    }

    #[test]
    fn test_normalize_zero_quat_is_identity() {
        assert_eq!(normalize_quat([0.0; 4]), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(normalize_quat([f32::NAN, 0.0, 0.0, 0.0]), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_complete_unit_clamps() {
        assert_eq!(complete_unit(3.0), 0.0);
        assert!((complete_unit(0.36) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_color_mapping_is_close_to_inverse() {
        for i in 0..=20 {
            let rgb = i as f32 / 20.0;
            let back = sh_dc_to_color(color_to_sh_dc(rgb));
            assert!((back - rgb).abs() < 0.01, "{} -> {}", rgb, back);
        }
    }
}

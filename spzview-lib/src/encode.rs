use crate::common::{clamp_u8, color_to_sh_dc, normalize_quat, quantize_sh, write_3bytes};
use crate::error::SpzError;
use crate::structures::{
    GaussianCloud, PackedGaussiansHeader, HEADER_SIZE, MAX_FRACTIONAL_BITS, MAX_SH_DEGREE,
    MIN_FRACTIONAL_BITS,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use zerocopy::IntoBytes;

pub const MAX_GZIP_LEVEL: u32 = 9;

const MIN_FIXED24: f32 = -8_388_608.0;
const MAX_FIXED24: f32 = 8_388_607.0;

fn validate_cloud(cloud: &GaussianCloud, fractional_bits: u8) -> Result<(), SpzError> {
    if !(MIN_FRACTIONAL_BITS..=MAX_FRACTIONAL_BITS).contains(&fractional_bits) {
        return Err(SpzError::SerializePackedGaussians(format!(
            "fractional bits must be in {}..={}, got {}",
            MIN_FRACTIONAL_BITS, MAX_FRACTIONAL_BITS, fractional_bits
        )));
    }
    if cloud.sh_degree > MAX_SH_DEGREE {
        return Err(SpzError::SerializePackedGaussians(format!(
            "SH degree {} exceeds {}",
            cloud.sh_degree, MAX_SH_DEGREE
        )));
    }
    if cloud.points.is_empty() {
        return Err(SpzError::SerializePackedGaussians(
            "cloud has no points".to_string(),
        ));
    }
    if cloud.points.len() > u32::MAX as usize {
        return Err(SpzError::SerializePackedGaussians(format!(
            "{} points do not fit the header",
            cloud.points.len()
        )));
    }
    let expected_sh = cloud.points.len() * cloud.sh_coeffs_per_point();
    if cloud.sh.len() != expected_sh {
        return Err(SpzError::SerializePackedGaussians(format!(
            "expected {} SH coefficients for {} points, got {}",
            expected_sh,
            cloud.points.len(),
            cloud.sh.len()
        )));
    }
    Ok(())
}

/// Scales `v` to 24-bit fixed point, or `None` if it does not fit.
#[inline]
fn to_fixed24(v: f32, scale: f32) -> Option<i32> {
    let fixed = (v * scale).round();
    (MIN_FIXED24..=MAX_FIXED24)
        .contains(&fixed)
        .then_some(fixed as i32)
}

/// Serialises `cloud` as an uncompressed version 2 SPZ body.
///
/// Positions must fit 24-bit fixed point at `fractional_bits`, i.e. lie
/// within `±2^(23 - fractional_bits)`.
pub fn encode_points(cloud: &GaussianCloud, fractional_bits: u8) -> Result<Vec<u8>, SpzError> {
    validate_cloud(cloud, fractional_bits)?;

    let header = PackedGaussiansHeader::new(
        cloud.points.len() as u32,
        cloud.sh_degree,
        fractional_bits,
        cloud.antialiased,
    );
    let sf = (1u32 << fractional_bits) as f32;
    let payload = cloud.points.len() * header.bytes_per_point();

    let mut out = Vec::with_capacity(HEADER_SIZE + payload);
    out.extend_from_slice(header.as_bytes());

    for (i, p) in cloud.points.iter().enumerate() {
        for v in p.position {
            let fixed = to_fixed24(v, sf).ok_or_else(|| {
                SpzError::SerializePackedGaussians(format!(
                    "position {:?} of point {} is out of range at {} fractional bits",
                    p.position, i, fractional_bits
                ))
            })?;
            out.extend_from_slice(&write_3bytes(fixed));
        }
    }
    out.extend(cloud.points.iter().map(|p| clamp_u8(p.color[3] * 255.0)));
    for p in &cloud.points {
        out.extend(p.color[..3].iter().map(|&c| color_to_sh_dc(c)));
    }
    for p in &cloud.points {
        out.extend(p.scale.iter().map(|&s| clamp_u8((s + 10.0) * 16.0)));
    }
    for p in &cloud.points {
        let q = normalize_quat(p.rotation);
        // w is rebuilt as non-negative on decode
        let sign = if q[3] < 0.0 { -1.0 } else { 1.0 };
        out.extend(
            q[..3]
                .iter()
                .map(|&c| (c * sign * 128.0).round().clamp(-128.0, 127.0) as i8 as u8),
        );
    }

    let n = cloud.sh_coeffs_per_point();
    if n > 0 {
        out.extend(cloud.sh.chunks_exact(n).flat_map(|chunk| {
            chunk.iter().enumerate().map(|(j, &x)| {
                let bucket = if j < 9 { 8 } else { 16 };
                quantize_sh(x, bucket)
            })
        }));
    }
    Ok(out)
}

#[inline(never)]
pub fn compress(
    cloud: &GaussianCloud,
    fractional_bits: u8,
    level: u32,
) -> Result<Vec<u8>, SpzError> {
    let body = encode_points(cloud, fractional_bits)?;
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(body.len() / 2),
        Compression::new(level.min(MAX_GZIP_LEVEL)),
    );
    encoder.write_all(&body)?;
    Ok(encoder.finish()?)
}

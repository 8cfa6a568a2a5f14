use crate::common::{
    complete_unit, half_to_float, normalize_quat, parse_3bytes, sh_dc_to_color, unquantize_sh,
};
use crate::error::SpzError;
use crate::header::validate_format;
use crate::structures::{
    GaussianCloud, GaussianPoint, PackedGaussiansHeader, HEADER_SIZE, VERSION_SMALLEST_THREE,
};

/// Attribute columns of an SPZ payload, in storage order.
#[derive(Debug, Clone, Copy)]
struct Columns {
    positions: usize,
    alphas: usize,
    colors: usize,
    scales: usize,
    rotations: usize,
    sh: usize,
}

/// Column-major view of the payload: every position, then every alpha, then
/// colours, scales, rotations and SH runs.
#[derive(Debug, Clone, Copy)]
struct Layout {
    width: Columns,
    start: Columns,
    end: usize,
}

impl Layout {
    fn new(header: &PackedGaussiansHeader) -> Self {
        let np = header.num_points() as usize;
        let width = Columns {
            positions: header.position_bytes(),
            alphas: 1,
            colors: 3,
            scales: 3,
            rotations: header.rotation_bytes(),
            sh: header.sh_coeffs(),
        };
        let mut offset = HEADER_SIZE;
        let mut next = |w: usize| {
            let s = offset;
            offset = offset.saturating_add(np.saturating_mul(w));
            s
        };
        let start = Columns {
            positions: next(width.positions),
            alphas: next(width.alphas),
            colors: next(width.colors),
            scales: next(width.scales),
            rotations: next(width.rotations),
            sh: next(width.sh),
        };
        Layout {
            width,
            start,
            end: offset,
        }
    }

    /// Index of the first point with at least one field past `len`.
    fn first_incomplete_point(&self, len: usize) -> usize {
        let columns = [
            (self.start.positions, self.width.positions),
            (self.start.alphas, self.width.alphas),
            (self.start.colors, self.width.colors),
            (self.start.scales, self.width.scales),
            (self.start.rotations, self.width.rotations),
            (self.start.sh, self.width.sh),
        ];
        columns
            .iter()
            .filter(|(_, w)| *w > 0)
            .map(|&(s, w)| len.saturating_sub(s) / w)
            .min()
            .unwrap_or(0)
    }
}

#[inline]
fn decode_position(chunk: &[u8], uses_f16: bool, scale: f32) -> [f32; 3] {
    if uses_f16 {
        let x = u16::from_le_bytes([chunk[0], chunk[1]]);
        let y = u16::from_le_bytes([chunk[2], chunk[3]]);
        let z = u16::from_le_bytes([chunk[4], chunk[5]]);
        [half_to_float(x), half_to_float(y), half_to_float(z)]
    } else {
        [
            parse_3bytes(&chunk[0..3]) as f32 * scale,
            parse_3bytes(&chunk[3..6]) as f32 * scale,
            parse_3bytes(&chunk[6..9]) as f32 * scale,
        ]
    }
}

/// Versions 1 and 2: x, y, z as signed bytes over 128, w rebuilt as
/// non-negative.
#[inline]
pub(crate) fn decode_rotation_xyz(chunk: &[u8]) -> [f32; 4] {
    let x = (chunk[0] as i8) as f32 / 128.0;
    let y = (chunk[1] as i8) as f32 / 128.0;
    let z = (chunk[2] as i8) as f32 / 128.0;
    let w = complete_unit(x * x + y * y + z * z);
    normalize_quat([x, y, z, w])
}

/// Version 3: the low two bits pick the largest component, the other three
/// follow as 10-bit fields biased by 512.
#[inline]
pub(crate) fn decode_rotation_smallest_three(chunk: &[u8]) -> [f32; 4] {
    let packed = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    let largest = (packed & 0x3) as usize;
    let mut comp = packed >> 2;
    let mut q = [0.0f32; 4];
    for (j, c) in q.iter_mut().enumerate() {
        if j != largest {
            *c = ((comp & 0x3FF) as f32 - 512.0) / 512.0;
            comp >>= 10;
        }
    }
    let sum_sq: f32 = q.iter().map(|c| c * c).sum();
    q[largest] = complete_unit(sum_sq);
    normalize_quat(q)
}

/// Decodes every point described by `header` out of `buffer`.
///
/// `buffer` is the full decompressed blob, header included. Nothing is
/// allocated for points until the whole payload is known to be present.
#[inline(never)]
pub fn decode_points(
    buffer: &[u8],
    header: &PackedGaussiansHeader,
) -> Result<GaussianCloud, SpzError> {
    validate_format(header)?;

    let np = header.num_points() as usize;
    let layout = Layout::new(header);
    if buffer.len() < layout.end || layout.end == usize::MAX {
        return Err(SpzError::TruncatedPayload {
            point: layout.first_incomplete_point(buffer.len()),
            needed: layout.end,
            available: buffer.len(),
        });
    }

    let column = |start: usize, width: usize| &buffer[start..start + np * width];
    let positions = column(layout.start.positions, layout.width.positions);
    let alphas = column(layout.start.alphas, 1);
    let colors = column(layout.start.colors, 3);
    let scales = column(layout.start.scales, 3);
    let rotations = column(layout.start.rotations, layout.width.rotations);
    let sh = column(layout.start.sh, layout.width.sh);

    let uses_f16 = header.uses_float16();
    let position_scale = 1.0 / ((1u32 << header.fractional_bits) as f32);
    let smallest_three = header.version() == VERSION_SMALLEST_THREE;

    let points: Vec<GaussianPoint> = positions
        .chunks_exact(layout.width.positions)
        .zip(alphas.iter())
        .zip(colors.chunks_exact(3))
        .zip(scales.chunks_exact(3))
        .zip(rotations.chunks_exact(layout.width.rotations))
        .map(|((((pos, &alpha), rgb), scale), rot)| GaussianPoint {
            position: decode_position(pos, uses_f16, position_scale),
            scale: [
                scale[0] as f32 / 16.0 - 10.0,
                scale[1] as f32 / 16.0 - 10.0,
                scale[2] as f32 / 16.0 - 10.0,
            ],
            rotation: if smallest_three {
                decode_rotation_smallest_three(rot)
            } else {
                decode_rotation_xyz(rot)
            },
            color: [
                sh_dc_to_color(rgb[0]),
                sh_dc_to_color(rgb[1]),
                sh_dc_to_color(rgb[2]),
                alpha as f32 / 255.0,
            ],
        })
        .collect();

    let sh: Vec<f32> = sh.iter().map(|&b| unquantize_sh(b)).collect();

    log::debug!(
        "Decoded {} points ({} SH coefficients each)",
        points.len(),
        layout.width.sh
    );

    Ok(GaussianCloud {
        num_points: np,
        sh_degree: header.sh_degree,
        antialiased: header.antialiased(),
        points,
        sh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_points;
    use crate::header::parse_header;
    use crate::structures::{VERSION_FLOAT16, VERSION_SMALLEST_THREE};
    use zerocopy::IntoBytes;

    fn assert_unit(q: [f32; 4]) {
        assert!(q.iter().all(|c| c.is_finite()), "NaN in {:?}", q);
        let norm = q.iter().map(|c| c * c).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm {} for {:?}", norm, q);
    }

    fn synthetic_cloud(num_points: usize, sh_degree: u8) -> GaussianCloud {
        let n_sh = crate::common::sh_coeffs_per_point(sh_degree);
        let points = (0..num_points)
            .map(|i| {
                let t = i as f32;
                let q = normalize_quat([0.1 * t, -0.2, 0.3, 1.0]);
                GaussianPoint {
                    position: [t * 0.37 - 5.0, -t * 1.25, 100.0 / (t + 1.0)],
                    scale: [-4.0, -2.5, 0.5],
                    rotation: q,
                    color: [0.2, 0.5, 0.9, (i % 5) as f32 / 4.0],
                }
            })
            .collect();
        let sh = (0..num_points * n_sh)
            .map(|j| ((j % 17) as f32 - 8.0) / 16.0)
            .collect();
        GaussianCloud {
            num_points,
            sh_degree,
            antialiased: false,
            points,
            sh,
        }
    }

    fn decode_all(bytes: &[u8]) -> Result<GaussianCloud, SpzError> {
        let (header, _) = parse_header(bytes)?;
        decode_points(bytes, &header)
    }

    #[test]
    fn test_roundtrip_within_fixed_point_tolerance() {
        for fractional_bits in [8u8, 12, 16] {
            let cloud = synthetic_cloud(32, 2);
            let bytes = encode_points(&cloud, fractional_bits).unwrap();
            let decoded = decode_all(&bytes).expect("decode failed");
            let tol = 1.0 / (1u32 << fractional_bits) as f32;

            assert_eq!(decoded.points.len(), cloud.points.len());
            for (a, b) in cloud.points.iter().zip(&decoded.points) {
                for axis in 0..3 {
                    assert!(
                        (a.position[axis] - b.position[axis]).abs() <= tol,
                        "position {:?} vs {:?} at {} bits",
                        a.position,
                        b.position,
                        fractional_bits
                    );
                    assert!((a.scale[axis] - b.scale[axis]).abs() <= 1.0 / 32.0);
                    assert!((a.color[axis] - b.color[axis]).abs() < 0.01);
                }
                assert!((a.color[3] - b.color[3]).abs() <= 0.5 / 255.0 + 1e-6);
                // q and -q are the same rotation
                let dot: f32 = (0..4).map(|k| a.rotation[k] * b.rotation[k]).sum();
                assert!(dot.abs() > 0.999, "{:?} vs {:?}", a.rotation, b.rotation);
            }
            for (a, b) in cloud.sh.iter().zip(&decoded.sh) {
                assert!((a - b).abs() <= 8.0 / 128.0 + 1e-6, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_output_length_and_sh_count_for_every_degree() {
        for (degree, expected) in [(0u8, 0usize), (1, 9), (2, 24), (3, 45)] {
            let cloud = synthetic_cloud(7, degree);
            let decoded = decode_all(&encode_points(&cloud, 12).unwrap()).unwrap();
            assert_eq!(decoded.points.len(), 7);
            assert_eq!(decoded.num_points, 7);
            assert_eq!(decoded.sh.len(), 7 * expected);
            for i in 0..7 {
                assert_eq!(decoded.sh_coeffs(i).len(), expected);
            }
        }
    }

    fn assert_quat_near(q: [f32; 4], expected: [f32; 4]) {
        for (a, b) in q.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5, "{:?} vs {:?}", q, expected);
        }
    }

    #[test]
    fn test_zero_rotation_bytes_decode_to_identity() {
        assert_eq!(decode_rotation_xyz(&[0, 0, 0]), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rotation_bytes_are_signed_over_128() {
        let w = 0.75f32.sqrt();
        assert_quat_near(decode_rotation_xyz(&[64, 0, 0]), [0.5, 0.0, 0.0, w]);
        assert_quat_near(decode_rotation_xyz(&[0, 0xC0, 0]), [0.0, -0.5, 0.0, w]);
        assert_quat_near(decode_rotation_xyz(&[0, 0, 0x80]), [0.0, 0.0, -1.0, 0.0]);
    }

    #[test]
    fn test_extreme_rotation_bytes_stay_unit() {
        assert_unit(decode_rotation_xyz(&[255, 255, 255]));
        assert_unit(decode_rotation_xyz(&[128, 128, 128]));
        assert_unit(decode_rotation_xyz(&[127, 127, 127]));
        assert_unit(decode_rotation_smallest_three(&[0, 0, 0, 0]));
        assert_unit(decode_rotation_smallest_three(&[0xFF, 0xFF, 0xFF, 0xFF]));
    }

    #[test]
    fn test_every_packed_rotation_is_unit() {
        for x in (0..=255u8).step_by(15) {
            for y in (0..=255u8).step_by(15) {
                for z in (0..=255u8).step_by(15) {
                    assert_unit(decode_rotation_xyz(&[x, y, z]));
                }
            }
        }
    }

    fn pack_smallest_three(q: [f32; 4]) -> [u8; 4] {
        let largest = (0..4)
            .max_by(|&a, &b| q[a].abs().total_cmp(&q[b].abs()))
            .unwrap();
        let sign = if q[largest] < 0.0 { -1.0 } else { 1.0 };
        let mut packed = largest as u32;
        let mut shift = 2;
        for (j, &c) in q.iter().enumerate() {
            if j != largest {
                let field = ((c * sign * 512.0).round() as i32 + 512).clamp(0, 1023) as u32;
                packed |= field << shift;
                shift += 10;
            }
        }
        packed.to_le_bytes()
    }

    #[test]
    fn test_version3_rotations() {
        let cloud = synthetic_cloud(5, 0);
        let mut bytes = encode_points(&cloud, 12).unwrap();
        let (mut header, _) = parse_header(&bytes).unwrap();
        header.version.set(VERSION_SMALLEST_THREE);

        // Rebuild the rotation column at 4 bytes per point.
        let np = cloud.num_points;
        let rot_start = HEADER_SIZE + np * (9 + 1 + 3 + 3);
        bytes.truncate(rot_start);
        for p in &cloud.points {
            bytes.extend_from_slice(&pack_smallest_three(p.rotation));
        }
        bytes[..HEADER_SIZE].copy_from_slice(header.as_bytes());

        let decoded = decode_all(&bytes).expect("v3 decode failed");
        for (a, b) in cloud.points.iter().zip(&decoded.points) {
            assert_unit(b.rotation);
            let dot: f32 = (0..4).map(|k| a.rotation[k] * b.rotation[k]).sum();
            assert!(dot.abs() > 0.999, "{:?} vs {:?}", a.rotation, b.rotation);
        }
    }

    #[test]
    fn test_version1_float16_positions() {
        let mut header = crate::structures::PackedGaussiansHeader::new(2, 0, 12, true);
        header.version.set(VERSION_FLOAT16);
        let mut bytes = header.as_bytes().to_vec();
        for v in [1.5f32, -2.0, 0.25, 1024.0, 0.0, -0.5] {
            bytes.extend_from_slice(&crate::common::float_to_half(v).to_le_bytes());
        }
        bytes.extend_from_slice(&[255, 0]); // alphas
        bytes.extend_from_slice(&[128; 6]); // colors
        bytes.extend_from_slice(&[160; 6]); // scales
        bytes.extend_from_slice(&[0; 6]); // rotations

        let decoded = decode_all(&bytes).expect("v1 decode failed");
        assert!(decoded.antialiased);
        assert_eq!(decoded.points[1].rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(decoded.points[0].position, [1.5, -2.0, 0.25]);
        assert_eq!(decoded.points[1].position, [1024.0, 0.0, -0.5]);
        assert_eq!(decoded.points[0].opacity(), 1.0);
        assert_eq!(decoded.points[1].opacity(), 0.0);
        assert_eq!(decoded.points[0].scale, [0.0; 3]);
        assert_eq!(decoded.points[0].linear_scale(), [1.0; 3]);
    }

    #[test]
    fn test_truncated_payload_exposes_no_points() {
        let cloud = synthetic_cloud(10, 1);
        let bytes = encode_points(&cloud, 12).unwrap();
        let (header, _) = parse_header(&bytes).unwrap();

        // Cut inside the last column: point 7's SH run is incomplete.
        let cut = bytes.len() - 2 * 9 - 4;
        match decode_points(&bytes[..cut], &header) {
            Err(SpzError::TruncatedPayload {
                point,
                needed,
                available,
            }) => {
                assert_eq!(point, 7);
                assert_eq!(needed, bytes.len());
                assert_eq!(available, cut);
            }
            other => panic!("expected TruncatedPayload, got {:?}", other),
        }

        // Cut inside the position column: every later column is missing.
        match decode_points(&bytes[..HEADER_SIZE + 20], &header) {
            Err(SpzError::TruncatedPayload { point, .. }) => assert_eq!(point, 0),
            other => panic!("expected TruncatedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_bad_magic_before_decoding() {
        let cloud = synthetic_cloud(4, 0);
        let bytes = encode_points(&cloud, 12).unwrap();
        let (mut header, _) = parse_header(&bytes).unwrap();
        header.magic.set(0);
        assert!(matches!(
            decode_points(&bytes, &header),
            Err(SpzError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_gpu_bytes_view() {
        let cloud = synthetic_cloud(3, 0);
        let decoded = decode_all(&encode_points(&cloud, 12).unwrap()).unwrap();
        assert_eq!(decoded.as_bytes().len(), 3 * size_of::<GaussianPoint>());
        assert_eq!(size_of::<GaussianPoint>(), 56);
    }
}

//! Compaction of a decoded cloud into 16-byte GPU records.

use crate::common::clamp_u8;
use crate::structures::{BoundingBox, GaussianCloud, PackedSplat, SplatBuffer};
use glam::{Quat, Vec2, Vec3};
use std::f32::consts::PI;

/// Octahedral mapping of a direction into the unit square.
pub fn octahedral_encode(v: Vec3) -> Vec2 {
    let v = v.try_normalize().unwrap_or(Vec3::X);
    let l1 = v.x.abs() + v.y.abs() + v.z.abs();
    let mut p = Vec2::new(v.x / l1, v.y / l1);
    if v.z < 0.0 {
        p = Vec2::new(
            (1.0 - p.y.abs()) * if p.x >= 0.0 { 1.0 } else { -1.0 },
            (1.0 - p.x.abs()) * if p.y >= 0.0 { 1.0 } else { -1.0 },
        );
    }
    p * 0.5 + Vec2::splat(0.5)
}

/// Axis and angle in `[0, π]`; near-identity rotations map to (+X, 0).
pub fn quat_to_axis_angle(q: [f32; 4]) -> (Vec3, f32) {
    let mut q = Quat::from_array(q).normalize();
    if q.w < 0.0 {
        q = -q;
    }
    if q.w >= 1.0 - 1e-6 {
        return (Vec3::X, 0.0);
    }
    let angle = 2.0 * q.w.clamp(-1.0, 1.0).acos();
    let s = (1.0 - q.w * q.w).sqrt();
    if s < 1e-6 {
        return (Vec3::X, angle);
    }
    (Vec3::new(q.x / s, q.y / s, q.z / s), angle)
}

#[inline]
fn unorm16(x: f32) -> u16 {
    (x.clamp(0.0, 1.0) * 65535.0) as u16
}

/// Packs `cloud` for upload, flipping Y into the renderer's frame and
/// normalising positions into the resulting bounding box.
///
/// Returns `None` for an empty cloud.
pub fn pack_for_gpu(cloud: &GaussianCloud) -> Option<SplatBuffer> {
    let flipped = |p: [f32; 3]| [p[0], -p[1], p[2]];
    let bounds = BoundingBox::from_points(cloud.points.iter().map(|p| flipped(p.position)))?;
    let size = bounds.size();
    let inv_range = size.map(|s| if s > 0.0 { 1.0 / s } else { 0.0 });

    let splats = cloud
        .points
        .iter()
        .map(|p| {
            let pos = flipped(p.position);
            let (axis, angle) = quat_to_axis_angle(p.rotation);
            let oct = octahedral_encode(axis);
            PackedSplat {
                pos: [
                    unorm16((pos[0] - bounds.min[0]) * inv_range[0]),
                    unorm16((pos[1] - bounds.min[1]) * inv_range[1]),
                    unorm16((pos[2] - bounds.min[2]) * inv_range[2]),
                ],
                rot_axis_u: (oct.x.clamp(0.0, 1.0) * 255.0) as u8,
                rot_axis_v: (oct.y.clamp(0.0, 1.0) * 255.0) as u8,
                rot_angle: (angle.clamp(0.0, PI) / PI * 255.0) as u8,
                scale: p.scale.map(|s| clamp_u8((s + 10.0) * 16.0)),
                rgba: p.color.map(|c| clamp_u8(c * 255.0)),
            }
        })
        .collect();

    log::debug!(
        "Packed {} splats, bounds min {:?} max {:?}",
        cloud.points.len(),
        bounds.min,
        bounds.max
    );
    Some(SplatBuffer { splats, bounds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::GaussianPoint;

    fn point(position: [f32; 3], rotation: [f32; 4]) -> GaussianPoint {
        GaussianPoint {
            position,
            scale: [-1.0, 0.0, 1.0],
            rotation,
            color: [1.0, 0.5, 0.0, 1.0],
        }
    }

    #[test]
    fn test_packed_splat_is_sixteen_bytes() {
        assert_eq!(size_of::<PackedSplat>(), 16);
    }

    #[test]
    fn test_pack_bounds_and_normalisation() {
        let cloud = GaussianCloud {
            num_points: 3,
            points: vec![
                point([-1.0, 2.0, 0.0], [0.0, 0.0, 0.0, 1.0]),
                point([1.0, -2.0, 4.0], [0.0, 0.0, 0.0, 1.0]),
                point([0.0, 0.0, 2.0], [0.0, 0.0, 0.0, 1.0]),
            ],
            ..Default::default()
        };
        let buf = pack_for_gpu(&cloud).unwrap();
        assert_eq!(buf.bounds.min, [-1.0, -2.0, 0.0]);
        assert_eq!(buf.bounds.max, [1.0, 2.0, 4.0]);
        // y = 2 flips to -2, the bottom of the box
        assert_eq!(buf.splats[0].pos, [0, 0, 0]);
        assert_eq!(buf.splats[1].pos, [65535, 65535, 65535]);
        assert_eq!(buf.splats[2].pos, [32767, 32767, 32767]);
        assert_eq!(buf.splats[0].scale, [144, 160, 176]);
        assert_eq!(buf.splats[0].rgba, [255, 128, 0, 255]);
        assert_eq!(buf.as_bytes().len(), 48);
    }

    #[test]
    fn test_degenerate_axis_packs_to_zero() {
        let cloud = GaussianCloud {
            num_points: 1,
            points: vec![point([3.0, 3.0, 3.0], [0.0, 0.0, 0.0, 1.0])],
            ..Default::default()
        };
        let buf = pack_for_gpu(&cloud).unwrap();
        assert_eq!(buf.splats[0].pos, [0, 0, 0]);
        assert_eq!(buf.splats[0].rot_angle, 0);
    }

    #[test]
    fn test_empty_cloud_has_no_buffer() {
        assert!(pack_for_gpu(&GaussianCloud::default()).is_none());
    }

    #[test]
    fn test_axis_angle() {
        let half = std::f32::consts::FRAC_PI_4;
        let (axis, angle) = quat_to_axis_angle([0.0, 0.0, half.sin(), half.cos()]);
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert!((axis - Vec3::Z).length() < 1e-5);

        let (axis, angle) = quat_to_axis_angle([0.0, 0.0, 0.0, 1.0]);
        assert_eq!((axis, angle), (Vec3::X, 0.0));
    }

    #[test]
    fn test_octahedral_encode_poles() {
        assert_eq!(octahedral_encode(Vec3::Z), Vec2::new(0.5, 0.5));
        assert_eq!(octahedral_encode(Vec3::X), Vec2::new(1.0, 0.5));
        let down = octahedral_encode(-Vec3::Z);
        assert!(down.x == 0.0 || down.x == 1.0);
    }
}

use bytemuck::{Pod, Zeroable};
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::common::sh_coeffs_per_point;

pub const MAGIC: u32 = 0x5053474E; // 'NGSP'
pub const VERSION_FLOAT16: u32 = 1;
pub const VERSION: u32 = 2;
pub const VERSION_SMALLEST_THREE: u32 = 3;
pub const FLAG_ANTIALIASED: u8 = 0x1;
pub const HEADER_SIZE: usize = size_of::<PackedGaussiansHeader>();
pub const MAX_SH_DEGREE: u8 = 3;
pub const MIN_FRACTIONAL_BITS: u8 = 1;
pub const MAX_FRACTIONAL_BITS: u8 = 24;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct PackedGaussiansHeader {
    pub magic: U32,
    pub version: U32,
    pub num_points: U32,
    pub sh_degree: u8,
    pub fractional_bits: u8,
    pub flags: u8,
    pub reserved: u8,
}

impl PackedGaussiansHeader {
    pub fn new(num_points: u32, sh_degree: u8, fractional_bits: u8, antialiased: bool) -> Self {
        Self {
            magic: U32::new(MAGIC),
            version: U32::new(VERSION),
            num_points: U32::new(num_points),
            sh_degree,
            fractional_bits,
            flags: if antialiased { FLAG_ANTIALIASED } else { 0 },
            reserved: 0,
        }
    }

    #[inline]
    pub fn magic(&self) -> u32 {
        self.magic.get()
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version.get()
    }

    #[inline]
    pub fn num_points(&self) -> u32 {
        self.num_points.get()
    }

    #[inline]
    pub fn antialiased(&self) -> bool {
        (self.flags & FLAG_ANTIALIASED) != 0
    }

    #[inline]
    pub fn uses_float16(&self) -> bool {
        self.version() == VERSION_FLOAT16
    }

    #[inline]
    pub fn position_bytes(&self) -> usize {
        if self.uses_float16() {
            6
        } else {
            9
        }
    }

    #[inline]
    pub fn rotation_bytes(&self) -> usize {
        if self.version() == VERSION_SMALLEST_THREE {
            4
        } else {
            3
        }
    }

    #[inline]
    pub fn sh_coeffs(&self) -> usize {
        sh_coeffs_per_point(self.sh_degree)
    }

    /// Width of one point across all attribute columns.
    #[inline]
    pub fn bytes_per_point(&self) -> usize {
        // alpha + rgb + three log scales
        self.position_bytes() + 1 + 3 + 3 + self.rotation_bytes() + self.sh_coeffs()
    }

    /// Total payload size after the header, `None` on overflow.
    #[inline]
    pub fn payload_len(&self) -> Option<usize> {
        (self.num_points() as usize).checked_mul(self.bytes_per_point())
    }
}

/// One decoded splat, laid out for direct upload as a storage buffer.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GaussianPoint {
    pub position: [f32; 3],
    /// Natural-log scale per axis.
    pub scale: [f32; 3],
    /// Unit quaternion as (x, y, z, w).
    pub rotation: [f32; 4],
    /// Linear RGBA in 0.0..=1.0, alpha is opacity.
    pub color: [f32; 4],
}

impl GaussianPoint {
    #[inline]
    pub fn linear_scale(&self) -> [f32; 3] {
        self.scale.map(f32::exp)
    }

    #[inline]
    pub fn opacity(&self) -> f32 {
        self.color[3]
    }
}

#[derive(Debug, Default, Clone)]
pub struct GaussianCloud {
    pub num_points: usize,
    pub sh_degree: u8,
    pub antialiased: bool,
    pub points: Vec<GaussianPoint>,
    /// `num_points * sh_coeffs_per_point(sh_degree)` values, point-major.
    pub sh: Vec<f32>,
}

impl GaussianCloud {
    #[inline]
    pub fn sh_coeffs_per_point(&self) -> usize {
        sh_coeffs_per_point(self.sh_degree)
    }

    /// Spherical-harmonics run of point `i`.
    pub fn sh_coeffs(&self, i: usize) -> &[f32] {
        let n = self.sh_coeffs_per_point();
        &self.sh[i * n..(i + 1) * n]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.points.iter().map(|p| p.position))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    pub fn from_points(points: impl IntoIterator<Item = [f32; 3]>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bb = BoundingBox {
            min: first,
            max: first,
        };
        for p in iter {
            for axis in 0..3 {
                bb.min[axis] = bb.min[axis].min(p[axis]);
                bb.max[axis] = bb.max[axis].max(p[axis]);
            }
        }
        Some(bb)
    }

    #[inline]
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// 16-byte GPU record: normalised position, octahedral rotation axis plus
/// angle, log-scale bytes and RGBA.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PackedSplat {
    pub pos: [u16; 3],
    pub rot_axis_u: u8,
    pub rot_axis_v: u8,
    pub rot_angle: u8,
    pub scale: [u8; 3],
    pub rgba: [u8; 4],
}

#[derive(Debug, Clone)]
pub struct SplatBuffer {
    pub splats: Vec<PackedSplat>,
    pub bounds: BoundingBox,
}

impl SplatBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.splats)
    }
}

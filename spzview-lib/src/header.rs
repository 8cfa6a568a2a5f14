use crate::error::SpzError;
use crate::structures::{
    PackedGaussiansHeader, HEADER_SIZE, MAGIC, MAX_FRACTIONAL_BITS, MAX_SH_DEGREE,
    MIN_FRACTIONAL_BITS, VERSION_FLOAT16, VERSION_SMALLEST_THREE,
};
use zerocopy::FromBytes;

#[inline]
fn is_supported_version(version: u32) -> bool {
    (VERSION_FLOAT16..=VERSION_SMALLEST_THREE).contains(&version)
}

/// Validates header fields that do not depend on the payload.
pub(crate) fn validate_format(header: &PackedGaussiansHeader) -> Result<(), SpzError> {
    if header.magic() != MAGIC {
        return Err(SpzError::UnsupportedFormat(format!(
            "invalid magic number 0x{:08x}",
            header.magic()
        )));
    }
    if !is_supported_version(header.version()) {
        return Err(SpzError::UnsupportedFormat(format!(
            "unsupported version {}",
            header.version()
        )));
    }
    if header.sh_degree > MAX_SH_DEGREE {
        return Err(SpzError::UnsupportedFormat(format!(
            "spherical harmonics degree {} out of range",
            header.sh_degree
        )));
    }
    if !(MIN_FRACTIONAL_BITS..=MAX_FRACTIONAL_BITS).contains(&header.fractional_bits) {
        return Err(SpzError::UnsupportedFormat(format!(
            "fractional bits {} out of range",
            header.fractional_bits
        )));
    }
    Ok(())
}

/// Parses and validates the 16-byte header at the start of `buffer`.
///
/// Returns the header and the number of bytes it occupies. `buffer` must be
/// the whole decompressed blob, since the declared point count is checked
/// against what follows the header.
pub fn parse_header(buffer: &[u8]) -> Result<(PackedGaussiansHeader, usize), SpzError> {
    let (header, rest) = PackedGaussiansHeader::read_from_prefix(buffer)
        .map_err(|_| SpzError::TruncatedHeader { len: buffer.len() })?;

    validate_format(&header)?;

    let num_points = header.num_points();
    let fits = header
        .payload_len()
        .is_some_and(|needed| needed <= rest.len());
    if num_points == 0 || !fits {
        return Err(SpzError::InconsistentPointCount {
            num_points,
            available: rest.len(),
        });
    }

    log::debug!(
        "SPZ header: {} points, version {}, SH degree {}, fractional bits {}, flags 0x{:02x}",
        num_points,
        header.version(),
        header.sh_degree,
        header.fractional_bits,
        header.flags
    );

    Ok((header, HEADER_SIZE))
}

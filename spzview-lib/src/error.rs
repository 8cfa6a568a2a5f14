use std::{fmt, io};

#[derive(Debug)]
pub enum SpzError {
    DecompressInitFailed(String),
    DecompressFailed(String),
    CapacityExceeded {
        limit: usize,
    },
    TruncatedHeader {
        len: usize,
    },
    UnsupportedFormat(String),
    InconsistentPointCount {
        num_points: u32,
        available: usize,
    },
    TruncatedPayload {
        point: usize,
        needed: usize,
        available: usize,
    },
    SerializePackedGaussians(String),
    IoError(io::Error),
}

impl fmt::Display for SpzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpzError::DecompressInitFailed(e) => {
                write!(f, "Failed to initialize gzip decompression: {}", e)
            }
            SpzError::DecompressFailed(e) => {
                write!(f, "Gzip decompression failed: {}", e)
            }
            SpzError::CapacityExceeded { limit } => {
                write!(
                    f,
                    "Decompressed data exceeds the output capacity of {} bytes",
                    limit
                )
            }
            SpzError::TruncatedHeader { len } => {
                write!(f, "SPZ data too small for header: {} bytes", len)
            }
            SpzError::UnsupportedFormat(e) => {
                write!(f, "Unsupported SPZ data: {}", e)
            }
            SpzError::InconsistentPointCount {
                num_points,
                available,
            } => {
                write!(
                    f,
                    "Header declares {} points but only {} payload bytes follow",
                    num_points, available
                )
            }
            SpzError::TruncatedPayload {
                point,
                needed,
                available,
            } => {
                write!(
                    f,
                    "Payload ends inside point {}, need {} bytes, have {}",
                    point, needed, available
                )
            }
            SpzError::SerializePackedGaussians(e) => {
                write!(f, "Failed to serialize packed gaussians: {}", e)
            }
            SpzError::IoError(e) => {
                write!(f, "An I/O error occurred: {}", e)
            }
        }
    }
}

impl std::error::Error for SpzError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpzError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SpzError {
    fn from(e: io::Error) -> Self {
        SpzError::IoError(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError(pub String);

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Renderer failure: {}", self.0)
    }
}

impl std::error::Error for RenderError {}

//! Gzip inflate for SPZ containers.
//!
//! The reference loader inflated into a fixed `10 * input` buffer and gave up
//! if that overflowed. Here the multiplier is only an initial capacity hint;
//! the buffer grows, and a hard ceiling is opt-in through
//! [`DecompressOptions::max_output`].

use crate::common::{DEFAULT_CAPACITY_MULTIPLIER, GZIP_MAGIC};
use crate::error::SpzError;
use flate2::read::GzDecoder;
use std::io::{ErrorKind, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressOptions {
    pub capacity_multiplier: usize,
    pub max_output: Option<usize>,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            capacity_multiplier: DEFAULT_CAPACITY_MULTIPLIER,
            max_output: None,
        }
    }
}

impl DecompressOptions {
    pub fn with_max_output(mut self, limit: usize) -> Self {
        self.max_output = Some(limit);
        self
    }

    pub(crate) fn initial_capacity(&self, input_len: usize) -> usize {
        let hint = input_len.saturating_mul(self.capacity_multiplier.max(1));
        match self.max_output {
            Some(limit) => hint.min(limit),
            None => hint,
        }
    }
}

pub(crate) fn check_gzip_framing(data: &[u8]) -> Result<(), SpzError> {
    if data.is_empty() {
        return Err(SpzError::DecompressInitFailed("empty input".to_string()));
    }
    if !data.starts_with(&GZIP_MAGIC) {
        return Err(SpzError::DecompressInitFailed(
            "missing gzip header".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn map_inflate_error(e: std::io::Error) -> SpzError {
    match e.kind() {
        ErrorKind::UnexpectedEof => {
            SpzError::DecompressFailed(format!("stream ended before end-of-stream marker: {}", e))
        }
        _ => SpzError::DecompressFailed(e.to_string()),
    }
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, SpzError> {
    decompress_with(data, &DecompressOptions::default())
}

#[inline(never)]
pub fn decompress_with(data: &[u8], options: &DecompressOptions) -> Result<Vec<u8>, SpzError> {
    check_gzip_framing(data)?;

    let mut out = Vec::with_capacity(options.initial_capacity(data.len()));
    let decoder = GzDecoder::new(data);
    match options.max_output {
        Some(limit) => {
            // One byte past the limit is enough to tell overflow from an exact fit.
            let mut bounded = decoder.take((limit as u64).saturating_add(1));
            bounded.read_to_end(&mut out).map_err(map_inflate_error)?;
            if out.len() > limit {
                return Err(SpzError::CapacityExceeded { limit });
            }
        }
        None => {
            let mut decoder = decoder;
            decoder.read_to_end(&mut out).map_err(map_inflate_error)?;
        }
    }

    out.shrink_to_fit();
    log::debug!(
        "Inflated {} compressed bytes into {} bytes",
        data.len(),
        out.len()
    );
    Ok(out)
}

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    use async_compression::tokio::bufread::GzipDecoder;
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, BufReader};

    #[inline(never)]
    pub async fn decompress_async(
        data: &[u8],
        options: &DecompressOptions,
    ) -> Result<Vec<u8>, SpzError> {
        check_gzip_framing(data)?;

        let reader = BufReader::new(Cursor::new(data));
        let decoder = GzipDecoder::new(reader);
        let mut out = Vec::with_capacity(options.initial_capacity(data.len()));
        match options.max_output {
            Some(limit) => {
                let mut bounded = decoder.take((limit as u64).saturating_add(1));
                bounded
                    .read_to_end(&mut out)
                    .await
                    .map_err(map_inflate_error)?;
                if out.len() > limit {
                    return Err(SpzError::CapacityExceeded { limit });
                }
            }
            None => {
                let mut decoder = decoder;
                decoder
                    .read_to_end(&mut out)
                    .await
                    .map_err(map_inflate_error)?;
            }
        }

        out.shrink_to_fit();
        Ok(out)
    }
}
}

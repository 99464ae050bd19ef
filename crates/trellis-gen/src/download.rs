//! Input image download

use crate::http::{build_agent, read_bytes};
use std::time::Duration;
use trellis_core::{Result, TrellisError};

const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Fetches the raw bytes behind an image URL.
///
/// Fetches run on a worker thread so a cancelled run does not wait for them.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Downloads images over HTTP(S) with a fixed timeout
pub struct HttpImageSource {
    timeout: Duration,
}

impl HttpImageSource {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

impl Default for HttpImageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = build_agent(self.timeout)
            .get(url)
            .call()
            .map_err(|e| TrellisError::Download(format!("{}: {}", url, e)))?;

        let bytes = read_bytes(response)
            .map_err(|e| TrellisError::Download(format!("{}: {}", url, e)))?;
        if bytes.is_empty() {
            return Err(TrellisError::Download(format!("{}: empty body", url)));
        }
        Ok(bytes)
    }
}

/// Sniff the image format and return the file extension to save it under.
///
/// Anything that is not a recognizable image (an HTML error page, say) is
/// rejected as `InvalidImage`.
pub fn image_extension(bytes: &[u8]) -> Result<&'static str> {
    let format = image::guess_format(bytes).map_err(|e| {
        TrellisError::InvalidImage(format!("unrecognized image data: {}", e))
    })?;
    Ok(format.extensions_str().first().copied().unwrap_or("img"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_extension() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let ext = image_extension(&jpeg).unwrap();
        assert!(ext == "jpg" || ext == "jpeg");
    }

    #[test]
    fn test_png_extension() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(image_extension(&png).unwrap(), "png");
    }

    #[test]
    fn test_html_rejected() {
        let err = image_extension(b"<!DOCTYPE html><html>404</html>").unwrap_err();
        assert!(matches!(err, TrellisError::InvalidImage(_)));
    }
}

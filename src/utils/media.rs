use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("photo is empty")]
    Empty,
    #[error("photo is not valid base64")]
    NotBase64,
    #[error("photo is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("photo is not a jpeg, png, webp or gif image")]
    UnsupportedFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoInfo {
    pub format: ImageFormat,
    pub size: usize,
}

/// Accepts raw base64 or a `data:image/...;base64,` URI.
fn strip_data_uri(input: &str) -> &str {
    let input = input.trim();
    if input.starts_with("data:") {
        if let Some(idx) = input.find("base64,") {
            return &input[idx + "base64,".len()..];
        }
    }
    input
}

pub fn inspect_photo(input: &str, max_bytes: usize) -> Result<PhotoInfo, MediaError> {
    let encoded = strip_data_uri(input);
    if encoded.is_empty() {
        return Err(MediaError::Empty);
    }

    // Reject before decoding; 4 base64 chars carry 3 bytes.
    let approx = encoded.len() / 4 * 3;
    if approx > max_bytes + 3 {
        return Err(MediaError::TooLarge {
            size: approx,
            limit: max_bytes,
        });
    }

    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(cleaned).map_err(|_| MediaError::NotBase64)?;
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    match image::guess_format(&bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Gif)) => {
            Ok(PhotoInfo {
                format,
                size: bytes.len(),
            })
        }
        _ => Err(MediaError::UnsupportedFormat),
    }
}

/// Normalises a photo for storage as a data URI with the sniffed mime type.
pub fn to_data_uri(input: &str, info: &PhotoInfo) -> String {
    let encoded: String = strip_data_uri(input)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    format!("data:{};base64,{}", info.format.to_mime_type(), encoded)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Smallest byte string `image::guess_format` recognises as PNG.
    pub fn png_base64() -> String {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13]);
        STANDARD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_raw_and_data_uri_photos() {
        let raw = fixtures::png_base64();
        let info = inspect_photo(&raw, 1024).unwrap();
        assert_eq!(info.format, ImageFormat::Png);

        let uri = format!("data:image/png;base64,{raw}");
        assert_eq!(inspect_photo(&uri, 1024).unwrap(), info);
        assert!(to_data_uri(&raw, &info).starts_with("data:image/png;base64,"));
    }

    #[test]
    fn rejects_non_images() {
        let text = STANDARD.encode("just some text, not a photo");
        assert_eq!(inspect_photo(&text, 1024), Err(MediaError::UnsupportedFormat));
        assert_eq!(inspect_photo("%%%", 1024), Err(MediaError::NotBase64));
        assert_eq!(inspect_photo("data:image/png;base64,", 1024), Err(MediaError::Empty));
    }

    #[test]
    fn rejects_oversized_photos() {
        let raw = fixtures::png_base64();
        assert!(matches!(
            inspect_photo(&raw, 4),
            Err(MediaError::TooLarge { limit: 4, .. })
        ));
    }
}

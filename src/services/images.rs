use axum::body::Bytes;
use base64::Engine;
use image::ImageFormat;

/// An uploaded image whose format was confirmed from its magic bytes.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub format: ImageFormat,
}

impl UploadedImage {
    /// Returns `None` unless the payload is a supported image.
    pub fn sniff(bytes: Bytes) -> Option<Self> {
        let format = sniff_format(&bytes)?;
        Some(Self { bytes, format })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn to_data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.mime_type(), encoded)
    }
}

pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Gif)) => {
            Some(format)
        }
        _ => None,
    }
}

/// Data URIs for a left/right palm pair.
#[derive(Debug, Clone)]
pub struct EncodedPair {
    pub left: String,
    pub right: String,
}

/// Base64-encode both images on the blocking pool, concurrently.
pub async fn encode_pair(
    left: &UploadedImage,
    right: &UploadedImage,
) -> Result<EncodedPair, tokio::task::JoinError> {
    let left = left.clone();
    let right = right.clone();
    let (left, right) = tokio::try_join!(
        tokio::task::spawn_blocking(move || left.to_data_uri()),
        tokio::task::spawn_blocking(move || right.to_data_uri()),
    )?;
    Ok(EncodedPair { left, right })
}

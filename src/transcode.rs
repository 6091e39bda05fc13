//! Bitmap normalization for cached resources.
//!
//! Images are decoded, fitted inside a fixed bounding box, flattened to RGB
//! and re-encoded as progressive JPEG. Anything that cannot be processed is
//! passed through unchanged so the cache still has bytes to serve.

use image::DynamicImage;
use image::imageops::FilterType;

pub const MAX_DIMENSION: u32 = 1200;
pub const JPEG_QUALITY: u8 = 70;

/// Result of a transcode attempt.
#[derive(Debug, Clone)]
pub enum TranscodeOutcome {
    /// The image was re-encoded as JPEG.
    Transcoded {
        bytes: Vec<u8>,
        width: u32,
        height: u32,
    },
    /// Processing failed; these are the original bytes.
    PassedThrough { bytes: Vec<u8>, reason: String },
}

impl TranscodeOutcome {
    pub fn is_transcoded(&self) -> bool {
        matches!(self, Self::Transcoded { .. })
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Transcoded { bytes, .. } | Self::PassedThrough { bytes, .. } => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Transcoded { bytes, .. } | Self::PassedThrough { bytes, .. } => bytes,
        }
    }
}

/// Downscaling JPEG transcoder.
#[derive(Debug, Clone, Copy)]
pub struct Transcoder {
    pub max_dimension: u32,
    pub quality: u8,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            quality: JPEG_QUALITY,
        }
    }
}

impl Transcoder {
    /// Transcode on the blocking pool.
    pub async fn transcode_async(self, bytes: Vec<u8>) -> TranscodeOutcome {
        let fallback = bytes.clone();
        match tokio::task::spawn_blocking(move || self.transcode(bytes)).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(%error, "transcode task failed, serving original bytes");
                TranscodeOutcome::PassedThrough {
                    bytes: fallback,
                    reason: error.to_string(),
                }
            }
        }
    }

    pub fn transcode(&self, bytes: Vec<u8>) -> TranscodeOutcome {
        match self.encode(&bytes) {
            Ok((encoded, width, height)) => {
                tracing::debug!(
                    original_bytes = bytes.len(),
                    encoded_bytes = encoded.len(),
                    width,
                    height,
                    "image transcoded"
                );
                TranscodeOutcome::Transcoded {
                    bytes: encoded,
                    width,
                    height,
                }
            }
            Err(reason) => {
                tracing::warn!(%reason, size = bytes.len(), "image transcode failed, passing through");
                TranscodeOutcome::PassedThrough { bytes, reason }
            }
        }
    }

    fn encode(&self, bytes: &[u8]) -> Result<(Vec<u8>, u32, u32), String> {
        let img = image::load_from_memory(bytes).map_err(|e| format!("decode: {e}"))?;
        let img = self.fit(img);
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => return Err(format!("dimensions {width}x{height} exceed JPEG limits")),
        };

        let mut out = Vec::new();
        let mut encoder = jpeg_encoder::Encoder::new(&mut out, self.quality);
        encoder.set_progressive(true);
        encoder
            .encode(rgb.as_raw(), w, h, jpeg_encoder::ColorType::Rgb)
            .map_err(|e| format!("encode: {e}"))?;

        Ok((out, width, height))
    }

    /// Shrink to fit the bounding box. Smaller images are left as they are.
    fn fit(&self, img: DynamicImage) -> DynamicImage {
        if img.width() <= self.max_dimension && img.height() <= self.max_dimension {
            return img;
        }
        img.resize(self.max_dimension, self.max_dimension, FilterType::Triangle)
    }
}

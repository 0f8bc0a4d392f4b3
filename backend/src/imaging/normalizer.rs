use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("image exceeds the {0} byte upload limit")]
    TooLarge(usize),
    #[error("image could not be decoded: {0}")]
    Undecodable(String),
    #[error("image could not be re-encoded: {0}")]
    Encode(String),
}

#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Fixed-size JPEG bytes every downstream stage consumes.
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`, so the hash is stable across client-side
    /// re-encodings and metadata differences of the same picture.
    pub hash: String,
    pub width: u32,
    pub height: u32,
}

/// Validates and canonicalizes an uploaded image: decode, stretch-resize to a
/// fixed resolution, re-encode as JPEG, and content-hash the result.
#[derive(Clone)]
pub struct ImageNormalizer {
    target_width: u32,
    target_height: u32,
    max_upload_bytes: usize,
    jpeg_quality: u8,
}

impl ImageNormalizer {
    pub fn new(
        target_width: u32,
        target_height: u32,
        max_upload_bytes: usize,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            target_width,
            target_height,
            max_upload_bytes,
            jpeg_quality,
        }
    }

    pub fn normalize(&self, raw: &[u8]) -> Result<NormalizedImage, NormalizeError> {
        if raw.len() > self.max_upload_bytes {
            return Err(NormalizeError::TooLarge(self.max_upload_bytes));
        }

        let decoded = image::load_from_memory(raw)
            .map_err(|e| NormalizeError::Undecodable(e.to_string()))?
            .to_rgb8();

        // Stretch to the target without preserving aspect ratio; the models
        // were trained on stretched inputs.
        let resized = image::imageops::resize(
            &decoded,
            self.target_width,
            self.target_height,
            FilterType::Lanczos3,
        );

        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality);
        encoder
            .encode(
                resized.as_raw(),
                self.target_width,
                self.target_height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| NormalizeError::Encode(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash = hex::encode(hasher.finalize());

        log::debug!(
            "normalized image: {}x{} -> {}x{}, {} bytes, hash {}",
            decoded.width(),
            decoded.height(),
            self.target_width,
            self.target_height,
            bytes.len(),
            &hash[..8]
        );

        Ok(NormalizedImage {
            bytes,
            hash,
            width: self.target_width,
            height: self.target_height,
        })
    }
}

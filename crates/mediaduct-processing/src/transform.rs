use crate::error::ProcessingError;
use crate::sniff::{sniff_format, SniffedFormat};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, GenericImageView};
use mediaduct_core::constants::{PROCESSED_JPEG_QUALITY, PROCESSED_MAX_DIMENSIONS};
use std::io::Cursor;

/// Output of a successful transform.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub source_format: SniffedFormat,
}

/// Transformation seam for the worker. Implementations must be pure with
/// respect to the input bytes so retries and redeliveries are idempotent.
pub trait MediaTransformer: Send + Sync {
    fn transform(&self, data: &[u8]) -> Result<ProcessedImage, ProcessingError>;
}

/// Standard rendition transformer: fit within a bounding box without
/// upscaling, re-encode as JPEG.
pub struct ImageTransformer {
    max_width: u32,
    max_height: u32,
    jpeg_quality: u8,
}

impl ImageTransformer {
    pub fn new(max_width: u32, max_height: u32, jpeg_quality: u8) -> Self {
        Self {
            max_width,
            max_height,
            jpeg_quality,
        }
    }
}

impl Default for ImageTransformer {
    fn default() -> Self {
        let (max_width, max_height) = PROCESSED_MAX_DIMENSIONS;
        Self::new(max_width, max_height, PROCESSED_JPEG_QUALITY)
    }
}

/// Calculate dimensions that fit `(orig_width, orig_height)` within the
/// bounding box, preserving aspect ratio and never upscaling.
pub fn fit_within(
    orig_width: u32,
    orig_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if orig_width <= max_width && orig_height <= max_height {
        return (orig_width, orig_height);
    }

    let width_scale = max_width as f32 / orig_width as f32;
    let height_scale = max_height as f32 / orig_height as f32;
    let scale = width_scale.min(height_scale);

    let width = ((orig_width as f32 * scale).round() as u32).max(1);
    let height = ((orig_height as f32 * scale).round() as u32).max(1);
    (width.min(max_width), height.min(max_height))
}

/// Select a resampling filter by downscale ratio: cheap filters for heavy
/// reductions, Lanczos near 1:1.
fn select_filter(
    orig_width: u32,
    orig_height: u32,
    new_width: u32,
    new_height: u32,
) -> imageops::FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        imageops::FilterType::Triangle
    } else if max_ratio > 1.5 {
        imageops::FilterType::CatmullRom
    } else {
        imageops::FilterType::Lanczos3
    }
}

impl MediaTransformer for ImageTransformer {
    fn transform(&self, data: &[u8]) -> Result<ProcessedImage, ProcessingError> {
        let source_format = sniff_format(data)?;

        let img = image::load_from_memory_with_format(data, source_format.image_format())
            .map_err(|e| ProcessingError::Decode(e.to_string()))?;

        let (orig_width, orig_height) = img.dimensions();
        let (width, height) = fit_within(orig_width, orig_height, self.max_width, self.max_height);

        let resized = if (width, height) == (orig_width, orig_height) {
            img
        } else {
            let filter = select_filter(orig_width, orig_height, width, height);
            tracing::debug!(
                orig_width = orig_width,
                orig_height = orig_height,
                width = width,
                height = height,
                filter = ?filter,
                "Resizing image"
            );
            img.resize_exact(width, height, filter)
        };

        // JPEG has no alpha channel; flatten before encoding.
        let rgb = resized.to_rgb8();
        let estimated_size = (width * height * 3) as usize;
        let mut buffer = Vec::with_capacity(estimated_size);
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), self.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| ProcessingError::Encode(e.to_string()))?;

        tracing::debug!(
            source_format = %source_format,
            width = width,
            height = height,
            output_bytes = buffer.len(),
            "Image transformed"
        );

        Ok(ProcessedImage {
            data: Bytes::from(buffer),
            content_type: "image/jpeg",
            width,
            height,
            source_format,
        })
    }
}

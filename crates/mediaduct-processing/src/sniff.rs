use crate::error::ProcessingError;
use image::ImageFormat;
use std::fmt;

/// Image format recognized from magic numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
}

impl SniffedFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            SniffedFormat::Jpeg => "image/jpeg",
            SniffedFormat::Png => "image/png",
            SniffedFormat::WebP => "image/webp",
            SniffedFormat::Gif => "image/gif",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            SniffedFormat::Jpeg => ImageFormat::Jpeg,
            SniffedFormat::Png => ImageFormat::Png,
            SniffedFormat::WebP => ImageFormat::WebP,
            SniffedFormat::Gif => ImageFormat::Gif,
        }
    }

    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(SniffedFormat::Jpeg),
            ImageFormat::Png => Some(SniffedFormat::Png),
            ImageFormat::WebP => Some(SniffedFormat::WebP),
            ImageFormat::Gif => Some(SniffedFormat::Gif),
            _ => None,
        }
    }
}

impl fmt::Display for SniffedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content_type())
    }
}

/// Recognize the payload format from its magic numbers.
///
/// The client-declared content type plays no part here; a renamed file
/// or a spoofed header changes nothing.
pub fn sniff_format(data: &[u8]) -> Result<SniffedFormat, ProcessingError> {
    let format = image::guess_format(data)
        .map_err(|_| ProcessingError::Unsupported("unrecognized content".to_string()))?;

    SniffedFormat::from_image_format(format).ok_or_else(|| {
        ProcessingError::Unsupported(format!("{:?} input is not supported", format))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([9, 8, 7])));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    #[test]
    fn recognizes_supported_formats() {
        assert_eq!(
            sniff_format(&encoded(ImageFormat::Png)).unwrap(),
            SniffedFormat::Png
        );
        assert_eq!(
            sniff_format(&encoded(ImageFormat::Jpeg)).unwrap(),
            SniffedFormat::Jpeg
        );
        assert_eq!(
            sniff_format(&encoded(ImageFormat::Gif)).unwrap(),
            SniffedFormat::Gif
        );
        assert_eq!(
            sniff_format(&encoded(ImageFormat::WebP)).unwrap(),
            SniffedFormat::WebP
        );
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = sniff_format(b"plain text, definitely not an image").unwrap_err();
        assert!(matches!(err, ProcessingError::Unsupported(_)));
    }

    #[test]
    fn rejects_empty_payload() {
        let err = sniff_format(&[]).unwrap_err();
        assert!(matches!(err, ProcessingError::Unsupported(_)));
    }

    #[test]
    fn rejects_unsupported_image_format() {
        // BMP magic number; a real format but outside the supported set.
        let bmp = b"BM\x3a\x00\x00\x00\x00\x00\x00\x00\x36\x00\x00\x00";
        let err = sniff_format(bmp).unwrap_err();
        assert!(matches!(err, ProcessingError::Unsupported(_)));
    }

    #[test]
    fn content_types_are_canonical() {
        assert_eq!(SniffedFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(SniffedFormat::Png.content_type(), "image/png");
        assert_eq!(SniffedFormat::WebP.content_type(), "image/webp");
        assert_eq!(SniffedFormat::Gif.content_type(), "image/gif");
    }
}

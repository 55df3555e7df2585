use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};

use crate::error::EncodeError;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// One sampled still, ready for the wire. Not retained after sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    jpeg: Vec<u8>,
}

impl EncodedFrame {
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    /// The recognizer expects a data URL and decodes everything after the first comma.
    pub fn to_data_url(&self) -> String {
        let mut url = String::with_capacity(DATA_URL_PREFIX.len() + self.jpeg.len() * 4 / 3 + 4);
        url.push_str(DATA_URL_PREFIX);
        STANDARD.encode_string(&self.jpeg, &mut url);
        url
    }
}

/// Lossy still-image encoder for sampled frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// CPU-bound. Callers on the runtime should move this onto the blocking pool.
    pub fn encode(&self, frame: &RgbImage) -> Result<EncodedFrame, EncodeError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(EncodeError::Empty { width, height });
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            frame.as_raw(),
            width,
            height,
            ColorType::Rgb8,
        )?;
        Ok(EncodedFrame { jpeg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn encodes_a_jpeg_data_url() {
        let frame = RgbImage::from_pixel(16, 8, Rgb([200, 10, 10]));
        let encoded = FrameEncoder::new(80).encode(&frame).unwrap();

        // SOI marker
        assert_eq!(&encoded.jpeg()[..2], &[0xff, 0xd8]);

        let url = encoded.to_data_url();
        let (prefix, payload) = url.split_once(',').unwrap();
        assert_eq!(prefix, "data:image/jpeg;base64");
        assert_eq!(STANDARD.decode(payload).unwrap(), encoded.jpeg());
    }

    #[test]
    fn empty_frames_fail_to_encode() {
        let frame = RgbImage::new(0, 0);
        assert!(matches!(
            FrameEncoder::new(80).encode(&frame),
            Err(EncodeError::Empty { .. })
        ));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(FrameEncoder::new(0).quality(), 1);
        assert_eq!(FrameEncoder::new(250).quality(), 100);
    }
}

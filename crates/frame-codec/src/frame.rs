//! Frame types and conversion

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbImage};
use tracing::debug;

use crate::FrameError;

/// Pixel dimensions of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel area
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// A frame with a zero dimension cannot be interpreted
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Decoded RGB frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
}

/// Single-channel luminance view used by face locators
#[derive(Debug, Clone)]
pub struct GrayView {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Create a frame from packed RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        let geometry = FrameGeometry::new(width, height);
        if !geometry.is_valid() || data.len() as u64 != geometry.area() * 3 {
            return Err(FrameError::Geometry { width, height });
        }
        Ok(Self { data, width, height })
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height)
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> GrayView {
        let mut gray = Vec::with_capacity(self.width as usize * self.height as usize);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        GrayView {
            data: gray,
            width: self.width,
            height: self.height,
        }
    }

    /// Encode as JPEG for persistence
    pub fn encode_jpeg(&self) -> Result<Vec<u8>, FrameError> {
        let img = RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or(FrameError::Geometry { width: self.width, height: self.height })?;

        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Jpeg)
            .map_err(|e| FrameError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

/// Decode an encoded image (JPEG, PNG, ...) to an RGB frame
pub fn decode_image(bytes: &[u8]) -> Result<Frame, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::Empty);
    }

    let img = image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    Frame::new(rgb.into_raw(), width, height)
}

/// Decode a base64 frame payload.
///
/// Browser clients often send canvas captures as data URLs
/// (`data:image/jpeg;base64,...`); the prefix is stripped.
pub fn decode_base64(payload: &str) -> Result<Frame, FrameError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(FrameError::Empty);
    }

    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    debug!("Decoded {} bytes of frame payload", bytes.len());
    decode_image(&bytes)
}

//! Frame Codec
//!
//! Turns the base64 payloads submitted by exam clients into decoded frames:
//! - Base64 (optionally data-URL prefixed) decoding
//! - Image decoding to packed RGB
//! - Grayscale views for face location
//! - JPEG encoding for captured artifacts

pub mod frame;

pub use frame::{decode_base64, decode_image, Frame, FrameGeometry, GrayView};

use thiserror::Error;

/// Frame decoding/encoding errors
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Empty frame payload")]
    Empty,

    #[error("Image decoding failed: {0}")]
    Decode(String),

    #[error("Invalid frame geometry: {width}x{height}")]
    Geometry { width: u32, height: u32 },

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

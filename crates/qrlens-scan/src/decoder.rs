//! QR decoding over RGBA buffers.
//!
//! Uses rqrr for detection and decoding. rqrr only reads dark-on-light
//! codes, so light-on-dark codes are handled by inverting the greyscale
//! buffer and decoding again.

use image::RgbaImage;
use qrlens_core::{DecodeLocation, Point};
use std::path::Path;
use thiserror::Error;

/// Which polarities to try when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvertPolicy {
    /// Dark modules on a light background only.
    Normal,
    /// Light modules on a dark background only.
    Inverted,
    /// Normal first, then inverted.
    #[default]
    AttemptBoth,
}

/// A decoded code and where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub text: String,
    /// Corners in source pixel space.
    pub location: DecodeLocation,
}

/// Failure to produce a decodable image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that finds at most one code in an image.
pub trait Decoder {
    fn decode(&self, image: &RgbaImage, policy: InvertPolicy) -> Option<Decoded>;
}

impl<D: Decoder + ?Sized> Decoder for &D {
    fn decode(&self, image: &RgbaImage, policy: InvertPolicy) -> Option<Decoded> {
        (**self).decode(image, policy)
    }
}

/// rqrr-backed decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_grey(&self, grey: &[u8], width: usize, height: usize) -> Option<Decoded> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            grey.get(y * width + x).copied().unwrap_or(255)
        });

        let grids = prepared.detect_grids();
        if !grids.is_empty() {
            tracing::trace!("Detected {} grid(s) in {}x{} image", grids.len(), width, height);
        }

        for grid in &grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    tracing::debug!(
                        "QR decoded: {} bytes, ECC={:?}, version={:?}",
                        content.len(),
                        meta.ecc_level,
                        meta.version
                    );
                    let to_point = |p: rqrr::Point| Point::new(p.x as f64, p.y as f64);
                    let location = DecodeLocation::from_corners(grid.bounds.map(to_point));
                    return Some(Decoded {
                        text: content,
                        location,
                    });
                }
                Err(e) => {
                    tracing::trace!("Grid decode error: {:?}", e);
                }
            }
        }
        None
    }
}

impl Decoder for RqrrDecoder {
    fn decode(&self, image: &RgbaImage, policy: InvertPolicy) -> Option<Decoded> {
        let width = image.width() as usize;
        let height = image.height() as usize;
        if width == 0 || height == 0 {
            return None;
        }

        let mut grey = to_greyscale(image);
        match policy {
            InvertPolicy::Normal => self.decode_grey(&grey, width, height),
            InvertPolicy::Inverted => {
                invert(&mut grey);
                self.decode_grey(&grey, width, height)
            }
            InvertPolicy::AttemptBoth => self.decode_grey(&grey, width, height).or_else(|| {
                invert(&mut grey);
                self.decode_grey(&grey, width, height)
            }),
        }
    }
}

/// Luminance of each pixel, with transparency composited over white.
pub fn to_greyscale(image: &RgbaImage) -> Vec<u8> {
    image
        .pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            // Standard luminance formula: Y = 0.299*R + 0.587*G + 0.114*B
            let y = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
            let a = a as u32;
            ((y * a + 255 * (255 - a)) / 255) as u8
        })
        .collect()
}

fn invert(grey: &mut [u8]) {
    for v in grey.iter_mut() {
        *v = 255 - *v;
    }
}

/// Load an image file in any format the `image` crate supports.
pub fn load_image_file(path: impl AsRef<Path>) -> Result<RgbaImage, DecodeError> {
    let bytes = std::fs::read(path.as_ref())?;
    load_image_bytes(&bytes)
}

/// Decode encoded image bytes (PNG, JPEG) into RGBA.
pub fn load_image_bytes(bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// RGB frame bytes to RGBA.
pub fn rgb_to_rgba(width: u32, height: u32, rgb: &[u8]) -> Option<RgbaImage> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for chunk in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
    }
    RgbaImage::from_raw(width, height, rgba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{render_qr, render_qr_inverted};

    #[test]
    fn test_decode_rendered_code() {
        let img = render_qr("https://example.com");
        let decoded = RqrrDecoder.decode(&img, InvertPolicy::Normal).unwrap();
        assert_eq!(decoded.text, "https://example.com");
    }

    #[test]
    fn test_location_lies_inside_image() {
        let img = render_qr("hello");
        let decoded = RqrrDecoder.decode(&img, InvertPolicy::Normal).unwrap();
        let (min, max) = decoded.location.bounds();
        assert!(min.x >= 0.0 && min.y >= 0.0);
        assert!(max.x <= img.width() as f64 && max.y <= img.height() as f64);
        assert!(max.x - min.x > 10.0);
    }

    #[test]
    fn test_blank_image_finds_nothing() {
        let img = RgbaImage::from_pixel(64, 64, image::Rgba([255, 255, 255, 255]));
        assert!(RqrrDecoder.decode(&img, InvertPolicy::AttemptBoth).is_none());
    }

    #[test]
    fn test_empty_image_finds_nothing() {
        let img = RgbaImage::new(0, 0);
        assert!(RqrrDecoder.decode(&img, InvertPolicy::AttemptBoth).is_none());
    }

    #[test]
    fn test_inverted_code_needs_inversion() {
        let img = render_qr_inverted("inverted");
        assert!(RqrrDecoder.decode(&img, InvertPolicy::Normal).is_none());
        assert_eq!(
            RqrrDecoder
                .decode(&img, InvertPolicy::Inverted)
                .map(|d| d.text),
            Some("inverted".to_string())
        );
        assert_eq!(
            RqrrDecoder
                .decode(&img, InvertPolicy::AttemptBoth)
                .map(|d| d.text),
            Some("inverted".to_string())
        );
    }

    #[test]
    fn test_greyscale_composites_transparency_over_white() {
        let img = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 0]));
        assert_eq!(to_greyscale(&img), vec![255]);
        let img = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
        assert_eq!(to_greyscale(&img), vec![0]);
    }

    #[test]
    fn test_load_image_bytes_rejects_garbage() {
        assert!(matches!(
            load_image_bytes(&[1, 2, 3]),
            Err(DecodeError::ImageLoad(_))
        ));
    }

    #[test]
    fn test_rgb_to_rgba() {
        let img = rgb_to_rgba(2, 1, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(img.get_pixel(1, 0).0, [4, 5, 6, 255]);
        assert!(rgb_to_rgba(3, 3, &[0; 6]).is_none());
    }
}

//! Multi-code extraction from a static image.
//!
//! Decodes, paints over the found code in a working copy, and decodes
//! again until nothing more is found or the attempt budget runs out.

use crate::decoder::{Decoder, InvertPolicy};
use image::{Rgba, RgbaImage};
use qrlens_core::{DecodeLocation, Point};

/// Default number of decode passes per image.
pub const DEFAULT_ATTEMPT_BUDGET: usize = 10;

/// Mask grows by this factor around the quad center.
const MASK_DILATION: f64 = 1.15;
/// Extra pixels added on every side of the mask.
const MASK_PADDING: f64 = 2.0;

const MASK_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// What a static image yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    NothingFound,
    Single(String),
    /// Several distinct codes; one must be picked before recording.
    Choice(Vec<String>),
}

impl ExtractOutcome {
    pub fn from_codes(mut codes: Vec<String>) -> Self {
        match codes.len() {
            0 => ExtractOutcome::NothingFound,
            1 => ExtractOutcome::Single(codes.remove(0)),
            _ => ExtractOutcome::Choice(codes),
        }
    }

    pub fn codes(&self) -> Vec<&str> {
        match self {
            ExtractOutcome::NothingFound => Vec::new(),
            ExtractOutcome::Single(code) => vec![code.as_str()],
            ExtractOutcome::Choice(codes) => codes.iter().map(String::as_str).collect(),
        }
    }
}

/// Finds every distinct code in an image.
#[derive(Debug, Clone)]
pub struct MultiCodeExtractor<D: Decoder> {
    decoder: D,
    budget: usize,
}

impl<D: Decoder> MultiCodeExtractor<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_budget(decoder, DEFAULT_ATTEMPT_BUDGET)
    }

    pub fn with_budget(decoder: D, budget: usize) -> Self {
        Self { decoder, budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Distinct non-blank decoded strings, in the order first found.
    pub fn extract(&self, image: &RgbaImage) -> Vec<String> {
        let mut working = image.clone();
        let mut found: Vec<String> = Vec::new();

        for attempt in 1..=self.budget {
            let Some(decoded) = self.decoder.decode(&working, InvertPolicy::AttemptBoth) else {
                tracing::debug!("Extraction finished after {} pass(es)", attempt);
                break;
            };
            if decoded.text.trim().is_empty() {
                tracing::debug!("Pass {}: blank payload, ignoring", attempt);
            } else if found.contains(&decoded.text) {
                tracing::debug!("Pass {}: duplicate payload", attempt);
            } else {
                tracing::debug!("Pass {}: new payload ({} chars)", attempt, decoded.text.len());
                found.push(decoded.text);
            }
            fill_quad(&mut working, &dilate(&decoded.location), MASK_FILL);
        }

        tracing::info!("Extracted {} distinct code(s)", found.len());
        found
    }

    pub fn extract_outcome(&self, image: &RgbaImage) -> ExtractOutcome {
        ExtractOutcome::from_codes(self.extract(image))
    }
}

/// Scale the quad about its center and pad it outward.
fn dilate(location: &DecodeLocation) -> DecodeLocation {
    let c = location.center();
    location.map(|p| {
        let dx = (p.x - c.x) * MASK_DILATION;
        let dy = (p.y - c.y) * MASK_DILATION;
        Point::new(
            c.x + dx + MASK_PADDING * dx.signum(),
            c.y + dy + MASK_PADDING * dy.signum(),
        )
    })
}

/// Paint every pixel whose center lies inside the convex quad.
fn fill_quad(image: &mut RgbaImage, quad: &DecodeLocation, color: Rgba<u8>) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let (min, max) = quad.bounds();
    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil().max(0.0) as u32).min(w - 1);
    let y1 = (max.y.ceil().max(0.0) as u32).min(h - 1);

    let corners = quad.corners();
    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            if inside_convex(&corners, p) {
                image.put_pixel(x, y, color);
            }
        }
    }
}

/// Point-in-polygon for a convex polygon of either winding.
fn inside_convex(poly: &[Point; 4], p: Point) -> bool {
    let mut sign = 0.0_f64;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        if cross != 0.0 {
            if sign != 0.0 && cross.signum() != sign {
                return false;
            }
            sign = cross.signum();
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoded, RqrrDecoder};
    use crate::test_support::{render_qr, side_by_side};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    #[test]
    fn test_single_code() {
        let img = render_qr("only one");
        let extractor = MultiCodeExtractor::new(RqrrDecoder);
        assert_eq!(
            extractor.extract_outcome(&img),
            ExtractOutcome::Single("only one".to_string())
        );
    }

    #[test]
    fn test_blank_image_nothing_found() {
        let img = RgbaImage::from_pixel(100, 100, MASK_FILL);
        let extractor = MultiCodeExtractor::new(RqrrDecoder);
        assert_eq!(extractor.extract_outcome(&img), ExtractOutcome::NothingFound);
    }

    #[test]
    fn test_two_codes_need_a_choice() {
        let img = side_by_side(&[render_qr("left"), render_qr("right")], 24);
        let extractor = MultiCodeExtractor::new(RqrrDecoder);
        let mut codes = extractor.extract(&img);
        codes.sort();
        assert_eq!(codes, vec!["left".to_string(), "right".to_string()]);
    }

    #[test]
    fn test_duplicate_codes_deduplicated() {
        let img = side_by_side(&[render_qr("same"), render_qr("same")], 24);
        let extractor = MultiCodeExtractor::new(RqrrDecoder);
        assert_eq!(extractor.extract(&img), vec!["same".to_string()]);
    }

    #[test]
    fn test_blank_payload_is_masked_and_skipped() {
        let img = side_by_side(&[render_qr("   "), render_qr("kept")], 24);
        let extractor = MultiCodeExtractor::new(RqrrDecoder);
        assert_eq!(
            extractor.extract_outcome(&img),
            ExtractOutcome::Single("kept".to_string())
        );
        assert_eq!(
            extractor.extract_outcome(&render_qr(" \t ")),
            ExtractOutcome::NothingFound
        );
    }

    /// Always finds the same code and never lets masking help.
    struct StuckDecoder {
        calls: Cell<usize>,
    }

    impl Decoder for StuckDecoder {
        fn decode(&self, _image: &RgbaImage, _policy: InvertPolicy) -> Option<Decoded> {
            self.calls.set(self.calls.get() + 1);
            Some(Decoded {
                text: "stuck".to_string(),
                location: DecodeLocation::default(),
            })
        }
    }

    #[test]
    fn test_budget_bounds_passes() {
        let decoder = StuckDecoder {
            calls: Cell::new(0),
        };
        let extractor = MultiCodeExtractor::with_budget(&decoder, 4);
        let img = RgbaImage::new(10, 10);
        assert_eq!(extractor.extract(&img), vec!["stuck".to_string()]);
        assert_eq!(decoder.calls.get(), 4);
    }

    #[test]
    fn test_outcome_from_codes() {
        assert_eq!(ExtractOutcome::from_codes(vec![]), ExtractOutcome::NothingFound);
        let choice = ExtractOutcome::from_codes(vec!["a".into(), "b".into()]);
        assert_eq!(choice.codes(), vec!["a", "b"]);
    }

    #[test]
    fn test_fill_quad_paints_inside_only() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let quad = DecodeLocation::from_corners([
            Point::new(5.0, 5.0),
            Point::new(15.0, 5.0),
            Point::new(15.0, 15.0),
            Point::new(5.0, 15.0),
        ]);
        fill_quad(&mut img, &quad, MASK_FILL);
        assert_eq!(*img.get_pixel(10, 10), MASK_FILL);
        assert_eq!(*img.get_pixel(1, 1), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(18, 10), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_dilate_grows_quad() {
        let quad = DecodeLocation::from_corners([
            Point::new(10.0, 10.0),
            Point::new(20.0, 10.0),
            Point::new(20.0, 20.0),
            Point::new(10.0, 20.0),
        ]);
        let (min, max) = dilate(&quad).bounds();
        assert!(min.x < 10.0 && min.y < 10.0);
        assert!(max.x > 20.0 && max.y > 20.0);
    }
}

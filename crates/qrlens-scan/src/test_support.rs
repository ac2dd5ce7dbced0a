//! QR fixtures rendered with the `qrcode` crate.
//!
//! Also compiled into the integration tests through `tests/common`.

use image::{Rgba, RgbaImage, imageops};

const MODULE_PX: u32 = 4;
const QUIET_ZONE: u32 = 4;

const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn render_with(text: &str, dark: Rgba<u8>, light: Rgba<u8>) -> RgbaImage {
    let code = qrcode::QrCode::new(text.as_bytes()).expect("fixture text fits in a QR code");
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET_ZONE) * MODULE_PX;

    let mut img = RgbaImage::from_pixel(side, side, light);
    for (i, color) in colors.iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let mx = i as u32 % modules + QUIET_ZONE;
        let my = i as u32 / modules + QUIET_ZONE;
        for dy in 0..MODULE_PX {
            for dx in 0..MODULE_PX {
                img.put_pixel(mx * MODULE_PX + dx, my * MODULE_PX + dy, dark);
            }
        }
    }
    img
}

/// Dark-on-light code with a quiet zone.
pub fn render_qr(text: &str) -> RgbaImage {
    render_with(text, DARK, LIGHT)
}

/// Light-on-dark code.
pub fn render_qr_inverted(text: &str) -> RgbaImage {
    render_with(text, LIGHT, DARK)
}

/// Place `tiles` left to right on a white canvas, `gap` pixels apart.
pub fn side_by_side(tiles: &[RgbaImage], gap: u32) -> RgbaImage {
    let width = tiles.iter().map(|t| t.width() + gap).sum::<u32>() + gap;
    let height = tiles.iter().map(|t| t.height()).max().unwrap_or(0) + 2 * gap;
    let mut canvas = RgbaImage::from_pixel(width, height, LIGHT);
    let mut x = gap;
    for tile in tiles {
        imageops::overlay(&mut canvas, tile, x as i64, gap as i64);
        x += tile.width() + gap;
    }
    canvas
}

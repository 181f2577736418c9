use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::ProcessingError;

pub const MAX_WIDTH: u32 = 1920;
pub const MAX_HEIGHT: u32 = 1080;
pub const JPEG_QUALITY: u8 = 85;

/// Re-encode a photo as a JPEG that fits in 1920x1080, transparency flattened onto white.
pub fn optimize(input: &Path, output: &Path) -> Result<(), ProcessingError> {
    let source = image::open(input)?.to_rgba8();
    let flat = flatten_on_white(&source);

    let (width, height) = fit_within(flat.width(), flat.height(), MAX_WIDTH, MAX_HEIGHT);
    let resized = if (width, height) == flat.dimensions() {
        flat
    } else {
        image::imageops::resize(&flat, width, height, FilterType::Lanczos3)
    };

    let writer = BufWriter::new(File::create(output)?);
    let mut encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
    encoder.encode(resized.as_raw(), width, height, ColorType::Rgb8)?;
    Ok(())
}

/// Largest size with the same aspect ratio that fits the box. Never upscales.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

pub fn flatten_on_white(source: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(source.width(), source.height(), |x, y| {
        let Rgba([r, g, b, a]) = *source.get_pixel(x, y);
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

// 5x7 glyphs, one row per byte, high bit on the left.
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

fn glyph(c: char) -> [u8; 7] {
    match c {
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        _ => [0; 7],
    }
}

/// 200x50 translucent plate with "TALENTZIK" in white block letters.
pub fn default_watermark() -> RgbaImage {
    const WIDTH: u32 = 200;
    const HEIGHT: u32 = 50;
    const SCALE: u32 = 3;
    const TEXT: &str = "TALENTZIK";

    let mut logo = RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([0, 0, 0, 96]));

    let advance = (GLYPH_WIDTH + 1) * SCALE;
    let text_width = advance * TEXT.len() as u32 - SCALE;
    let left = (WIDTH - text_width) / 2;
    let top = (HEIGHT - GLYPH_HEIGHT * SCALE) / 2;

    for (i, c) in TEXT.chars().enumerate() {
        let origin = left + i as u32 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        let x = origin + col * SCALE + dx;
                        let y = top + row as u32 * SCALE + dy;
                        logo.put_pixel(x, y, Rgba([255, 255, 255, 200]));
                    }
                }
            }
        }
    }

    logo
}

pub fn write_default_watermark(path: &Path) -> Result<(), ProcessingError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    default_watermark().save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

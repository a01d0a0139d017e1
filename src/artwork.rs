use std::io::Cursor;

use anyhow::Context;
use base64::Engine as _;
use image::{imageops::FilterType, ImageFormat};

pub const DEFAULT_ARTWORK_SIZE: u32 = 72;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Turns raw thumbnail bytes (any format `image` can decode) into a
/// `size`x`size` PNG wrapped in a base64 data URL, the form the deck software
/// accepts for button images.
pub fn encode_button_image(bytes: &[u8], size: u32) -> anyhow::Result<String> {
    let png = scale_to_png(bytes, size)?;
    let mut out = String::with_capacity(DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
    out.push_str(DATA_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(&png, &mut out);
    Ok(out)
}

fn scale_to_png(bytes: &[u8], size: u32) -> anyhow::Result<Vec<u8>> {
    let image = image::load_from_memory(bytes).context("Failed to decode thumbnail")?;
    let scaled = image.resize_exact(size, size, FilterType::Triangle).to_rgba8();

    let mut png = Vec::new();
    scaled
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to encode button image")?;
    Ok(png)
}

use std::io::Cursor;

use image::{DynamicImage, RgbImage};

use crate::pipeline::{HalfImage, PageSide, PipelineError};

pub fn split(source_name: &str, bytes: &[u8]) -> Result<(HalfImage, HalfImage), PipelineError> {
    let decoded = image::load_from_memory(bytes).map_err(|source| PipelineError::Decode {
        name: source_name.to_string(),
        source,
    })?;

    let oriented = apply_orientation(decoded, read_exif_orientation(bytes));
    let page = flatten_to_rgb(oriented);

    let (width, height) = page.dimensions();
    let midline = width / 2;

    let left = image::imageops::crop_imm(&page, 0, 0, midline, height).to_image();
    let right = image::imageops::crop_imm(&page, midline, 0, width - midline, height).to_image();

    Ok((
        HalfImage {
            pixels: left,
            side: PageSide::Left,
            source_name: source_name.to_string(),
        },
        HalfImage {
            pixels: right,
            side: PageSide::Right,
            source_name: source_name.to_string(),
        },
    ))
}

/// EXIF tag 0x0112; 1 means upright, missing metadata reads as 1.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(reader) => reader,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1)
}

pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);

    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let alpha = u16::from(a);
        dst.0 = [
            composite_over_white(r, alpha),
            composite_over_white(g, alpha),
            composite_over_white(b, alpha),
        ];
    }

    rgb
}

fn composite_over_white(channel: u8, alpha: u16) -> u8 {
    ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8
}

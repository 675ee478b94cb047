use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::RgbaImage;
use png::{BitDepth, ColorType, Encoder, PixelDimensions, Unit};

use crate::StatusOr;

const METERS_PER_INCH: f32 = 0.0254;

fn encode_into<W: Write>(sink: W, image: &RgbaImage, dpi: f32) -> StatusOr<()> {
    let mut encoder = Encoder::new(sink, image.width(), image.height());
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);

    // pHYs stores pixels per meter
    let ppu = (dpi / METERS_PER_INCH).round() as u32;
    encoder.set_pixel_dims(Some(PixelDimensions { xppu: ppu, yppu: ppu, unit: Unit::Meter }));

    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())?;
    writer.finish()?;
    Ok(())
}

/// Encode an RGBA raster as PNG with the resolution recorded in the file.
pub fn encode_png(image: &RgbaImage, dpi: f32) -> StatusOr<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_into(&mut buffer, image, dpi)?;
    Ok(buffer)
}

/// Encode straight to a file.
pub fn write_png<P: AsRef<Path>>(path: P, image: &RgbaImage, dpi: f32) -> StatusOr<()> {
    let file = File::create(path.as_ref())?;
    encode_into(BufWriter::new(file), image, dpi)
}

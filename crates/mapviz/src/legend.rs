use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};

use crate::Color;

/// Panel color behind the legend entries.
const PANEL_COLOR: Color = Color::rgb(0x06, 0x15, 0x29);
/// 90% opacity
const PANEL_ALPHA: u8 = 230;
/// Swatch edge and font size, in points.
const ENTRY_POINTS: f32 = 16.0;

/// One row of the legend: a colored square and its label.
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Color,
}

impl LegendEntry {
    pub fn new(label: impl Into<String>, color: Color) -> Self {
        Self { label: label.into(), color }
    }
}

/// Blend a translucent rectangle over the image, clipped to its bounds.
fn blend_rect(image: &mut RgbaImage, x0: i32, y0: i32, width: u32, height: u32, color: Rgba<u8>) {
    let x_start = x0.max(0) as u32;
    let y_start = y0.max(0) as u32;
    let x_end = ((x0 + width as i32).max(0) as u32).min(image.width());
    let y_end = ((y0 + height as i32).max(0) as u32).min(image.height());

    for y in y_start..y_end {
        for x in x_start..x_end {
            image.get_pixel_mut(x, y).blend(&color);
        }
    }
}

/// Draw a legend panel anchored in the lower-left corner.
///
/// Sizes follow the output resolution: `px_per_point` converts the fixed
/// point sizes of the swatches and labels into pixels. Without a font only
/// the swatches are drawn.
pub fn draw_legend(image: &mut RgbaImage, entries: &[LegendEntry], font: Option<&Font<'_>>, px_per_point: f32) {
    if entries.is_empty() {
        return;
    }

    let entry_px = (ENTRY_POINTS * px_per_point).max(1.0);
    let swatch = entry_px.round() as u32;
    let padding = (entry_px * 0.5).round() as i32;
    let gap = (entry_px * 0.8).round() as i32;
    let row_height = (entry_px * 1.4).round() as i32;
    let scale = Scale::uniform(entry_px);

    let label_width = font
        .map(|font| entries.iter()
            .map(|entry| text_size(scale, font, &entry.label).0)
            .max()
            .unwrap_or(0))
        .unwrap_or(0);
    let text_gap = if font.is_some() { gap } else { 0 };

    let panel_width = (padding * 2 + swatch as i32 + text_gap + label_width).max(1) as u32;
    let panel_height = (padding * 2 + row_height * entries.len() as i32).max(1) as u32;
    let panel_x = padding;
    let panel_y = image.height() as i32 - panel_height as i32 - padding;

    blend_rect(image, panel_x, panel_y, panel_width, panel_height, PANEL_COLOR.to_rgba(PANEL_ALPHA));

    let white = Rgba([255, 255, 255, 255]);
    for (i, entry) in entries.iter().enumerate() {
        let row_y = panel_y + padding + row_height * i as i32;
        let swatch_y = row_y + (row_height - swatch as i32) / 2;
        let swatch_x = panel_x + padding;
        draw_filled_rect_mut(image, Rect::at(swatch_x, swatch_y).of_size(swatch, swatch), entry.color.to_rgba(255));

        if let Some(font) = font {
            let text_height = text_size(scale, font, &entry.label).1;
            let text_y = row_y + (row_height - text_height) / 2;
            draw_text_mut(image, white, swatch_x + swatch as i32 + text_gap, text_y, scale, font, &entry.label);
        }
    }
}

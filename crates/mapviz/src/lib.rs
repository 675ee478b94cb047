use std::fmt;
use std::str::FromStr;

use image::Rgba;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod encode;
pub mod font;
pub mod legend;

pub use encode::{encode_png, write_png};
pub use font::load_font;
pub use legend::{draw_legend, LegendEntry};
pub use image::RgbaImage;
pub use rusttype::Font;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to encode PNG: {0}")]
    EncodingError(#[from] png::EncodingError),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Failed to load font: {0}")]
    FontError(String),

    #[error("Failed to build scene: {0}")]
    SceneError(String),

    #[error("Nothing to draw")]
    EmptyScene,
}

pub type StatusOr<T> = Result<T, RenderError>;

/// An opaque sRGB color, written as `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }
}

impl FromStr for Color {
    type Err = RenderError;

    fn from_str(s: &str) -> StatusOr<Self> {
        let digits = s.trim().strip_prefix('#')
            .ok_or_else(|| RenderError::InvalidColor(format!("{s:?} does not start with '#'")))?;
        if !digits.is_ascii() {
            return Err(RenderError::InvalidColor(format!("{s:?} is not hexadecimal")));
        }
        let channel = |hex: &str| u8::from_str_radix(hex, 16)
            .map_err(|_| RenderError::InvalidColor(format!("{s:?} is not hexadecimal")));

        match digits.len() {
            6 => Ok(Color::rgb(channel(&digits[0..2])?, channel(&digits[2..4])?, channel(&digits[4..6])?)),
            3 => {
                // #abc is shorthand for #aabbcc
                let r = channel(&digits[0..1])?;
                let g = channel(&digits[1..2])?;
                let b = channel(&digits[2..3])?;
                Ok(Color::rgb(r * 17, g * 17, b * 17))
            }
            _ => Err(RenderError::InvalidColor(format!("{s:?} must have 3 or 6 hex digits"))),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = RenderError;

    fn try_from(value: String) -> StatusOr<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Canvas background. `none` and `transparent` both parse to [`Background::Transparent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Background {
    Transparent,
    Solid(Color),
}

impl Background {
    pub fn is_transparent(&self) -> bool {
        matches!(self, Background::Transparent)
    }

    fn pixel(&self) -> Rgba<u8> {
        match self {
            Background::Transparent => Rgba([0, 0, 0, 0]),
            Background::Solid(color) => color.to_rgba(255),
        }
    }
}

impl FromStr for Background {
    type Err = RenderError;

    fn from_str(s: &str) -> StatusOr<Self> {
        match s.trim() {
            "none" | "transparent" => Ok(Background::Transparent),
            other => other.parse().map(Background::Solid),
        }
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Background::Transparent => write!(f, "none"),
            Background::Solid(color) => color.fmt(f),
        }
    }
}

impl TryFrom<String> for Background {
    type Error = RenderError;

    fn try_from(value: String) -> StatusOr<Self> {
        value.parse()
    }
}

impl From<Background> for String {
    fn from(background: Background) -> Self {
        background.to_string()
    }
}

/// Geographic bounds of a map region
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl MapBounds {
    pub fn width(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    fn center_lat(&self) -> f64 {
        (self.min_lat + self.max_lat) / 2.0
    }

    /// Grow the bounds by `fraction` of their size on every side.
    /// Degenerate (zero-area) bounds get a small fixed margin instead.
    fn padded(&self, fraction: f64) -> MapBounds {
        let pad_lng = (self.width() * fraction).max(1e-4);
        let pad_lat = (self.height() * fraction).max(1e-4);
        MapBounds {
            min_lat: self.min_lat - pad_lat,
            max_lat: self.max_lat + pad_lat,
            min_lng: self.min_lng - pad_lng,
            max_lng: self.max_lng + pad_lng,
        }
    }
}

/// How a single edge is drawn. Width is in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeStyle {
    pub color: Color,
    pub width: f32,
}

/// Edge polylines with one style per edge. Points are (longitude, latitude).
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub edge_paths: Vec<Vec<(f64, f64)>>,
    pub edge_styles: Vec<EdgeStyle>,
}

impl Scene {
    pub fn new(edge_paths: Vec<Vec<(f64, f64)>>, edge_styles: Vec<EdgeStyle>) -> StatusOr<Self> {
        if edge_paths.len() != edge_styles.len() {
            return Err(RenderError::SceneError(format!(
                "Mismatch between edge count ({}) and edge style count ({})",
                edge_paths.len(), edge_styles.len())));
        }
        Ok(Self { edge_paths, edge_styles })
    }

    pub fn bounds(&self) -> Option<MapBounds> {
        let mut points = self.edge_paths.iter().flatten();
        let &(lng, lat) = points.next()?;
        let mut bounds = MapBounds { min_lat: lat, max_lat: lat, min_lng: lng, max_lng: lng };
        for &(lng, lat) in points {
            bounds.min_lat = bounds.min_lat.min(lat);
            bounds.max_lat = bounds.max_lat.max(lat);
            bounds.min_lng = bounds.min_lng.min(lng);
            bounds.max_lng = bounds.max_lng.max(lng);
        }
        Some(bounds)
    }
}

/// Configuration for the rasterization.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Longest side of the output in pixels
    pub max_size: u32,
    /// Output resolution, used to convert point widths to pixels
    pub dpi: f32,
    /// Margin around the data as a fraction of its extent
    pub padding: f64,
    pub background: Background,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_size: 2400,
            dpi: 300.0,
            padding: 0.02,
            background: Background::Solid(Color::WHITE),
        }
    }
}

impl RenderConfig {
    /// Pixels per typographic point at this resolution.
    pub fn px_per_point(&self) -> f32 {
        self.dpi / 72.0
    }
}

/// Helper function to draw a thick line by drawing circles along the path
fn draw_thick_line_segment_mut(
    image: &mut RgbaImage,
    start: (f32, f32),
    end: (f32, f32),
    color: Rgba<u8>,
    width: f32,
) {
    if width <= 1.0 {
        draw_line_segment_mut(image, start, end, color);
        return;
    }

    let radius = (width / 2.0).round().max(1.0) as i32;
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let length = (dx * dx + dy * dy).sqrt();

    if length < 0.001 {
        draw_filled_circle_mut(image, (start.0 as i32, start.1 as i32), radius, color);
        return;
    }

    // Step at half the radius so consecutive circles overlap without gaps
    let step_size = (radius as f32 * 0.5).max(0.5);
    let num_steps = (length / step_size).ceil() as i32;
    let step_x = dx * step_size / length;
    let step_y = dy * step_size / length;

    for i in 0..=num_steps {
        let t = i as f32;
        let x = start.0 + t * step_x;
        let y = start.1 + t * step_y;
        draw_filled_circle_mut(image, (x as i32, y as i32), radius, color);
    }
    draw_filled_circle_mut(image, (end.0 as i32, end.1 as i32), radius, color);
}

/// Rasterize every edge of the scene. No node markers are drawn.
///
/// The canvas is cropped to the padded data extent, with longitude scaled by
/// the cosine of the center latitude so streets keep their proportions.
pub fn render_scene(scene: &Scene, config: &RenderConfig) -> StatusOr<RgbaImage> {
    let bounds = scene.bounds().ok_or(RenderError::EmptyScene)?.padded(config.padding);

    let lng_scale = bounds.center_lat().to_radians().cos().max(1e-6);
    let projected_width = bounds.width() * lng_scale;
    let projected_height = bounds.height();
    let aspect_ratio = projected_width / projected_height;

    let max_size = config.max_size.max(1);
    let (img_width, img_height) = if aspect_ratio > 1.0 {
        (max_size, ((max_size as f64 / aspect_ratio) as u32).max(1))
    } else {
        (((max_size as f64 * aspect_ratio) as u32).max(1), max_size)
    };

    info!("Rendering {} edges onto a {}x{} canvas", scene.edge_paths.len(), img_width, img_height);

    let mut image = RgbaImage::from_pixel(img_width, img_height, config.background.pixel());

    let to_img_coords = |lng: f64, lat: f64| -> (f32, f32) {
        let x = (lng - bounds.min_lng) / bounds.width() * img_width as f64;
        // y-axis is inverted (0 at top)
        let y = (bounds.max_lat - lat) / bounds.height() * img_height as f64;
        (x as f32, y as f32)
    };

    let px_per_point = config.px_per_point();
    for (path, style) in scene.edge_paths.iter().zip(&scene.edge_styles) {
        let color = style.color.to_rgba(255);
        let width = style.width * px_per_point;
        for pair in path.windows(2) {
            let start = to_img_coords(pair[0].0, pair[0].1);
            let end = to_img_coords(pair[1].0, pair[1].1);
            draw_thick_line_segment_mut(&mut image, start, end, color, width);
        }
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross_scene(color: Color) -> Scene {
        Scene::new(
            vec![
                vec![(-71.07, 42.35), (-71.05, 42.36)],
                vec![(-71.07, 42.36), (-71.05, 42.35)],
            ],
            vec![EdgeStyle { color, width: 0.8 }; 2],
        ).unwrap()
    }

    #[test]
    fn parses_long_and_short_hex_colors() {
        assert_eq!("#061529".parse::<Color>().unwrap(), Color::rgb(0x06, 0x15, 0x29));
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("#D40A47".parse::<Color>().unwrap().to_string(), "#d40a47");
        assert!("061529".parse::<Color>().is_err());
        assert!("#06152".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn multibyte_digits_are_invalid_not_a_panic() {
        for input in ["#aééb", "#é1", "#ééé"] {
            assert!(matches!(input.parse::<Color>(), Err(RenderError::InvalidColor(_))), "{input}");
        }
        assert!(serde_json::from_str::<Color>("\"#aééb\"").is_err());
    }

    #[test]
    fn background_accepts_none_sentinel() {
        assert_eq!("none".parse::<Background>().unwrap(), Background::Transparent);
        assert_eq!("transparent".parse::<Background>().unwrap(), Background::Transparent);
        assert_eq!("#ffffff".parse::<Background>().unwrap(), Background::Solid(Color::WHITE));
        assert_eq!(Background::Transparent.to_string(), "none");
    }

    #[test]
    fn scene_rejects_mismatched_styles() {
        let result = Scene::new(vec![vec![(0.0, 0.0), (1.0, 1.0)]], Vec::new());
        assert!(matches!(result, Err(RenderError::SceneError(_))));
    }

    #[test]
    fn empty_scene_is_an_error() {
        let result = render_scene(&Scene::default(), &RenderConfig::default());
        assert!(matches!(result, Err(RenderError::EmptyScene)));
    }

    #[test]
    fn wide_extent_fills_the_horizontal_side() {
        let config = RenderConfig { max_size: 400, ..RenderConfig::default() };
        let image = render_scene(&cross_scene(Color::rgb(255, 0, 0)), &config).unwrap();
        assert_eq!(image.width(), 400);
        assert!(image.height() < 400);
    }

    #[test]
    fn transparent_background_keeps_alpha_zero_away_from_edges() {
        let config = RenderConfig {
            max_size: 200,
            background: Background::Transparent,
            ..RenderConfig::default()
        };
        let image = render_scene(&cross_scene(Color::rgb(255, 0, 0)), &config).unwrap();

        // Top edge midpoint lies between the two diagonals
        let top = image.get_pixel(image.width() / 2, 0);
        assert_eq!(top[3], 0);

        // The diagonals cross in the middle of the canvas
        let center = image.get_pixel(image.width() / 2, image.height() / 2);
        assert_eq!(*center, Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn solid_background_is_opaque() {
        let config = RenderConfig {
            max_size: 100,
            background: Background::Solid(Color::rgb(0x06, 0x15, 0x29)),
            ..RenderConfig::default()
        };
        let image = render_scene(&cross_scene(Color::WHITE), &config).unwrap();
        assert_eq!(*image.get_pixel(image.width() / 2, 0), Rgba([0x06, 0x15, 0x29, 255]));
    }
}
